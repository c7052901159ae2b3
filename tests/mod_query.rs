use bson::{Bson, doc};
use racelite::query::{
    CmpOp, Filter, FindQuery, Projection, SortSpec, UpdateDoc, compare_docs, eval_filter, project,
    sort_to_bson,
};
use std::cmp::Ordering;

#[test]
fn filter_eq_and_range() {
    let d = doc! {"age": 30, "name": "alice"};
    assert!(eval_filter(&d, &Filter::Cmp { path: "age".into(), op: CmpOp::Eq, value: 30.into() }));
    assert!(!eval_filter(&d, &Filter::Cmp { path: "age".into(), op: CmpOp::Gt, value: 45.into() }));
    assert!(eval_filter(&d, &Filter::Cmp { path: "age".into(), op: CmpOp::Lt, value: Bson::Double(30.5) }));
    assert!(eval_filter(&d, &Filter::True));
}

#[test]
fn rendered_queries_use_store_operators() {
    let q = FindQuery::new(Filter::open_range("secs", Bson::Int32(60), Bson::Int32(90)));
    assert_eq!(q.to_bson(), doc! {"filter": {"secs": {"$gt": 60, "$lt": 90}}});
    let q = FindQuery::new(Filter::prefix("last_name", "S").unwrap()).sort_by(SortSpec::asc("last_name"));
    assert_eq!(
        q.to_bson(),
        doc! {"filter": {"last_name": {"$regex": "^S.+"}}, "sort": {"last_name": 1}}
    );
    assert_eq!(sort_to_bson(&[SortSpec::desc("secs"), SortSpec::asc("number")]), doc! {"secs": -1, "number": 1});
    assert_eq!(
        UpdateDoc::inc("secs", 5).unwrap().and_inc("laps", 1).unwrap().to_bson(),
        doc! {"$inc": {"secs": 5, "laps": 1}}
    );
}

#[test]
fn multi_key_sort_with_descending_tiebreak() {
    let a = doc! {"g": "A", "secs": 10};
    let b = doc! {"g": "A", "secs": 20};
    let c = doc! {"g": "B", "secs": 5};
    let spec = [SortSpec::asc("g"), SortSpec::desc("secs")];
    assert_eq!(compare_docs(&a, &b, &spec), Ordering::Greater);
    assert_eq!(compare_docs(&b, &c, &spec), Ordering::Less);
}

#[test]
fn projection_include_and_exclude() {
    let d = doc! {"_id": 1, "first_name": "Ann", "last_name": "Lee", "number": 3, "group": "A"};
    assert_eq!(project(&d, &Projection::include(["number"])), doc! {"_id": 1, "number": 3});
    assert_eq!(
        project(&d, &Projection::exclude(["_id", "group", "number"])),
        doc! {"first_name": "Ann", "last_name": "Lee"}
    );
}

#[test]
fn prototype_with_nested_document_matches_whole_value() {
    let d = doc! {"split": {"lap": 1, "secs": 30}};
    assert!(eval_filter(&d, &Filter::prototype(&doc! {"split": {"lap": 1, "secs": 30}})));
    assert!(!eval_filter(&d, &Filter::prototype(&doc! {"split": {"lap": 1}})));
    assert!(eval_filter(&d, &Filter::prototype(&doc! {"split.lap": 1})));
}
