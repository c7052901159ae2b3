use bson::{Bson, Document as BsonDocument, oid::ObjectId};

use super::eval::{bson_equal, compare_docs, eval_filter, get_path};
use super::types::{DeleteReport, Filter, FindQuery, MAX_PATH_DEPTH, UpdateDoc, UpdateReport};
use crate::document::{Document, Metadata};
use crate::errors::DbError;
use crate::store::memory::{CollectionState, StoredDocument};
use crate::types::{ID_FIELD, id_key};
use crate::utils::num::{u64_to_usize_saturating, u128_to_u64_saturating, usize_to_u64};

/// Resolves a find request to the sequence numbers of the matching documents, in result order.
///
/// Without a sort the store's insertion order is used. Sorting is stable, so documents with
/// equal keys keep their insertion order.
pub(crate) fn select(state: &CollectionState, collection: &str, query: &FindQuery) -> Vec<u64> {
    let bench_start = std::time::Instant::now();
    if query.limit == Some(0) {
        trace_find(collection, bench_start, 0, query);
        return Vec::new();
    }
    let mut hits: Vec<(u64, &BsonDocument)> = state
        .docs
        .iter()
        .filter(|(_, s)| eval_filter(&s.doc, &query.filter))
        .map(|(seq, s)| (*seq, &s.doc))
        .collect();
    if !query.sort.is_empty() {
        hits.sort_by(|a, b| compare_docs(a.1, b.1, &query.sort));
    }
    let skip = u64_to_usize_saturating(query.skip);
    let limit = query.limit.map_or(usize::MAX, u64_to_usize_saturating);
    let seqs: Vec<u64> = hits.into_iter().skip(skip).take(limit).map(|(seq, _)| seq).collect();
    trace_find(collection, bench_start, seqs.len(), query);
    seqs
}

fn trace_find(collection: &str, start: std::time::Instant, results: usize, query: &FindQuery) {
    crate::dev6!(
        "{{\"bench\":\"query\",\"op\":\"find\",\"collection\":\"{}\",\"duration_ms\":{},\"result_count\":{},\"limit\":{},\"skip\":{}}}",
        collection,
        u128_to_u64_saturating(start.elapsed().as_millis()),
        usize_to_u64(results),
        query.limit.unwrap_or(0),
        query.skip
    );
}

#[must_use]
pub(crate) fn count_docs(state: &CollectionState, collection: &str, filter: &Filter) -> u64 {
    let start = std::time::Instant::now();
    let n = usize_to_u64(state.docs.values().filter(|s| eval_filter(&s.doc, filter)).count());
    crate::dev6!(
        "{{\"bench\":\"query\",\"op\":\"count\",\"collection\":\"{}\",\"duration_ms\":{},\"result_count\":{}}}",
        collection,
        u128_to_u64_saturating(start.elapsed().as_millis()),
        n
    );
    n
}

/// Stores one document, assigning an `ObjectId` when it has no `_id`.
///
/// A generated identifier is placed as the first field. Returns the identifier.
pub(crate) fn insert(state: &mut CollectionState, doc: Document) -> Result<Bson, DbError> {
    let mut data = doc.into_inner();
    let id = match data.get(ID_FIELD) {
        Some(Bson::Array(_)) => {
            return Err(DbError::Validation("_id cannot be an array".into()));
        }
        Some(id) => id.clone(),
        None => {
            let id = Bson::ObjectId(ObjectId::new());
            let mut with_id = BsonDocument::new();
            with_id.insert(ID_FIELD, id.clone());
            with_id.extend(data);
            data = with_id;
            id
        }
    };
    let key = id_key(&id);
    if state.by_id.contains_key(&key) {
        return Err(DbError::Validation(format!("duplicate _id {id}")));
    }
    let seq = state.next_seq;
    state.next_seq += 1;
    state.by_id.insert(key, seq);
    state.docs.insert(seq, StoredDocument { doc: data, metadata: Metadata::new() });
    Ok(id)
}

/// Inserts in input order and stops at the first failure.
///
/// Documents stored before the failure stay stored; the error is returned together with
/// the identifiers that made it in.
pub(crate) fn insert_ordered(
    state: &mut CollectionState,
    docs: Vec<Document>,
) -> (Vec<Bson>, Option<DbError>) {
    let mut ids = Vec::with_capacity(docs.len());
    for (i, doc) in docs.into_iter().enumerate() {
        match insert(state, doc) {
            Ok(id) => ids.push(id),
            Err(DbError::Validation(msg)) => {
                return (ids, Some(DbError::Validation(format!("document {i}: {msg}"))));
            }
            Err(e) => return (ids, Some(e)),
        }
    }
    (ids, None)
}

fn first_match(state: &CollectionState, filter: &Filter) -> Option<u64> {
    state.docs.iter().find(|(_, s)| eval_filter(&s.doc, filter)).map(|(seq, _)| *seq)
}

/// Applies `update` to the first matching document in insertion order.
///
/// The document is left untouched when any `$inc` term fails.
pub(crate) fn update_one(
    state: &mut CollectionState,
    collection: &str,
    filter: &Filter,
    update: &UpdateDoc,
) -> Result<UpdateReport, DbError> {
    let bench_start = std::time::Instant::now();
    let Some(seq) = first_match(state, filter) else {
        return Ok(UpdateReport::default());
    };
    let Some(stored) = state.docs.get_mut(&seq) else {
        return Ok(UpdateReport::default());
    };
    let mut doc = stored.doc.clone();
    let changed = apply_update(&mut doc, update)?;
    if changed {
        stored.doc = doc;
        stored.metadata.touch();
    }
    crate::dev6!(
        "{{\"bench\":\"query\",\"op\":\"update_one\",\"collection\":\"{}\",\"duration_ms\":{},\"matched\":1,\"modified\":{}}}",
        collection,
        u128_to_u64_saturating(bench_start.elapsed().as_millis()),
        u64::from(changed)
    );
    Ok(UpdateReport { matched: 1, modified: u64::from(changed) })
}

/// Replaces the first matching document wholesale, keeping its `_id`.
pub(crate) fn replace_one(
    state: &mut CollectionState,
    collection: &str,
    filter: &Filter,
    replacement: Document,
) -> Result<UpdateReport, DbError> {
    let Some(seq) = first_match(state, filter) else {
        return Ok(UpdateReport::default());
    };
    let Some(stored) = state.docs.get_mut(&seq) else {
        return Ok(UpdateReport::default());
    };
    let Some(current_id) = stored.doc.get(ID_FIELD).cloned() else {
        return Err(DbError::Validation("stored document has no _id".into()));
    };
    let mut next = BsonDocument::new();
    next.insert(ID_FIELD, current_id.clone());
    for (k, v) in replacement.into_inner() {
        if k == ID_FIELD {
            if !bson_equal(&v, &current_id) {
                return Err(DbError::Validation(format!(
                    "replacement would change _id from {current_id} to {v}"
                )));
            }
            continue;
        }
        next.insert(k, v);
    }
    let changed = next != stored.doc;
    if changed {
        stored.doc = next;
        stored.metadata.touch();
    }
    crate::dev6!(
        "{{\"bench\":\"query\",\"op\":\"replace_one\",\"collection\":\"{}\",\"matched\":1,\"modified\":{}}}",
        collection,
        u64::from(changed)
    );
    Ok(UpdateReport { matched: 1, modified: u64::from(changed) })
}

pub(crate) fn delete_many(state: &mut CollectionState, collection: &str, filter: &Filter) -> DeleteReport {
    let bench_start = std::time::Instant::now();
    let seqs: Vec<u64> = state
        .docs
        .iter()
        .filter(|(_, s)| eval_filter(&s.doc, filter))
        .map(|(seq, _)| *seq)
        .collect();
    let mut deleted = 0u64;
    for seq in seqs {
        if let Some(stored) = state.docs.remove(&seq) {
            if let Some(id) = stored.doc.get(ID_FIELD) {
                state.by_id.remove(&id_key(id));
            }
            deleted += 1;
        }
    }
    crate::dev6!(
        "{{\"bench\":\"query\",\"op\":\"delete_many\",\"collection\":\"{}\",\"duration_ms\":{},\"deleted\":{}}}",
        collection,
        u128_to_u64_saturating(bench_start.elapsed().as_millis()),
        deleted
    );
    DeleteReport { deleted }
}

/// Applies every `$inc` term of `update` to `doc`. Returns whether any value changed.
pub(crate) fn apply_update(doc: &mut BsonDocument, update: &UpdateDoc) -> Result<bool, DbError> {
    let mut changed = false;
    for (path, delta) in &update.inc {
        if inc_path(doc, path, delta)? {
            changed = true;
        }
    }
    Ok(changed)
}

fn inc_path(root: &mut BsonDocument, path: &str, delta: &Bson) -> Result<bool, DbError> {
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return Err(DbError::Validation(format!("invalid field path '{path}'")));
    }
    if path.split('.').count() > MAX_PATH_DEPTH {
        return Err(DbError::Validation(format!("field path '{path}' is too deep")));
    }
    let current = get_path(root, path).cloned();
    let next = match &current {
        None => delta.clone(),
        Some(v) => add_numbers(v, delta).ok_or_else(|| {
            DbError::Validation(format!("cannot apply $inc to non-numeric field '{path}'"))
        })??,
    };
    let changed = current.as_ref() != Some(&next);
    set_path(root, path, next)?;
    Ok(changed)
}

/// Numeric addition preserving integer types. `None` when `current` is not a number.
#[allow(clippy::cast_precision_loss)]
fn add_numbers(current: &Bson, delta: &Bson) -> Option<Result<Bson, DbError>> {
    let int = |v: &Bson| match v {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        _ => None,
    };
    let float = |v: &Bson| match v {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    };
    let out = match (current, delta) {
        (Bson::Int32(a), Bson::Int32(b)) => {
            Ok(a.checked_add(*b).map_or_else(|| Bson::Int64(i64::from(*a) + i64::from(*b)), Bson::Int32))
        }
        (Bson::Int32(_) | Bson::Int64(_), Bson::Int32(_) | Bson::Int64(_)) => {
            let (a, b) = (int(current)?, int(delta)?);
            a.checked_add(b)
                .map(Bson::Int64)
                .ok_or_else(|| DbError::Validation("integer overflow in $inc".into()))
        }
        _ => Ok(Bson::Double(float(current)? + float(delta)?)),
    };
    Some(out)
}

fn set_path(root: &mut BsonDocument, path: &str, value: Bson) -> Result<(), DbError> {
    match path.split_once('.') {
        None => {
            root.insert(path.to_string(), value);
            Ok(())
        }
        Some((head, rest)) => {
            if !root.contains_key(head) {
                root.insert(head.to_string(), BsonDocument::new());
            }
            match root.get_mut(head) {
                Some(Bson::Document(sub)) => set_path(sub, rest, value),
                _ => Err(DbError::Validation(format!("field '{head}' is not a document"))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::types::{Projection, SortSpec};
    use bson::doc;

    fn state_with(docs: Vec<BsonDocument>) -> CollectionState {
        let mut st = CollectionState::default();
        for d in docs {
            insert(&mut st, Document::new(d)).unwrap();
        }
        st
    }

    fn racers() -> CollectionState {
        state_with(vec![
            doc! {"_id": 1, "last_name": "Smith", "group": "A", "secs": 120},
            doc! {"_id": 2, "last_name": "Stone", "group": "A", "secs": 90},
            doc! {"_id": 3, "last_name": "Adams", "group": "B", "secs": 90},
        ])
    }

    fn ids(st: &CollectionState, seqs: &[u64]) -> Vec<i32> {
        seqs.iter().map(|s| st.docs[s].doc.get_i32("_id").unwrap()).collect()
    }

    #[test]
    fn generated_id_is_first_field() {
        let mut st = CollectionState::default();
        let id = insert(&mut st, Document::new(doc! {"first_name": "Ann"})).unwrap();
        assert!(matches!(id, Bson::ObjectId(_)));
        let stored = &st.docs.values().next().unwrap().doc;
        assert_eq!(stored.keys().next().map(String::as_str), Some("_id"));
    }

    #[test]
    fn duplicate_and_array_ids_are_rejected() {
        let mut st = racers();
        assert!(insert(&mut st, Document::new(doc! {"_id": 1_i64})).unwrap_err().is_validation());
        assert!(insert(&mut st, Document::new(doc! {"_id": [1]})).unwrap_err().is_validation());
        assert_eq!(st.docs.len(), 3);
    }

    #[test]
    fn ordered_insert_keeps_prefix_on_failure() {
        let mut st = CollectionState::default();
        let (ids, err) = insert_ordered(
            &mut st,
            vec![
                Document::new(doc! {"_id": 1}),
                Document::new(doc! {"_id": 1}),
                Document::new(doc! {"_id": 2}),
            ],
        );
        assert_eq!(ids, vec![Bson::Int32(1)]);
        assert!(err.unwrap().to_string().contains("document 1"));
        assert_eq!(st.docs.len(), 1);
    }

    #[test]
    fn select_sorts_stably_and_paginates() {
        let st = racers();
        let q = FindQuery::new(Filter::True).sort_by(SortSpec::asc("secs"));
        assert_eq!(ids(&st, &select(&st, "c", &q)), vec![2, 3, 1]);
        let q = q.skip(1).limit(1);
        assert_eq!(ids(&st, &select(&st, "c", &q)), vec![3]);
        let q = FindQuery::new(Filter::True).limit(0);
        assert!(select(&st, "c", &q).is_empty());
        let q = FindQuery::new(Filter::eq("group", "A")).projection(Projection::exclude(["group"]));
        assert_eq!(ids(&st, &select(&st, "c", &q)), vec![1, 2]);
    }

    #[test]
    fn select_emits_trace_line() {
        let _g = crate::utils::devlog::enable_thread_sink();
        let st = racers();
        let _ = select(&st, "race1", &FindQuery::new(Filter::eq("group", "B")));
        let lines = crate::utils::devlog::drain();
        assert!(lines.iter().any(|l| l.contains("\"op\":\"find\"") && l.contains("\"result_count\":1")));
    }

    #[test]
    fn inc_preserves_integer_types() {
        let mut d = doc! {"a": 1, "b": i32::MAX, "c": 1.5, "d": i64::MAX};
        apply_update(&mut d, &UpdateDoc::inc("a", 2).unwrap()).unwrap();
        assert_eq!(d.get("a"), Some(&Bson::Int32(3)));
        apply_update(&mut d, &UpdateDoc::inc("b", 1).unwrap()).unwrap();
        assert_eq!(d.get("b"), Some(&Bson::Int64(i64::from(i32::MAX) + 1)));
        apply_update(&mut d, &UpdateDoc::inc("c", 1).unwrap()).unwrap();
        assert_eq!(d.get("c"), Some(&Bson::Double(2.5)));
        apply_update(&mut d, &UpdateDoc::inc("a", 0.5).unwrap()).unwrap();
        assert_eq!(d.get("a"), Some(&Bson::Double(3.5)));
        assert!(apply_update(&mut d, &UpdateDoc::inc("d", 1).unwrap()).unwrap_err().is_validation());
    }

    #[test]
    fn inc_creates_missing_fields_and_rejects_strings() {
        let mut d = doc! {"name": "x"};
        assert!(apply_update(&mut d, &UpdateDoc::inc("split.lap", 4).unwrap()).unwrap());
        assert_eq!(d, doc! {"name": "x", "split": {"lap": 4}});
        assert!(apply_update(&mut d, &UpdateDoc::inc("name", 1).unwrap()).unwrap_err().is_validation());
        assert!(!apply_update(&mut d, &UpdateDoc::inc("split.lap", 0).unwrap()).unwrap());
    }

    #[test]
    fn update_one_touches_first_match_only() {
        let mut st = racers();
        let r = update_one(&mut st, "c", &Filter::eq("secs", 90), &UpdateDoc::inc("secs", 5).unwrap()).unwrap();
        assert_eq!(r, UpdateReport { matched: 1, modified: 1 });
        let secs: Vec<i32> = st.docs.values().map(|s| s.doc.get_i32("secs").unwrap()).collect();
        assert_eq!(secs, vec![120, 95, 90]);
        let r = update_one(&mut st, "c", &Filter::eq("secs", 1), &UpdateDoc::inc("secs", 5).unwrap()).unwrap();
        assert_eq!(r, UpdateReport::default());
    }

    #[test]
    fn replace_keeps_id_and_rejects_a_different_one() {
        let mut st = racers();
        let r = replace_one(&mut st, "c", &Filter::eq("_id", 2), Document::new(doc! {"last_name": "Stone", "secs": 80}))
            .unwrap();
        assert_eq!(r.modified, 1);
        let seq = st.by_id[&id_key(&Bson::Int32(2))];
        assert_eq!(st.docs[&seq].doc, doc! {"_id": 2, "last_name": "Stone", "secs": 80});
        let err = replace_one(&mut st, "c", &Filter::eq("_id", 2), Document::new(doc! {"_id": 9})).unwrap_err();
        assert!(err.is_validation());
        let r = replace_one(&mut st, "c", &Filter::eq("_id", 2), Document::new(doc! {"_id": 2.0, "last_name": "Stone", "secs": 80}))
            .unwrap();
        assert_eq!(r, UpdateReport { matched: 1, modified: 0 });
    }

    #[test]
    fn delete_many_frees_identifiers() {
        let mut st = racers();
        assert_eq!(delete_many(&mut st, "c", &Filter::eq("group", "A")).deleted, 2);
        assert_eq!(count_docs(&st, "c", &Filter::True), 1);
        insert(&mut st, Document::new(doc! {"_id": 1})).unwrap();
        assert_eq!(delete_many(&mut st, "c", &Filter::True).deleted, 2);
        assert!(st.by_id.is_empty());
    }
}
