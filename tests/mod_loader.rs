use racelite::DbError;
use racelite::loader::{load_documents, parse_documents};

#[test]
fn loads_array_of_objects_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("race.json");
    std::fs::write(
        &path,
        r#"[
            {"number": 1, "first_name": "Ann", "last_name": "Smith", "group": "A", "secs": 120},
            {"number": 2, "first_name": "Bo", "last_name": "Stone", "group": "A", "secs": 90, "split": {"lap": 44}}
        ]"#,
    )
    .unwrap();
    let docs = load_documents(&path).unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].get_str("last_name").unwrap(), "Smith");
    assert!(docs[1].get_document("split").is_ok());
    assert!(docs.iter().all(|d| d.id().is_none()));
}

#[test]
fn malformed_files_are_parse_errors() {
    for text in ["", "{\"a\":1}", "[1, 2]", "[{\"a\":1}, \"x\"]", "[{\"a\":1},"] {
        assert!(matches!(parse_documents(text), Err(DbError::Parse(_))), "{text}");
    }
}

#[test]
fn unreadable_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_documents(&dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, DbError::Io(_)));
}
