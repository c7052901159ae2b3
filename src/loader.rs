//! Bulk loader: a JSON file holding an array of objects, one per document.

use std::path::Path;

use crate::document::{Document, json_kind};
use crate::errors::DbError;

/// Reads `path` and returns its documents in file order.
///
/// # Errors
/// `DbError::Io` when the file cannot be read; `DbError::Parse` for invalid JSON, a
/// top-level value that is not an array, or an element that is not an object.
pub fn load_documents(path: &Path) -> Result<Vec<Document>, DbError> {
    log::info!("load: path={}", path.display());
    let text = std::fs::read_to_string(path)
        .map_err(|e| DbError::Io(format!("cannot read {}: {e}", path.display())))?;
    parse_documents(&text)
}

/// Parses the text of a bulk file.
///
/// # Errors
/// `DbError::Parse` as for [`load_documents`].
pub fn parse_documents(text: &str) -> Result<Vec<Document>, DbError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| DbError::Parse(format!("invalid JSON: {e}")))?;
    let serde_json::Value::Array(items) = value else {
        return Err(DbError::Parse(format!(
            "expected a JSON array of documents, found {}",
            json_kind(&value)
        )));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            if !item.is_object() {
                return Err(DbError::Parse(format!(
                    "element {i} is a {}, not an object",
                    json_kind(&item)
                )));
            }
            Document::from_json(item).map_err(|e| DbError::Parse(format!("element {i}: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_file_order() {
        let docs = parse_documents(r#"[{"number":2},{"number":1,"secs":61.5}]"#).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].get_f64("secs").unwrap(), 61.5);
    }

    #[test]
    fn names_offending_element() {
        let err = parse_documents(r#"[{"a":1}, 3]"#).unwrap_err();
        assert!(matches!(&err, DbError::Parse(m) if m.contains("element 1")));
        assert!(matches!(parse_documents(r#"{"a":1}"#), Err(DbError::Parse(_))));
        assert!(matches!(parse_documents("[{"), Err(DbError::Parse(_))));
    }

    #[test]
    fn empty_array_is_no_documents() {
        assert!(parse_documents("[]").unwrap().is_empty());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_documents(&dir.path().join("none.json")), Err(DbError::Io(_))));
    }
}
