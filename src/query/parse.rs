use bson::{Bson, Document as BsonDocument};

use crate::document::{Document, json_kind};
use crate::errors::DbError;

/// Parses a JSON object used as an exact-match prototype.
///
/// # Errors
/// `DbError::Parse` for malformed JSON or a value that is not an object.
pub fn parse_prototype_json(s: &str) -> Result<BsonDocument, DbError> {
    Ok(parse_document_json(s)?.into_inner())
}

/// Parses a JSON object into a document.
///
/// # Errors
/// `DbError::Parse` for malformed JSON or a value that is not an object.
pub fn parse_document_json(s: &str) -> Result<Document, DbError> {
    let value: serde_json::Value =
        serde_json::from_str(s).map_err(|e| DbError::Parse(format!("invalid JSON: {e}")))?;
    if !value.is_object() {
        return Err(DbError::Parse(format!("expected a JSON object, found {}", json_kind(&value))));
    }
    Document::from_json(value).map_err(|e| DbError::Parse(e.to_string()))
}

/// Interprets a command-line value: integers, then decimals, then booleans, else a string.
/// Integers that fit 32 bits stay 32-bit.
#[must_use]
pub fn infer_scalar(field: &str) -> Bson {
    let t = field.trim();
    if let Ok(i) = t.parse::<i64>() {
        return i32::try_from(i).map_or(Bson::Int64(i), Bson::Int32);
    }
    if let Ok(f) = t.parse::<f64>()
        && f.is_finite()
    {
        return Bson::Double(f);
    }
    match t.to_ascii_lowercase().as_str() {
        "true" => Bson::Boolean(true),
        "false" => Bson::Boolean(false),
        _ => Bson::String(field.to_string()),
    }
}
