use crate::errors::DbError;
use crate::types::ID_FIELD;
use bson::{Bson, Document as BsonDocument};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

/// A schema-less record: an ordered mapping from field name to BSON value.
///
/// Field order is preserved as inserted; the identifier lives under `_id` once the
/// store has assigned it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct Document {
    pub data: BsonDocument,
}

impl Document {
    #[must_use]
    pub const fn new(data: BsonDocument) -> Self {
        Self { data }
    }

    /// The identifier, if the document has one.
    #[must_use]
    pub fn id(&self) -> Option<&Bson> {
        self.data.get(ID_FIELD)
    }

    #[must_use]
    pub fn into_inner(self) -> BsonDocument {
        self.data
    }

    /// Builds a document from a JSON value.
    ///
    /// # Errors
    /// Returns `DbError::Validation` when `value` is not a JSON object.
    pub fn from_json(value: serde_json::Value) -> Result<Self, DbError> {
        if !value.is_object() {
            return Err(DbError::Validation(format!(
                "expected a JSON object, found {}",
                json_kind(&value)
            )));
        }
        let data: BsonDocument = serde_json::from_value(value)
            .map_err(|e| DbError::Validation(format!("not document-shaped: {e}")))?;
        Ok(Self { data })
    }

    /// Renders the document as JSON.
    ///
    /// # Errors
    /// Returns `DbError::Json` if a value cannot be represented as JSON.
    pub fn to_json(&self) -> Result<serde_json::Value, DbError> {
        Ok(serde_json::to_value(&self.data)?)
    }
}

impl From<BsonDocument> for Document {
    fn from(data: BsonDocument) -> Self {
        Self { data }
    }
}

impl From<Document> for BsonDocument {
    fn from(doc: Document) -> Self {
        doc.data
    }
}

impl Deref for Document {
    type Target = BsonDocument;
    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl DerefMut for Document {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}

pub(crate) const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Store-side bookkeeping kept next to each stored document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self { created_at: now, updated_at: now }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn from_json_object_keeps_field_order() {
        let v = serde_json::json!({"last_name": "Smith", "first_name": "Ann", "secs": 120});
        let d = Document::from_json(v).unwrap();
        let keys: Vec<&str> = d.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["last_name", "first_name", "secs"]);
        assert_eq!(d.get_str("last_name").unwrap(), "Smith");
    }

    #[test]
    fn from_json_rejects_non_objects() {
        let err = Document::from_json(serde_json::json!([1, 2])).unwrap_err();
        assert!(err.is_validation());
        let err = Document::from_json(serde_json::json!("racer")).unwrap_err();
        assert!(err.to_string().contains("string"));
    }

    #[test]
    fn id_reads_identifier_field() {
        let d = Document::new(doc! {"_id": 3, "number": 3});
        assert_eq!(d.id(), Some(&Bson::Int32(3)));
        assert!(Document::new(doc! {"number": 3}).id().is_none());
    }
}
