//! Race-results query facade.
//!
//! Each operation assembles one complete query or update request and issues it to the
//! collection handle in a single call. The `*_query` / `*_filter` / `*_update` functions
//! expose those requests without executing them.

use std::path::Path;
use std::sync::Arc;

use bson::{Bson, Document as BsonDocument};

use crate::document::Document;
use crate::errors::DbError;
use crate::loader::load_documents;
use crate::query::{
    Cursor, DeleteReport, Filter, FindQuery, InsertOneReport, InsertReport, Projection, SortSpec,
    UpdateDoc, UpdateReport,
};
use crate::store::{Connection, DocumentStore};
use crate::types::ID_FIELD;

pub const FIRST_NAME: &str = "first_name";
pub const LAST_NAME: &str = "last_name";
pub const NUMBER: &str = "number";
pub const GROUP: &str = "group";
pub const SECS: &str = "secs";

/// Exact match on first and last name, returning only names and number without `_id`.
#[must_use]
pub fn by_name_query(first_name: &str, last_name: &str) -> FindQuery {
    let mut proto = BsonDocument::new();
    proto.insert(FIRST_NAME, first_name);
    proto.insert(LAST_NAME, last_name);
    FindQuery::new(Filter::prototype(&proto))
        .projection(Projection::include([FIRST_NAME, LAST_NAME, NUMBER]).without_id())
}

/// One page of a group's results, fastest first, without `_id` and `group`.
#[must_use]
pub fn group_results_query(group: &str, offset: u64, limit: u64) -> FindQuery {
    FindQuery::new(Filter::eq(GROUP, group))
        .projection(Projection::exclude([ID_FIELD, GROUP]))
        .sort_by(SortSpec::asc(SECS))
        .skip(offset)
        .limit(limit)
}

/// Elapsed time strictly between `min` and `max`.
///
/// # Errors
/// `DbError::Validation` when a bound is not a number.
pub fn between_query(min: impl Into<Bson>, max: impl Into<Bson>) -> Result<FindQuery, DbError> {
    let min = numeric_bound("min", min.into())?;
    let max = numeric_bound("max", max.into())?;
    Ok(FindQuery::new(Filter::open_range(SECS, min, max)))
}

fn numeric_bound(name: &str, v: Bson) -> Result<Bson, DbError> {
    match v {
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => Ok(v),
        other => Err(DbError::Validation(format!("{name} must be a number, got {other}"))),
    }
}

/// Last names starting with `letter` and at least one more character, ordered by last name.
/// Case is matched exactly as given; an empty letter matches every non-empty last name.
///
/// # Errors
/// `DbError::Validation` if the prefix pattern cannot be compiled.
pub fn by_letter_query(letter: &str, offset: u64, limit: u64) -> Result<FindQuery, DbError> {
    Ok(FindQuery::new(Filter::prefix(LAST_NAME, letter)?)
        .sort_by(SortSpec::asc(LAST_NAME))
        .skip(offset)
        .limit(limit))
}

/// Filter selecting the stored document with the racer's `_id`.
///
/// # Errors
/// `DbError::Validation` when the racer has no `_id`.
pub fn update_racer_filter(racer: &Document) -> Result<Filter, DbError> {
    racer
        .id()
        .map(|id| Filter::eq(ID_FIELD, id.clone()))
        .ok_or_else(|| DbError::Validation("racer has no _id".into()))
}

/// `$inc` of the elapsed time by `secs`.
///
/// # Errors
/// `DbError::Validation` when `secs` is not a number.
pub fn add_time_update(secs: impl Into<Bson>) -> Result<UpdateDoc, DbError> {
    UpdateDoc::inc(SECS, secs)
}

/// Race-results operations over one collection handle.
#[derive(Clone)]
pub struct QueryFacade {
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for QueryFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryFacade").field("collection", &self.store.name()).finish()
    }
}

impl QueryFacade {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Facade over collection `name` of `conn`.
    ///
    /// # Errors
    /// Whatever [`Connection::collection`] reports.
    pub fn from_connection(conn: &Connection, name: &str) -> Result<Self, DbError> {
        let col: Arc<dyn DocumentStore> = conn.collection(name)?;
        Ok(Self::new(col))
    }

    #[must_use]
    pub fn collection_name(&self) -> &str {
        self.store.name()
    }

    /// Deletes every document.
    ///
    /// # Errors
    /// `DbError::StoreUnavailable` when the store cannot be reached.
    pub fn clear_all(&self) -> Result<DeleteReport, DbError> {
        let report = self.store.delete_many(&Filter::True)?;
        log::info!("cleared {} documents from {}", report.deleted, self.store.name());
        Ok(report)
    }

    /// Ordered bulk insert; see [`DocumentStore::insert_many`].
    ///
    /// # Errors
    /// `DbError::Validation` for an empty batch or a rejected document.
    pub fn insert_many(&self, docs: Vec<Document>) -> Result<InsertReport, DbError> {
        self.store.insert_many(docs)
    }

    /// Bulk insert from JSON values. Every value is checked before anything is inserted.
    ///
    /// # Errors
    /// `DbError::Validation` naming the first value that is not a JSON object.
    pub fn insert_many_json(&self, values: Vec<serde_json::Value>) -> Result<InsertReport, DbError> {
        let docs = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                Document::from_json(v).map_err(|e| match e {
                    DbError::Validation(msg) => DbError::Validation(format!("element {i}: {msg}")),
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.insert_many(docs)
    }

    /// # Errors
    /// `DbError::Validation` for a rejected document (e.g. duplicate `_id`).
    pub fn insert_one(&self, doc: Document) -> Result<InsertOneReport, DbError> {
        self.store.insert_one(doc)
    }

    /// Loads a JSON array file and inserts its documents in file order.
    ///
    /// # Errors
    /// `DbError::Io` / `DbError::Parse` from the loader, then whatever `insert_many` reports.
    pub fn load_collection(&self, path: impl AsRef<Path>) -> Result<InsertReport, DbError> {
        let docs = load_documents(path.as_ref())?;
        log::info!("loading {} documents from {} into {}", docs.len(), path.as_ref().display(), self.store.name());
        self.insert_many(docs)
    }

    /// Every document matching `prototype` (all documents when empty), unprojected, in store order.
    ///
    /// # Errors
    /// `DbError::StoreUnavailable` when the store cannot be reached.
    pub fn find_all(&self, prototype: &BsonDocument) -> Result<Cursor, DbError> {
        self.store.find(&FindQuery::new(Filter::prototype(prototype)))
    }

    /// Number of documents matching `prototype`.
    ///
    /// # Errors
    /// `DbError::StoreUnavailable` when the store cannot be reached.
    pub fn count(&self, prototype: &BsonDocument) -> Result<u64, DbError> {
        self.store.count(&Filter::prototype(prototype))
    }

    /// # Errors
    /// `DbError::StoreUnavailable` when the store cannot be reached.
    pub fn find_by_name(&self, first_name: &str, last_name: &str) -> Result<Cursor, DbError> {
        self.store.find(&by_name_query(first_name, last_name))
    }

    /// # Errors
    /// `DbError::StoreUnavailable` when the store cannot be reached.
    pub fn find_group_results(&self, group: &str, offset: u64, limit: u64) -> Result<Cursor, DbError> {
        self.store.find(&group_results_query(group, offset, limit))
    }

    /// An empty interval (`min >= max`) yields an empty cursor.
    ///
    /// # Errors
    /// `DbError::Validation` for a non-numeric bound.
    pub fn find_between(&self, min: impl Into<Bson>, max: impl Into<Bson>) -> Result<Cursor, DbError> {
        self.store.find(&between_query(min, max)?)
    }

    /// # Errors
    /// `DbError::Validation` if the prefix pattern cannot be compiled.
    pub fn find_by_letter(&self, letter: &str, offset: u64, limit: u64) -> Result<Cursor, DbError> {
        self.store.find(&by_letter_query(letter, offset, limit)?)
    }

    /// Replaces the stored racer with the same `_id`. No match reports zero matched.
    ///
    /// # Errors
    /// `DbError::Validation` when `racer` has no `_id`.
    pub fn update_racer(&self, racer: Document) -> Result<UpdateReport, DbError> {
        let filter = update_racer_filter(&racer)?;
        self.store.replace_one(&filter, racer)
    }

    /// Atomically adds `secs` (possibly negative) to the first racer with `number`.
    ///
    /// # Errors
    /// `DbError::Validation` when `secs` is not numeric or the stored time is not a number.
    pub fn add_time(&self, number: impl Into<Bson>, secs: impl Into<Bson>) -> Result<UpdateReport, DbError> {
        let update = add_time_update(secs)?;
        self.store.update_one(&Filter::eq(NUMBER, number), &update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn group_query_renders_like_the_store_expects() {
        let q = group_results_query("A", 0, 10);
        assert_eq!(
            q.to_bson(),
            doc! {
                "filter": {"group": "A"},
                "projection": {"_id": 0, "group": 0},
                "sort": {"secs": 1},
                "limit": 10_i64,
            }
        );
    }

    #[test]
    fn name_query_projects_names_and_number() {
        let q = by_name_query("Ann", "Smith");
        assert_eq!(q.filter.to_bson(), doc! {"first_name": "Ann", "last_name": "Smith"});
        assert_eq!(
            q.projection.unwrap().to_bson(),
            doc! {"first_name": 1, "last_name": 1, "number": 1, "_id": 0}
        );
    }

    #[test]
    fn between_requires_numeric_bounds() {
        let q = between_query(60, 90.5).unwrap();
        assert_eq!(q.filter.to_bson(), doc! {"secs": {"$gt": 60, "$lt": 90.5}});
        assert!(between_query("60", 90).unwrap_err().is_validation());
    }

    #[test]
    fn letter_query_keeps_case() {
        let q = by_letter_query("s", 5, 2).unwrap();
        assert_eq!(
            q.to_bson(),
            doc! {
                "filter": {"last_name": {"$regex": "^s.+"}},
                "sort": {"last_name": 1},
                "skip": 5_i64,
                "limit": 2_i64,
            }
        );
    }

    #[test]
    fn racer_filter_needs_identifier() {
        let racer = Document::new(doc! {"_id": 4, "secs": 1});
        assert_eq!(update_racer_filter(&racer).unwrap().to_bson(), doc! {"_id": 4});
        assert!(update_racer_filter(&Document::new(doc! {"secs": 1})).unwrap_err().is_validation());
        assert_eq!(add_time_update(-5).unwrap().to_bson(), doc! {"$inc": {"secs": -5}});
    }
}
