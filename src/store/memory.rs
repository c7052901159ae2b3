use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bson::{Bson, Document as BsonDocument};
use parking_lot::RwLock;

use super::DocumentStore;
use super::persist;
use crate::document::{Document, Metadata};
use crate::errors::DbError;
use crate::query::telemetry::{log_audit, log_audit_bulk};
use crate::query::{
    BatchSource, Cursor, DEFAULT_BATCH_SIZE, DeleteReport, Filter, FindQuery, InsertOneReport,
    InsertReport, Projection, UpdateDoc, UpdateReport, exec, project,
};
use crate::types::id_key;
use crate::utils::num::usize_to_u64;

#[derive(Debug, Clone)]
pub(crate) struct StoredDocument {
    pub(crate) doc: BsonDocument,
    pub(crate) metadata: Metadata,
}

/// Documents of one collection keyed by insertion sequence, plus an identifier index.
#[derive(Debug, Default, Clone)]
pub(crate) struct CollectionState {
    pub(crate) docs: BTreeMap<u64, StoredDocument>,
    pub(crate) by_id: HashMap<String, u64>,
    pub(crate) next_seq: u64,
}

/// An embedded collection held in memory, optionally mirrored to a JSON file.
///
/// Handles produced by the same [`Connection`](super::Connection) share its open flag, so
/// closing the connection makes every handle and every live cursor report
/// `DbError::StoreUnavailable`.
pub struct MemoryCollection {
    name: String,
    database: String,
    state: Arc<RwLock<CollectionState>>,
    open: Arc<AtomicBool>,
    file: Option<PathBuf>,
    batch_size: usize,
}

impl std::fmt::Debug for MemoryCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCollection")
            .field("name", &self.name)
            .field("database", &self.database)
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}

impl MemoryCollection {
    /// A standalone collection with its own lifetime, not attached to any connection.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            database: "memory".into(),
            state: Arc::new(RwLock::new(CollectionState::default())),
            open: Arc::new(AtomicBool::new(true)),
            file: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Opens a collection bound to a connection's open flag, loading `file` when given.
    pub(crate) fn attach(
        name: &str,
        database: &str,
        open: Arc<AtomicBool>,
        file: Option<PathBuf>,
    ) -> Result<Self, DbError> {
        let mut state = CollectionState::default();
        if let Some(path) = &file {
            let docs = persist::load(path)?;
            let n = docs.len();
            let (_, err) = exec::insert_ordered(&mut state, docs);
            if let Some(e) = err {
                return Err(DbError::StoreUnavailable(format!(
                    "collection file {} is inconsistent: {e}",
                    path.display()
                )));
            }
            log::info!("loaded {n} documents into {database}.{name} from {}", path.display());
        }
        Ok(Self {
            name: name.to_string(),
            database: database.to_string(),
            state: Arc::new(RwLock::new(state)),
            open,
            file,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Overrides how many documents a cursor fetches per round trip.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Store-side timestamps of the document with identifier `id`.
    #[must_use]
    pub fn metadata(&self, id: &Bson) -> Option<Metadata> {
        let st = self.state.read();
        let seq = st.by_id.get(&id_key(id))?;
        st.docs.get(seq).map(|s| s.metadata.clone())
    }

    fn ensure_open(&self) -> Result<(), DbError> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(closed(&self.database))
        }
    }

    /// Runs `op` against the collection and commits its effect.
    ///
    /// With a backing file the change is built on a copy and only swapped in once the file
    /// has been written, so a failed write leaves the collection as it was.
    fn commit<T>(
        &self,
        state: &mut CollectionState,
        op: impl FnOnce(&mut CollectionState) -> T,
        dirty: impl FnOnce(&T) -> bool,
    ) -> Result<T, DbError> {
        let Some(path) = &self.file else {
            return Ok(op(state));
        };
        let mut next = state.clone();
        let out = op(&mut next);
        if dirty(&out) {
            persist::save(path, next.docs.values().map(|s| &s.doc))?;
            *state = next;
        }
        Ok(out)
    }
}

fn closed(database: &str) -> DbError {
    DbError::StoreUnavailable(format!("connection to database '{database}' is closed"))
}

impl DocumentStore for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn delete_many(&self, filter: &Filter) -> Result<DeleteReport, DbError> {
        self.ensure_open()?;
        let mut st = self.state.write();
        let report = self.commit(&mut st, |st| exec::delete_many(st, &self.name, filter), |r| r.deleted > 0)?;
        log_audit_bulk("delete_many", &self.database, &self.name, report.deleted);
        Ok(report)
    }

    fn insert_many(&self, docs: Vec<Document>) -> Result<InsertReport, DbError> {
        self.ensure_open()?;
        if docs.is_empty() {
            return Err(DbError::Validation("insert_many requires at least one document".into()));
        }
        let mut st = self.state.write();
        let (ids, err) =
            self.commit(&mut st, |st| exec::insert_ordered(st, docs), |(ids, _)| !ids.is_empty())?;
        log_audit_bulk("insert_many", &self.database, &self.name, usize_to_u64(ids.len()));
        match err {
            Some(e) => Err(e),
            None => Ok(InsertReport { inserted: usize_to_u64(ids.len()), ids }),
        }
    }

    fn insert_one(&self, doc: Document) -> Result<InsertOneReport, DbError> {
        self.ensure_open()?;
        let mut st = self.state.write();
        let id = self.commit(&mut st, |st| exec::insert(st, doc), Result::is_ok)??;
        log_audit("insert", &self.database, &self.name, &id.to_string());
        Ok(InsertOneReport { id })
    }

    fn find(&self, query: &FindQuery) -> Result<Cursor, DbError> {
        self.ensure_open()?;
        let seqs = exec::select(&self.state.read(), &self.name, query);
        if seqs.is_empty() {
            return Ok(Cursor::empty());
        }
        let source = MemoryBatchSource {
            state: Arc::clone(&self.state),
            open: Arc::clone(&self.open),
            database: self.database.clone(),
            seqs: seqs.into(),
            projection: query.projection.clone(),
        };
        Ok(Cursor::new(Box::new(source), self.batch_size))
    }

    fn update_one(&self, filter: &Filter, update: &UpdateDoc) -> Result<UpdateReport, DbError> {
        self.ensure_open()?;
        let mut st = self.state.write();
        let report = self.commit(
            &mut st,
            |st| exec::update_one(st, &self.name, filter, update),
            |r| matches!(r, Ok(r) if r.modified > 0),
        )??;
        if report.modified > 0 {
            log_audit("update", &self.database, &self.name, &filter.to_bson().to_string());
        }
        Ok(report)
    }

    fn replace_one(&self, filter: &Filter, replacement: Document) -> Result<UpdateReport, DbError> {
        self.ensure_open()?;
        let mut st = self.state.write();
        let report = self.commit(
            &mut st,
            |st| exec::replace_one(st, &self.name, filter, replacement),
            |r| matches!(r, Ok(r) if r.modified > 0),
        )??;
        if report.modified > 0 {
            log_audit("replace", &self.database, &self.name, &filter.to_bson().to_string());
        }
        Ok(report)
    }

    fn count(&self, filter: &Filter) -> Result<u64, DbError> {
        self.ensure_open()?;
        Ok(exec::count_docs(&self.state.read(), &self.name, filter))
    }
}

/// Fetches matched documents lazily by sequence number.
///
/// Documents deleted after the find was issued are skipped.
struct MemoryBatchSource {
    state: Arc<RwLock<CollectionState>>,
    open: Arc<AtomicBool>,
    database: String,
    seqs: VecDeque<u64>,
    projection: Option<Projection>,
}

impl BatchSource for MemoryBatchSource {
    fn next_batch(&mut self, max: usize) -> Result<Vec<Document>, DbError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(closed(&self.database));
        }
        let st = self.state.read();
        let mut out = Vec::with_capacity(max.min(self.seqs.len()));
        while out.len() < max {
            let Some(seq) = self.seqs.pop_front() else {
                break;
            };
            if let Some(stored) = st.docs.get(&seq) {
                let doc = match &self.projection {
                    Some(p) => project(&stored.doc, p),
                    None => stored.doc.clone(),
                };
                out.push(Document::new(doc));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn seeded(batch: usize) -> MemoryCollection {
        let c = MemoryCollection::new("race1").with_batch_size(batch);
        let docs = (0..5).map(|i| Document::new(doc! {"number": i, "secs": 100 - i})).collect();
        c.insert_many(docs).unwrap();
        c
    }

    #[test]
    fn cursor_fetches_lazily_in_batches() {
        let c = seeded(2);
        let cur = c.find(&FindQuery::new(Filter::True)).unwrap();
        let numbers: Vec<i32> = cur.to_vec().unwrap().iter().map(|d| d.get_i32("number").unwrap()).collect();
        assert_eq!(numbers, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn cursor_skips_documents_deleted_after_find() {
        let c = seeded(2);
        let mut cur = c.find(&FindQuery::new(Filter::True)).unwrap();
        assert!(cur.try_next().unwrap().is_some());
        c.delete_many(&Filter::eq("number", 3)).unwrap();
        let rest: Vec<i32> = cur.to_vec().unwrap().iter().map(|d| d.get_i32("number").unwrap()).collect();
        assert_eq!(rest, vec![1, 2, 4]);
    }

    #[test]
    fn closed_flag_fails_operations_and_cursors() {
        let c = seeded(1);
        let mut cur = c.find(&FindQuery::new(Filter::True)).unwrap();
        assert!(cur.try_next().unwrap().is_some());
        c.open.store(false, Ordering::Release);
        assert!(cur.try_next().unwrap_err().is_unavailable());
        assert!(c.count(&Filter::True).unwrap_err().is_unavailable());
        assert!(c.insert_one(Document::new(doc! {"x": 1})).unwrap_err().is_unavailable());
    }

    #[test]
    fn empty_bulk_insert_is_rejected() {
        let c = MemoryCollection::new("race1");
        assert!(c.insert_many(Vec::new()).unwrap_err().is_validation());
    }

    #[test]
    fn metadata_tracks_updates() {
        let c = MemoryCollection::new("race1");
        let id = c.insert_one(Document::new(doc! {"secs": 1})).unwrap().id;
        let before = c.metadata(&id).unwrap();
        c.update_one(&Filter::eq("_id", id.clone()), &UpdateDoc::inc("secs", 1).unwrap()).unwrap();
        let after = c.metadata(&id).unwrap();
        assert_eq!(before.created_at, after.created_at);
        assert!(after.updated_at >= before.updated_at);
    }

    #[test]
    fn file_backed_collection_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test").join("race1.json");
        let open = Arc::new(AtomicBool::new(true));
        let c = MemoryCollection::attach("race1", "test", Arc::clone(&open), Some(path.clone())).unwrap();
        c.insert_one(Document::new(doc! {"_id": 1, "secs": 10})).unwrap();
        c.update_one(&Filter::eq("_id", 1), &UpdateDoc::inc("secs", 5).unwrap()).unwrap();
        let again = MemoryCollection::attach("race1", "test", open, Some(path)).unwrap();
        let docs = again.find(&FindQuery::new(Filter::True)).unwrap().to_vec().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].to_json().unwrap()["secs"], 15);
    }
}
