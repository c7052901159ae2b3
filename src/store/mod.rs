//! Document store collaborator: a named collection that executes fully assembled requests.

pub mod connection;
pub mod memory;
mod persist;

use crate::document::Document;
use crate::errors::DbError;
use crate::query::{
    Cursor, DeleteReport, Filter, FindQuery, InsertOneReport, InsertReport, UpdateDoc, UpdateReport,
};
use once_cell::sync::OnceCell;

pub use connection::Connection;
pub use memory::MemoryCollection;

/// Operations the query layer needs from a collection.
///
/// Every call is a single request to the store. Implementations must be safe to share
/// across threads; concurrent `update_one` calls on the same document must not lose
/// increments.
pub trait DocumentStore: Send + Sync {
    fn name(&self) -> &str;

    /// # Errors
    /// `DbError::StoreUnavailable` when the store cannot be reached.
    fn delete_many(&self, filter: &Filter) -> Result<DeleteReport, DbError>;

    /// Ordered bulk insert. Documents before a failing one stay stored.
    ///
    /// # Errors
    /// `DbError::Validation` for an empty batch or a rejected document;
    /// `DbError::StoreUnavailable` when the store cannot be reached.
    fn insert_many(&self, docs: Vec<Document>) -> Result<InsertReport, DbError>;

    /// # Errors
    /// `DbError::Validation` for a rejected document; `DbError::StoreUnavailable` otherwise.
    fn insert_one(&self, doc: Document) -> Result<InsertOneReport, DbError>;

    /// # Errors
    /// `DbError::StoreUnavailable` when the store cannot be reached. Later batch fetches on
    /// the returned cursor report the same error.
    fn find(&self, query: &FindQuery) -> Result<Cursor, DbError>;

    /// # Errors
    /// `DbError::Validation` when the update cannot be applied to the matched document.
    fn update_one(&self, filter: &Filter, update: &UpdateDoc) -> Result<UpdateReport, DbError>;

    /// # Errors
    /// `DbError::Validation` when the replacement would change the document's `_id`.
    fn replace_one(&self, filter: &Filter, replacement: Document) -> Result<UpdateReport, DbError>;

    /// # Errors
    /// `DbError::StoreUnavailable` when the store cannot be reached.
    fn count(&self, filter: &Filter) -> Result<u64, DbError>;
}

static SHARED: OnceCell<Connection> = OnceCell::new();

/// Process-wide connection, opened on first access from the environment configuration.
///
/// # Errors
/// `DbError::Config` when the configured endpoint is invalid, or any error raised while
/// opening it.
pub fn shared() -> Result<&'static Connection, DbError> {
    SHARED.get_or_try_init(|| {
        let cfg = crate::config::StoreConfig::resolve(None, &crate::config::process_env)?;
        log::info!("opening shared connection to {} (database {})", cfg.url, cfg.database);
        Connection::open(&cfg)
    })
}
