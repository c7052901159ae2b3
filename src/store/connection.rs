use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use super::memory::MemoryCollection;
use crate::config::StoreConfig;
use crate::errors::DbError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Backend {
    Memory,
    /// Root directory; collections live at `<root>/<database>/<collection>.json`.
    File(PathBuf),
}

impl Backend {
    fn parse(url: &str) -> Result<Self, DbError> {
        if let Some(rest) = url.strip_prefix("memory://") {
            if !rest.is_empty() {
                log::warn!("ignoring path '{rest}' in memory endpoint");
            }
            return Ok(Self::Memory);
        }
        if let Some(dir) = url.strip_prefix("file://") {
            if dir.trim().is_empty() {
                return Err(DbError::Config("file:// endpoint needs a directory".into()));
            }
            return Ok(Self::File(PathBuf::from(dir)));
        }
        Err(DbError::Config(format!(
            "unsupported endpoint '{url}': expected memory:// or file://<dir>"
        )))
    }
}

struct ConnectionInner {
    database: String,
    backend: Backend,
    open: Arc<AtomicBool>,
    collections: RwLock<HashMap<String, Arc<MemoryCollection>>>,
}

/// A handle to one database on a store endpoint.
///
/// Clones share the same collections and the same open/closed state.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("database", &self.inner.database)
            .field("backend", &self.inner.backend)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Opens the endpoint named by `cfg.url`.
    ///
    /// # Errors
    /// `DbError::Config` for an unsupported endpoint or an empty database name;
    /// `DbError::StoreUnavailable` when a file endpoint's directory cannot be created.
    pub fn open(cfg: &StoreConfig) -> Result<Self, DbError> {
        let backend = Backend::parse(&cfg.url)?;
        if cfg.database.trim().is_empty() {
            return Err(DbError::Config("database name must not be empty".into()));
        }
        if let Backend::File(root) = &backend {
            let dir = root.join(&cfg.database);
            std::fs::create_dir_all(&dir).map_err(|e| {
                DbError::StoreUnavailable(format!("cannot create {}: {e}", dir.display()))
            })?;
        }
        log::info!("connected to {} (database {})", cfg.url, cfg.database);
        Ok(Self::with_backend(&cfg.database, backend))
    }

    /// A process-local connection that persists nothing.
    #[must_use]
    pub fn in_memory(database: &str) -> Self {
        Self::with_backend(database, Backend::Memory)
    }

    fn with_backend(database: &str, backend: Backend) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                database: database.to_string(),
                backend,
                open: Arc::new(AtomicBool::new(true)),
                collections: RwLock::new(HashMap::new()),
            }),
        }
    }

    #[must_use]
    pub fn database(&self) -> &str {
        &self.inner.database
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::Acquire)
    }

    /// Returns the handle for collection `name`, creating the collection on first use.
    ///
    /// # Errors
    /// `DbError::Validation` for an invalid name; `DbError::StoreUnavailable` once the
    /// connection is closed or when a persisted collection cannot be loaded.
    pub fn collection(&self, name: &str) -> Result<Arc<MemoryCollection>, DbError> {
        if !self.is_open() {
            return Err(DbError::StoreUnavailable(format!(
                "connection to database '{}' is closed",
                self.inner.database
            )));
        }
        validate_collection_name(name)?;
        if let Some(c) = self.inner.collections.read().get(name) {
            return Ok(Arc::clone(c));
        }
        let mut map = self.inner.collections.write();
        if let Some(c) = map.get(name) {
            return Ok(Arc::clone(c));
        }
        let file = match &self.inner.backend {
            Backend::Memory => None,
            Backend::File(root) => Some(root.join(&self.inner.database).join(format!("{name}.json"))),
        };
        let col = Arc::new(MemoryCollection::attach(
            name,
            &self.inner.database,
            Arc::clone(&self.inner.open),
            file,
        )?);
        map.insert(name.to_string(), Arc::clone(&col));
        Ok(col)
    }

    /// Closes the connection. Every handle and cursor obtained from it fails afterwards.
    pub fn close(&self) {
        if self.inner.open.swap(false, Ordering::AcqRel) {
            log::info!("closed connection to database {}", self.inner.database);
        }
    }
}

fn validate_collection_name(name: &str) -> Result<(), DbError> {
    let ok = !name.is_empty()
        && name.len() <= 120
        && !name.starts_with('.')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if ok {
        Ok(())
    } else {
        Err(DbError::Validation(format!("invalid collection name '{name}'")))
    }
}
