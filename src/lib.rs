pub mod cli;
pub mod config;
pub mod document;
pub mod errors;
pub mod facade;
pub mod loader;
pub mod logger;
pub mod query;
pub mod store;
pub mod types;
pub mod utils;

pub use config::StoreConfig;
pub use document::Document;
pub use errors::DbError;
pub use facade::QueryFacade;
pub use query::Cursor;
pub use store::{Connection, DocumentStore, MemoryCollection};

/// Initializes logging from the `RACELITE_LOG_*` environment variables.
///
/// Call once before other operations; the facade itself works without it.
///
/// # Errors
/// Returns an error if the log files cannot be opened.
pub fn init() -> Result<(), DbError> {
    logger::configure_from_env()
}
