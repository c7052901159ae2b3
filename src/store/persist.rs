use std::io::{self, Write};
use std::path::Path;

use bson::Document as BsonDocument;
use tempfile::NamedTempFile;

use crate::document::Document;
use crate::errors::DbError;

/// Reads a persisted collection. A missing file is an empty collection.
pub(crate) fn load(path: &Path) -> Result<Vec<Document>, DbError> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(DbError::StoreUnavailable(format!("cannot read {}: {e}", path.display())));
        }
    };
    let docs: Vec<BsonDocument> = serde_json::from_slice(&bytes).map_err(|e| {
        DbError::StoreUnavailable(format!("corrupt collection file {}: {e}", path.display()))
    })?;
    Ok(docs.into_iter().map(Document::new).collect())
}

/// Rewrites the collection file through a temp file in the same directory.
pub(crate) fn save<'a, I>(path: &Path, docs: I) -> Result<(), DbError>
where
    I: IntoIterator<Item = &'a BsonDocument>,
{
    write_atomic(path, docs.into_iter().collect())
        .map_err(|e| DbError::StoreUnavailable(format!("cannot write {}: {e}", path.display())))
}

fn write_atomic(dest: &Path, docs: Vec<&BsonDocument>) -> io::Result<()> {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    if !parent.exists() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = NamedTempFile::new_in(parent)?;
    serde_json::to_writer_pretty(&mut tmp, &docs)?;
    tmp.write_all(b"\n")?;
    tmp.flush()?;
    let mut last_err: Option<io::Error> = None;
    for attempt in 0..3 {
        match tmp.persist(dest) {
            Ok(_) => return Ok(()),
            Err(pe) => {
                last_err = Some(pe.error);
                tmp = pe.file;
                std::thread::sleep(std::time::Duration::from_millis(10 + attempt * 5));
            }
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::other("failed to persist collection file")))
}
