use std::io::Write;

use crate::errors::DbError;
use crate::query::Cursor;

/// Streams a cursor as NDJSON, one document per line. Returns the number written.
pub fn write_ndjson<W: Write>(out: &mut W, cursor: Cursor) -> Result<u64, DbError> {
    let mut n = 0u64;
    for doc in cursor {
        let line = serde_json::to_string(&doc?.to_json()?)?;
        writeln!(out, "{line}").map_err(io_err)?;
        n += 1;
    }
    Ok(n)
}

pub fn write_json<W: Write>(out: &mut W, value: &serde_json::Value) -> Result<(), DbError> {
    writeln!(out, "{value}").map_err(io_err)
}

#[allow(clippy::needless_pass_by_value)]
pub fn io_err(e: std::io::Error) -> DbError {
    DbError::Io(e.to_string())
}

/// Letters are matched upper-case from the command line.
#[must_use]
pub fn normalize_letter(letter: &str) -> String {
    letter.trim().to_uppercase()
}
