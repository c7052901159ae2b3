//! Audit trail for store mutations.
//!
//! Each mutation produces one JSON line on the `racelite::audit` target, which the logger
//! routes to `audit.log`.

pub const AUDIT_TARGET: &str = "racelite::audit";

fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Audit entry for a single-document mutation. `subject` is the document id or, for
/// filtered updates, the rendered filter.
pub fn log_audit(op: &str, db: &str, collection: &str, subject: &str) {
    let line = serde_json::json!({
        "ts": now_ts(), "db": db, "op": op, "collection": collection, "subject": subject
    })
    .to_string();
    log::info!(target: AUDIT_TARGET, "{line}");
}

/// Audit entry for a bulk mutation, carrying a count instead of a document id.
pub fn log_audit_bulk(op: &str, db: &str, collection: &str, count: u64) {
    let line = serde_json::json!({
        "ts": now_ts(), "db": db, "op": op, "collection": collection, "count": count
    })
    .to_string();
    log::info!(target: AUDIT_TARGET, "{line}");
}
