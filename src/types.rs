use bson::Bson;

/// Name of the store-assigned identifier field.
pub const ID_FIELD: &str = "_id";

/// Canonical lookup key for an identifier value.
///
/// Numerically equal identifiers (`1`, `1i64`, `1.0`) map to the same key so that
/// uniqueness follows value equality rather than BSON type.
#[must_use]
pub fn id_key(id: &Bson) -> String {
    match id {
        Bson::Int32(i) => format!("n:{i}"),
        Bson::Int64(i) => format!("n:{i}"),
        #[allow(clippy::cast_possible_truncation, clippy::float_cmp, clippy::cast_precision_loss)]
        Bson::Double(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => format!("n:{}", *f as i64),
        Bson::Double(f) => format!("d:{f}"),
        Bson::String(s) => format!("s:{s}"),
        Bson::ObjectId(oid) => format!("o:{}", oid.to_hex()),
        other => format!("x:{other}"),
    }
}
