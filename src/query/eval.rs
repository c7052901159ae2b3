use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use super::types::{
    CmpOp, Filter, MAX_PATH_DEPTH, MAX_SORT_FIELDS, Order, Projection, ProjectionMode, SortSpec,
};
use crate::types::ID_FIELD;

pub fn eval_filter(doc: &BsonDocument, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Cmp { path, op, value } => match (get_path(doc, path), op) {
            (Some(v), CmpOp::Eq) => matches_eq(v, value),
            (Some(v), CmpOp::Gt) => compare_bracketed(v, value) == Some(Ordering::Greater),
            (Some(v), CmpOp::Lt) => compare_bracketed(v, value) == Some(Ordering::Less),
            (None, _) => false,
        },
        Filter::Regex { path, regex } => match get_path(doc, path) {
            Some(Bson::String(s)) => regex.is_match(s),
            _ => false,
        },
    }
}

fn matches_eq(field: &Bson, value: &Bson) -> bool {
    if bson_equal(field, value) {
        return true;
    }
    match field {
        Bson::Array(items) if !matches!(value, Bson::Array(_)) => {
            items.iter().any(|x| bson_equal(x, value))
        }
        _ => false,
    }
}

pub(crate) fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut cur = doc.get(first);
    for (depth, part) in parts.enumerate() {
        if depth + 2 > MAX_PATH_DEPTH {
            return None;
        }
        match cur {
            Some(Bson::Document(d)) => cur = d.get(part),
            _ => return None,
        }
    }
    cur
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

fn as_i64(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        _ => None,
    }
}

/// Value equality with numeric types compared by value.
#[allow(clippy::float_cmp)]
pub(crate) fn bson_equal(a: &Bson, b: &Bson) -> bool {
    if let (Some(x), Some(y)) = (as_i64(a), as_i64(b)) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x == y;
    }
    a == b
}

/// Ordering within a comparison bracket; `None` when the values are not comparable.
pub(crate) fn compare_bracketed(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_i64(a), as_i64(b)) {
        return Some(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.as_bytes().cmp(y.as_bytes())),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.bytes().cmp(&y.bytes())),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total ordering used for sorting: type bracket first, then value.
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    let ra = type_rank(a);
    let rb = type_rank(b);
    if ra != rb {
        return ra.cmp(&rb);
    }
    if let Some(o) = compare_bracketed(a, b) {
        return o;
    }
    // NaN, or types without a natural order
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => Ordering::Equal,
    }
}

fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 255,
        _ => 12,
    }
}

pub fn compare_docs(a: &BsonDocument, b: &BsonDocument, sort: &[SortSpec]) -> Ordering {
    for s in sort.iter().take(MAX_SORT_FIELDS) {
        // missing sorts with null
        let x = get_path(a, &s.field).unwrap_or(&Bson::Null);
        let y = get_path(b, &s.field).unwrap_or(&Bson::Null);
        let ord = compare_bson(x, y);
        if ord != Ordering::Equal {
            return if s.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

/// Applies a projection, keeping the source document's field order.
pub fn project(doc: &BsonDocument, projection: &Projection) -> BsonDocument {
    let mut out = BsonDocument::new();
    for (k, v) in doc {
        let keep = if k == ID_FIELD {
            projection.include_id
        } else {
            match &projection.mode {
                ProjectionMode::Include(fields) => fields.iter().any(|f| f == k),
                ProjectionMode::Exclude(fields) => !fields.iter().any(|f| f == k),
            }
        };
        if keep {
            out.insert(k.clone(), v.clone());
        }
    }
    out
}
