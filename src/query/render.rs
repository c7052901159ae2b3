//! Renders query requests in the store's document syntax
//! (`{"secs": {"$gt": 60, "$lt": 90}}`, `{"_id": 0, "group": 0}`, `{"$inc": {...}}`).

use bson::{Bson, Document as BsonDocument, doc};

use super::types::{CmpOp, Filter, FindQuery, Order, Projection, ProjectionMode, SortSpec, UpdateDoc};
use crate::types::ID_FIELD;
use crate::utils::num::u64_to_i64_saturating;

impl Filter {
    #[must_use]
    pub fn to_bson(&self) -> BsonDocument {
        let mut out = BsonDocument::new();
        if merge_into(&mut out, self) {
            out
        } else {
            match self {
                Self::And(fs) => {
                    doc! { "$and": fs.iter().map(|f| Bson::Document(f.to_bson())).collect::<Vec<_>>() }
                }
                _ => out,
            }
        }
    }
}

/// Adds `filter` to `out` as plain field conditions. Returns false on a conflict that
/// needs an explicit `$and`.
fn merge_into(out: &mut BsonDocument, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| merge_into(out, f)),
        Filter::Cmp { path, op: CmpOp::Eq, value } => {
            if out.contains_key(path) {
                return false;
            }
            out.insert(path.clone(), value.clone());
            true
        }
        Filter::Cmp { path, op, value } => {
            let key = if *op == CmpOp::Gt { "$gt" } else { "$lt" };
            merge_operator(out, path, key, value.clone())
        }
        Filter::Regex { path, regex } => merge_operator(out, path, "$regex", Bson::String(regex.as_str().to_string())),
    }
}

fn merge_operator(out: &mut BsonDocument, path: &str, key: &str, value: Bson) -> bool {
    match out.get_mut(path) {
        None => {
            out.insert(path.to_string(), doc! { key: value });
            true
        }
        Some(Bson::Document(ops)) if ops.keys().all(|k| k.starts_with('$')) && !ops.contains_key(key) => {
            ops.insert(key.to_string(), value);
            true
        }
        Some(_) => false,
    }
}

impl Projection {
    #[must_use]
    pub fn to_bson(&self) -> BsonDocument {
        let mut out = BsonDocument::new();
        match &self.mode {
            ProjectionMode::Include(fields) => {
                for f in fields {
                    out.insert(f.clone(), 1);
                }
                if !self.include_id {
                    out.insert(ID_FIELD, 0);
                }
            }
            ProjectionMode::Exclude(fields) => {
                if !self.include_id {
                    out.insert(ID_FIELD, 0);
                }
                for f in fields {
                    out.insert(f.clone(), 0);
                }
            }
        }
        out
    }
}

#[must_use]
pub fn sort_to_bson(sort: &[SortSpec]) -> BsonDocument {
    let mut out = BsonDocument::new();
    for s in sort {
        out.insert(s.field.clone(), if s.order == Order::Asc { 1 } else { -1 });
    }
    out
}

impl FindQuery {
    /// The whole request as one document, in the order the store applies it.
    #[must_use]
    pub fn to_bson(&self) -> BsonDocument {
        let mut out = doc! { "filter": self.filter.to_bson() };
        if let Some(p) = &self.projection {
            out.insert("projection", p.to_bson());
        }
        if !self.sort.is_empty() {
            out.insert("sort", sort_to_bson(&self.sort));
        }
        if self.skip > 0 {
            out.insert("skip", u64_to_i64_saturating(self.skip));
        }
        if let Some(l) = self.limit {
            out.insert("limit", u64_to_i64_saturating(l));
        }
        out
    }
}

impl UpdateDoc {
    #[must_use]
    pub fn to_bson(&self) -> BsonDocument {
        let mut inc = BsonDocument::new();
        for (k, v) in &self.inc {
            inc.insert(k.clone(), v.clone());
        }
        doc! { "$inc": inc }
    }
}
