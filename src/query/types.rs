use crate::errors::DbError;
use crate::types::ID_FIELD;
use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};

// Safety limits to bound work per query
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_SORT_FIELDS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

impl SortSpec {
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: Order::Asc }
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: Order::Desc }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Gt,
    Lt,
}

/// A read-only predicate over documents.
#[derive(Debug, Clone)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Cmp { path: String, op: CmpOp, value: Bson },
    Regex { path: String, regex: regex::Regex },
}

impl Filter {
    /// Exact-match filter: every field of `prototype` must equal the given value.
    /// An empty prototype matches every document.
    #[must_use]
    pub fn prototype(prototype: &BsonDocument) -> Self {
        let mut parts: Vec<Self> = prototype
            .iter()
            .map(|(k, v)| Self::Cmp { path: k.clone(), op: CmpOp::Eq, value: v.clone() })
            .collect();
        match parts.len() {
            0 => Self::True,
            1 => parts.remove(0),
            _ => Self::And(parts),
        }
    }

    #[must_use]
    pub fn eq(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::Cmp { path: path.into(), op: CmpOp::Eq, value: value.into() }
    }

    /// Open interval: `lower < path < upper`, both bounds exclusive.
    #[must_use]
    pub fn open_range(path: impl Into<String>, lower: Bson, upper: Bson) -> Self {
        let path = path.into();
        Self::And(vec![
            Self::Cmp { path: path.clone(), op: CmpOp::Gt, value: lower },
            Self::Cmp { path, op: CmpOp::Lt, value: upper },
        ])
    }

    /// Prefix filter: the string at `path` starts with `prefix` and has at least one
    /// more character. The prefix is literal and case-sensitive; an empty prefix matches
    /// every non-empty string.
    ///
    /// # Errors
    /// Returns `DbError::Validation` if the pattern cannot be compiled.
    pub fn prefix(path: impl Into<String>, prefix: &str) -> Result<Self, DbError> {
        let pattern = format!("^{}.+", regex::escape(prefix));
        let regex = regex::Regex::new(&pattern)
            .map_err(|e| DbError::Validation(format!("invalid prefix pattern: {e}")))?;
        Ok(Self::Regex { path: path.into(), regex })
    }
}

/// Field selection applied to query results.
///
/// Inclusion and exclusion cannot be mixed for ordinary fields; the identifier is
/// toggled independently and is included unless excluded explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub mode: ProjectionMode,
    pub include_id: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionMode {
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Projection {
    /// Keep only `fields` (plus the identifier unless `without_id` is applied).
    #[must_use]
    pub fn include<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (fields, id) = split_id(fields);
        Self { mode: ProjectionMode::Include(fields), include_id: id.unwrap_or(true) }
    }

    /// Drop `fields`. Listing `_id` here excludes the identifier.
    #[must_use]
    pub fn exclude<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (fields, id) = split_id(fields);
        Self { mode: ProjectionMode::Exclude(fields), include_id: id.is_none() }
    }

    #[must_use]
    pub fn without_id(mut self) -> Self {
        self.include_id = false;
        self
    }
}

fn split_id<I, S>(fields: I) -> (Vec<String>, Option<bool>)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out = Vec::new();
    let mut saw_id = None;
    for f in fields {
        let f = f.into();
        if f == ID_FIELD {
            saw_id = Some(true);
        } else if !out.contains(&f) {
            out.push(f);
        }
    }
    (out, saw_id)
}

/// A complete find request, assembled once and executed by a single call.
#[derive(Debug, Clone)]
pub struct FindQuery {
    pub filter: Filter,
    pub projection: Option<Projection>,
    pub sort: Vec<SortSpec>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl FindQuery {
    #[must_use]
    pub const fn new(filter: Filter) -> Self {
        Self { filter, projection: None, sort: Vec::new(), skip: 0, limit: None }
    }

    #[must_use]
    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    #[must_use]
    pub fn sort_by(mut self, spec: SortSpec) -> Self {
        self.sort.push(spec);
        self
    }

    #[must_use]
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Partial update applied in place by the store, without a prior read.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpdateDoc {
    pub inc: Vec<(String, Bson)>,
}

impl UpdateDoc {
    /// `$inc` of `field` by `delta`.
    ///
    /// # Errors
    /// Returns `DbError::Validation` when `delta` is not numeric.
    pub fn inc(field: impl Into<String>, delta: impl Into<Bson>) -> Result<Self, DbError> {
        Self::default().and_inc(field, delta)
    }

    /// Adds another `$inc` term.
    ///
    /// # Errors
    /// Returns `DbError::Validation` when `delta` is not numeric.
    pub fn and_inc(mut self, field: impl Into<String>, delta: impl Into<Bson>) -> Result<Self, DbError> {
        let field = field.into();
        let delta = delta.into();
        if !matches!(delta, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) {
            return Err(DbError::Validation(format!("$inc on '{field}' requires a numeric delta")));
        }
        if field == ID_FIELD {
            return Err(DbError::Validation("_id is immutable".into()));
        }
        self.inc.push((field, delta));
        Ok(self)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: u64,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct InsertReport {
    pub inserted: u64,
    /// Assigned identifiers in input order.
    pub ids: Vec<Bson>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertOneReport {
    pub id: Bson,
}
