// Audit trail for mutations
pub mod telemetry;

// Submodules for separation of concerns
mod cursor;
mod eval;
pub(crate) mod exec;
mod parse;
mod render;
mod types;

pub use cursor::{BatchSource, Cursor, CursorIter, DEFAULT_BATCH_SIZE};
pub use eval::{compare_bson, compare_docs, eval_filter, project};
pub use parse::{infer_scalar, parse_document_json, parse_prototype_json};
pub use render::sort_to_bson;
pub use types::{
    CmpOp, DeleteReport, Filter, FindQuery, InsertOneReport, InsertReport, Order, Projection,
    ProjectionMode, SortSpec, UpdateDoc, UpdateReport,
};
