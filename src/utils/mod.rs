//! Utility modules: developer trace sink and numeric conversions.
pub mod devlog;
pub mod num;
