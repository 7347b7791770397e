//! Entity query language diagnostics
//!
//! This crate provides the error infrastructure shared by every stage of the
//! query front end: source spans, error contexts pointing back into the query
//! text, structured error codes, the string table used to produce messages,
//! and caret rendering for user-facing diagnostics.

mod context;
mod error;
mod error_code;
mod render;
mod span;
mod strings;

pub use context::*;
pub use error::*;
pub use error_code::*;
pub use render::*;
pub use span::*;
pub use strings::*;

/// Result type for query front-end operations
pub type Result<T> = std::result::Result<T, EsqlError>;
