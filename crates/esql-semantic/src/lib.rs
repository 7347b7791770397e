//! Entity query semantic resolution
//!
//! This crate resolves the names used in an entity query:
//! - Scope stack with savepoints and scope regions
//! - Scope entries for source variables, group keys and free variables
//! - Aggregate contexts and their evaluating regions
//! - Catalog metadata: types, namespaces, functions and entity containers
//! - Inline function definitions
//!
//! [`SemanticResolver`] holds the resolution state of one compilation and
//! [`analyze_query`] drives it over a query AST.

mod aggregate;
mod analyzer;
mod catalog;
mod expr;
mod inline_function;
mod options;
mod region;
mod resolution;
mod resolver;
mod result;
mod scope;
mod type_resolver;
mod types;

pub use aggregate::*;
pub use analyzer::*;
pub use catalog::*;
pub use expr::*;
pub use inline_function::*;
pub use options::*;
pub use region::*;
pub use resolution::*;
pub use resolver::*;
pub use result::*;
pub use scope::*;
pub use type_resolver::*;
pub use types::*;
