//! Semantic resolution core for an entity query language
//!
//! This crate ties the front-end stages together:
//! - AST nodes consumed by the resolver
//! - Scope, scope region and aggregate bookkeeping
//! - Name resolution against a metadata catalog
//! - Error codes and caret-style diagnostics
//!
//! # Example
//!
//! ```ignore
//! use esql::{compile, CatalogRegistry, ParserOptions};
//!
//! let catalog = CatalogRegistry::from_json_file("catalog.json")?;
//! let result = compile(&statement, Rc::new(catalog), ParserOptions::default())?;
//! println!("{}", result.expression);
//! ```

use std::rc::Rc;

use log::debug;

// Re-export all public APIs from internal crates
pub use esql_ast as ast;
pub use esql_diagnostics as diagnostics;
pub use esql_semantic as semantic;

// Convenience re-exports
pub use esql_ast::{Expr, QueryStatement};
pub use esql_diagnostics::{Diagnostic, EsqlError, Result, render};
pub use esql_semantic::{
    Catalog, CatalogRegistry, CompilationMode, DbExpr, ParseResult, ParserOptions,
    SemanticResolver, analyze_query,
};

/// Resolve `statement` against `catalog` with a fresh resolver.
///
/// Use [`SemanticResolver::builder`] and [`analyze_query`] directly when the
/// query takes parameters, free variables or namespace imports.
pub fn compile(
    statement: &QueryStatement,
    catalog: Rc<dyn Catalog>,
    options: ParserOptions,
) -> Result<ParseResult> {
    debug!("compiling query in {:?} mode", options.mode);
    let mut resolver = SemanticResolver::new(catalog, options);
    analyze_query(statement, &mut resolver)
}
