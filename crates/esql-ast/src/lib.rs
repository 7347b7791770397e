//! Entity query language abstract syntax tree
//!
//! Only the node kinds the semantic resolver consumes are defined here:
//! names, member access, method calls and aggregates, literals, and the
//! statement wrapper carrying inline function definitions. Every node records
//! an [`ErrorContext`] so that diagnostics can point back into the query text.

mod expression;
mod literal;
mod statement;

pub use expression::*;
pub use literal::*;
pub use statement::*;

pub use esql_diagnostics::ErrorContext;

/// A simple identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub name: String,
    /// Whether the identifier was written in `[brackets]`
    pub escaped: bool,
}

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            escaped: false,
        }
    }

    pub fn escaped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            escaped: true,
        }
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
