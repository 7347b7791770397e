//! Output of analyzing a query statement

use esql_diagnostics::Span;

use crate::{DbExpr, DbLambda};

/// A converted inline function definition
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    pub lambda: DbLambda,
    /// Position of the definition in the query text
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub expression: DbExpr,
    /// Inline functions in declaration order
    pub function_definitions: Vec<FunctionDefinition>,
}

impl ParseResult {
    pub fn function(&self, name: &str) -> Option<&FunctionDefinition> {
        self.function_definitions.iter().find(|f| f.name == name)
    }
}
