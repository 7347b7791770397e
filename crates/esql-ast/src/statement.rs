//! Statement-level AST nodes: query statements and inline function definitions

use esql_diagnostics::{ErrorContext, Span};

use crate::{Expr, Identifier};

/// `FUNCTION name(p1 Type1, ...) AS (body)`
#[derive(Debug, Clone)]
pub struct FunctionDefinition {
    pub name: String,
    pub parameters: Vec<ParameterDefinition>,
    pub body: Expr,
    /// Span of the whole definition, from `FUNCTION` to the closing paren
    pub span: Span,
    pub ctx: ErrorContext,
}

impl FunctionDefinition {
    pub fn new(
        name: impl Into<String>,
        parameters: Vec<ParameterDefinition>,
        body: Expr,
        span: Span,
        ctx: ErrorContext,
    ) -> Self {
        Self {
            name: name.into(),
            parameters,
            body,
            span,
            ctx,
        }
    }
}

/// A typed parameter of an inline function
#[derive(Debug, Clone)]
pub struct ParameterDefinition {
    pub name: Identifier,
    /// Dotted type name, e.g. `["Edm", "Int32"]`
    pub type_name: Vec<String>,
    pub ctx: ErrorContext,
}

impl ParameterDefinition {
    pub fn new(name: Identifier, type_name: Vec<String>, ctx: ErrorContext) -> Self {
        Self {
            name,
            type_name,
            ctx,
        }
    }
}

/// A complete query: inline function definitions followed by the query expression
#[derive(Debug, Clone)]
pub struct QueryStatement {
    pub functions: Vec<FunctionDefinition>,
    pub expr: Expr,
}

impl QueryStatement {
    pub fn new(expr: Expr) -> Self {
        Self {
            functions: Vec::new(),
            expr,
        }
    }

    pub fn with_function(mut self, function: FunctionDefinition) -> Self {
        self.functions.push(function);
        self
    }
}
