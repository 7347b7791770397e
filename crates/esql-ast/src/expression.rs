//! Expression AST nodes consumed by the semantic resolver

use esql_diagnostics::ErrorContext;

use crate::{Identifier, Literal};

/// An expression node
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub ctx: ErrorContext,
}

impl Expr {
    pub fn new(kind: ExprKind, ctx: ErrorContext) -> Self {
        Self { kind, ctx }
    }

    /// The parts of `a.b.c` if this expression is a plain identifier or a
    /// chain of member accesses over identifiers
    pub fn multipart_identifier(&self) -> Option<Vec<String>> {
        match &self.kind {
            ExprKind::Identifier(id) => Some(vec![id.name.clone()]),
            ExprKind::Dot(dot) => dot.multipart_identifier(),
            _ => None,
        }
    }
}

/// All expression kinds the resolver understands
#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Literal),
    /// Simple name
    Identifier(Identifier),
    /// `@name`
    Parameter(String),
    /// `left.identifier`
    Dot(DotExpr),
    /// `name(args)`, either a function call or an aggregate
    Method(MethodExpr),
    /// `GROUPPARTITION([DISTINCT] argument)`
    GroupPartition(GroupPartitionExpr),
}

/// Member access `left.identifier`
#[derive(Debug, Clone)]
pub struct DotExpr {
    pub left: Box<Expr>,
    pub identifier: Identifier,
}

impl DotExpr {
    pub fn new(left: Expr, identifier: Identifier) -> Self {
        Self {
            left: Box::new(left),
            identifier,
        }
    }

    /// `Some(["a", "b", "c"])` for `a.b.c`, `None` when the chain contains
    /// anything other than identifiers
    pub fn multipart_identifier(&self) -> Option<Vec<String>> {
        let mut names = self.left.multipart_identifier()?;
        names.push(self.identifier.name.clone());
        Some(names)
    }
}

/// Method call, covering both plain function calls and aggregates
#[derive(Debug, Clone)]
pub struct MethodExpr {
    /// Function name expression: an identifier or a dotted name
    pub name: Box<Expr>,
    pub distinct: bool,
    pub args: Vec<Expr>,
}

impl MethodExpr {
    pub fn new(name: Expr, args: Vec<Expr>) -> Self {
        Self {
            name: Box::new(name),
            distinct: false,
            args,
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Display name used in diagnostics
    pub fn display_name(&self) -> String {
        self.name
            .multipart_identifier()
            .map(|parts| parts.join("."))
            .unwrap_or_else(|| "<expression>".to_string())
    }
}

/// `GROUPPARTITION` construct
#[derive(Debug, Clone)]
pub struct GroupPartitionExpr {
    pub distinct: bool,
    pub argument: Box<Expr>,
}

impl GroupPartitionExpr {
    pub fn new(argument: Expr) -> Self {
        Self {
            distinct: false,
            argument: Box::new(argument),
        }
    }
}

/// An expression with an optional `AS alias`
#[derive(Debug, Clone)]
pub struct AliasedExpr {
    pub expr: Expr,
    pub alias: Option<Identifier>,
}

impl AliasedExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(mut self, alias: Identifier) -> Self {
        self.alias = Some(alias);
        self
    }
}
