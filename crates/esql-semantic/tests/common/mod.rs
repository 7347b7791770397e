//! Shared fixtures: a small catalog and AST builders

#![allow(dead_code)]

use std::rc::Rc;

use esql_ast::*;
use esql_diagnostics::Span;
use esql_semantic::{CatalogRegistry, ParserOptions, SemanticResolver, TypeUsage};

pub const CATALOG: &str = r#"{
    "types": [
        {
            "full_name": "Shop.Customer",
            "kind": "entity",
            "members": [
                {"name": "Id", "type": {"kind": "primitive", "name": "Edm.Int32"}},
                {"name": "City", "type": {"kind": "primitive", "name": "Edm.String"}},
                {"name": "Address", "type": {"kind": "complex", "name": "Shop.Address"}}
            ]
        },
        {
            "full_name": "Shop.Order",
            "kind": "entity",
            "members": [
                {"name": "Total", "type": {"kind": "primitive", "name": "Edm.Decimal"}},
                {"name": "Customer", "type": {"kind": "ref", "entity": "Shop.Customer"}}
            ]
        },
        {
            "full_name": "Shop.Address",
            "kind": "complex",
            "members": [
                {"name": "Street", "type": {"kind": "primitive", "name": "Edm.String"}}
            ]
        }
    ],
    "enums": [{"full_name": "Shop.Status", "members": ["Open", "Shipped"]}],
    "functions": [
        {
            "full_name": "Edm.Max",
            "parameters": [
                {"name": "values", "type": {"kind": "collection", "element": {"kind": "primitive", "name": "Edm.Decimal"}}}
            ],
            "return_type": {"kind": "primitive", "name": "Edm.Decimal"},
            "aggregate": true
        },
        {
            "full_name": "Edm.Count",
            "parameters": [
                {"name": "values", "type": {"kind": "collection", "element": {"kind": "primitive", "name": "Edm.Decimal"}}}
            ],
            "return_type": {"kind": "primitive", "name": "Edm.Int32"},
            "aggregate": true
        },
        {
            "full_name": "Edm.Count",
            "parameters": [
                {"name": "values", "type": {"kind": "collection", "element": {"kind": "primitive", "name": "Edm.String"}}}
            ],
            "return_type": {"kind": "primitive", "name": "Edm.Int32"},
            "aggregate": true
        },
        {
            "full_name": "Edm.Count",
            "parameters": [
                {"name": "values", "type": {"kind": "collection", "element": {"kind": "primitive", "name": "Edm.Int32"}}}
            ],
            "return_type": {"kind": "primitive", "name": "Edm.Int32"},
            "aggregate": true
        },
        {
            "full_name": "Shop.Describe",
            "parameters": [
                {"name": "city", "type": {"kind": "primitive", "name": "Edm.String"}},
                {"name": "amount", "type": {"kind": "primitive", "name": "Edm.Decimal"}}
            ],
            "return_type": {"kind": "primitive", "name": "Edm.String"}
        },
        {
            "full_name": "Edm.Length",
            "parameters": [
                {"name": "text", "type": {"kind": "primitive", "name": "Edm.String"}}
            ],
            "return_type": {"kind": "primitive", "name": "Edm.Int32"}
        }
    ],
    "containers": [
        {
            "name": "ShopDb",
            "entity_sets": [
                {"name": "Customers", "element_type": "Shop.Customer"},
                {"name": "Orders", "element_type": "Shop.Order"}
            ]
        }
    ],
    "default_container": "ShopDb"
}"#;

pub fn catalog() -> Rc<CatalogRegistry> {
    Rc::new(CatalogRegistry::from_json(CATALOG).expect("test catalog is valid"))
}

/// Resolver with the `Edm` namespace imported
pub fn resolver() -> SemanticResolver {
    resolver_with(ParserOptions::default())
}

pub fn resolver_with(options: ParserOptions) -> SemanticResolver {
    SemanticResolver::builder(catalog())
        .with_options(options)
        .with_namespace_import("Edm")
        .build()
        .expect("resolver without parameters builds")
}

pub fn customer() -> TypeUsage {
    TypeUsage::entity("Shop.Customer")
}

pub fn order() -> TypeUsage {
    TypeUsage::entity("Shop.Order")
}

pub fn decimal() -> TypeUsage {
    TypeUsage::primitive("Edm.Decimal")
}

pub fn int32() -> TypeUsage {
    TypeUsage::primitive("Edm.Int32")
}

pub fn ctx() -> ErrorContext {
    ErrorContext::detached()
}

/// Context over `text` located at its first occurrence in `source`
pub fn ctx_in(source: &str, text: &str) -> ErrorContext {
    let start = source.find(text).expect("text occurs in source");
    ErrorContext::at(Span::new(start, start + text.len()), source.into())
}

pub fn ident(name: &str) -> Expr {
    Expr::new(ExprKind::Identifier(Identifier::new(name)), ctx())
}

/// `a.b.c` from `"a.b.c"`
pub fn path(dotted: &str) -> Expr {
    let mut parts = dotted.split('.');
    let first = ident(parts.next().unwrap_or_default());
    parts.fold(first, |left, name| {
        Expr::new(ExprKind::Dot(DotExpr::new(left, Identifier::new(name))), ctx())
    })
}

pub fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Method(MethodExpr::new(path(name), args)), ctx())
}

pub fn group_partition(argument: Expr) -> Expr {
    Expr::new(
        ExprKind::GroupPartition(GroupPartitionExpr::new(argument)),
        ctx(),
    )
}

pub fn int(value: i64) -> Expr {
    Expr::new(ExprKind::Literal(Literal::Integer(value)), ctx())
}

pub fn null() -> Expr {
    Expr::new(ExprKind::Literal(Literal::Null), ctx())
}

pub fn param(name: &str) -> Expr {
    Expr::new(ExprKind::Parameter(name.to_string()), ctx())
}

pub fn method(expr: &Expr) -> MethodExpr {
    match &expr.kind {
        ExprKind::Method(method) => method.clone(),
        other => panic!("not a method call: {:?}", other),
    }
}

pub fn function(name: &str, parameters: &[(&str, &str)], body: Expr) -> FunctionDefinition {
    let parameters = parameters
        .iter()
        .map(|(name, type_name)| {
            ParameterDefinition::new(
                Identifier::new(*name),
                type_name.split('.').map(str::to_string).collect(),
                ctx(),
            )
        })
        .collect();
    FunctionDefinition::new(name, parameters, body, Span::default(), ctx())
}
