//! End-to-end analysis of query statements
//!
//! Covers:
//! - Catalog names: entity sets, namespaces, enum members
//! - Parameters
//! - Inline function definitions and calls
//! - Diagnostics for unresolvable or misused names

mod common;

use std::rc::Rc;

use common::*;
use esql_ast::{Expr, QueryStatement};
use esql_diagnostics::*;
use esql_semantic::*;
use pretty_assertions::assert_eq;

fn analyze(statement: &QueryStatement) -> Result<ParseResult> {
    analyze_query(statement, &mut resolver())
}

fn analyze_expr(expr: Expr) -> Result<DbExpr> {
    analyze(&QueryStatement::new(expr)).map(|result| result.expression)
}

// === Names ===

#[test]
fn test_entity_set_of_default_container() {
    let scan = DbExpr::scan("ShopDb", "Orders", order());
    assert_eq!(analyze_expr(ident("Orders")).unwrap(), scan);
    assert_eq!(analyze_expr(path("ShopDb.orders")).unwrap(), scan);
}

#[test]
fn test_enum_member_is_a_value() {
    let value = analyze_expr(path("Shop.Status.shipped")).unwrap();
    assert_eq!(
        value,
        DbExpr::enum_member("Shipped", TypeUsage::enumeration("Shop.Status"))
    );
    assert_eq!(value.to_string(), "Shop.Status.Shipped");
}

#[test]
fn test_literals_and_function_calls() {
    let value = analyze_expr(call("Length", vec![int(3)])).unwrap();
    assert_eq!(
        value,
        DbExpr::function_call("Edm.Length", vec![DbExpr::constant(esql_ast::Literal::Integer(3))], int32())
    );

    let err = analyze_expr(call("Length", vec![int(1), int(2)])).unwrap_err();
    assert_eq!(err.code(), ESQL0115);
}

#[test]
fn test_parameters() {
    let mut sr = SemanticResolver::builder(catalog())
        .with_parameter("MinTotal", decimal())
        .build()
        .unwrap();
    let result = analyze_query(&QueryStatement::new(param("mintotal")), &mut sr).unwrap();
    assert_eq!(result.expression, DbExpr::parameter("MinTotal", decimal()));

    let err = analyze_query(&QueryStatement::new(param("other")), &mut sr).unwrap_err();
    assert_eq!(err.code(), ESQL0100);
    assert!(err.message().contains("@other"));
}

#[test]
fn test_non_value_names() {
    let err = analyze_expr(ident("ShopDb")).unwrap_err();
    assert_eq!(err.code(), ESQL0117);
    assert!(err.message().contains("entity container"));

    let err = analyze_expr(path("Shop.Customer")).unwrap_err();
    assert_eq!(err.code(), ESQL0117);
    assert!(err.message().contains("type"));
}

#[test]
fn test_member_errors() {
    let err = analyze_expr(path("ShopDb.Products")).unwrap_err();
    assert_eq!(err.code(), ESQL0108);

    let err = analyze_expr(path("Orders.Total")).unwrap_err();
    assert_eq!(err.code(), ESQL0106);

    let err = analyze_expr(path("Shop.Status.Closed")).unwrap_err();
    assert_eq!(err.code(), ESQL0114);

    let err = analyze_expr(path("Shop.Missing")).unwrap_err();
    assert_eq!(err.code(), ESQL0100);
}

#[test]
fn test_untyped_null_result() {
    let err = analyze_expr(null()).unwrap_err();
    assert_eq!(err.code(), ESQL0113);
}

#[test]
fn test_not_a_function() {
    let err = analyze_expr(call("Shop.Customer", vec![])).unwrap_err();
    assert_eq!(err.code(), ESQL0116);
}

#[test]
fn test_ambiguous_import() {
    let catalog = CatalogRegistry::new()
        .with_entity_type("A.Item", vec![])
        .with_entity_type("B.Item", vec![]);
    let mut sr = SemanticResolver::builder(Rc::new(catalog))
        .with_namespace_import("A")
        .with_namespace_import("B")
        .build()
        .unwrap();
    let err = analyze_query(&QueryStatement::new(ident("Item")), &mut sr).unwrap_err();
    assert_eq!(err.code(), ESQL0104);
    assert!(err.message().contains("A.Item"));
    assert!(err.message().contains("B.Item"));
}

// === Inline functions ===

#[test]
fn test_inline_function_definition_and_call() {
    let statement = QueryStatement::new(call("Double", vec![int(21)])).with_function(function(
        "Double",
        &[("x", "Edm.Int64")],
        call("Shop.Describe", vec![ident("x"), ident("x")]),
    ));
    let result = analyze(&statement).unwrap();

    let x = DbExpr::variable("x", TypeUsage::primitive("Edm.Int64"));
    let body = DbExpr::function_call(
        "Shop.Describe",
        vec![x.clone(), x.clone()],
        TypeUsage::primitive("Edm.String"),
    );
    let double = result.function("Double").unwrap();
    assert_eq!(double.lambda, DbLambda::new(vec![x], body));
    assert_eq!(
        result.expression,
        DbExpr::invoke(
            "Double",
            vec![DbExpr::constant(esql_ast::Literal::Integer(21))],
            Some(TypeUsage::primitive("Edm.String"))
        )
    );
}

#[test]
fn test_inline_functions_may_call_later_definitions() {
    let statement = QueryStatement::new(call("First", vec![]))
        .with_function(function("First", &[], call("Second", vec![])))
        .with_function(function("Second", &[], int(1)));
    let result = analyze(&statement).unwrap();
    assert_eq!(result.function_definitions.len(), 2);
    assert_eq!(
        result.expression.result_type(),
        Some(&TypeUsage::primitive("Edm.Int64"))
    );
}

#[test]
fn test_inline_function_body_does_not_see_query_scopes() {
    let mut sr = resolver();
    sr.add_to_current_scope("o", ScopeEntry::source_var(DbExpr::variable("o", order())))
        .unwrap();
    let statement = QueryStatement::new(ident("o")).with_function(function("Leak", &[], ident("o")));
    let err = analyze_query(&statement, &mut sr).unwrap_err();
    assert_eq!(err.code(), ESQL0100);
}

#[test]
fn test_circular_inline_functions() {
    let statement = QueryStatement::new(int(0))
        .with_function(function("Ping", &[], call("Pong", vec![])))
        .with_function(function("Pong", &[], call("Ping", vec![])));
    let err = analyze(&statement).unwrap_err();
    assert_eq!(err.code(), ESQL0112);
    assert!(err.message().contains("Ping"));
}

#[test]
fn test_duplicate_inline_function_parameters() {
    let statement = QueryStatement::new(int(0)).with_function(function(
        "Twice",
        &[("x", "Edm.Int32"), ("X", "Edm.String")],
        ident("x"),
    ));
    let err = analyze(&statement).unwrap_err();
    assert_eq!(err.code(), ESQL0102);
}
