//! Conversion of query ASTs into resolved expressions
//!
//! The analyzer walks the AST and drives the [`SemanticResolver`]: names go
//! through the resolver's lookup chain, member access is resolved against
//! whatever its left side turned out to be, and method calls become function
//! calls, group aggregates or inline function invocations.

use std::rc::Rc;

use log::{debug, trace};

use esql_ast::{
    DotExpr, Expr, ExprKind, GroupPartitionExpr, MethodExpr, ParameterDefinition, QueryStatement,
};
use esql_diagnostics::{
    ESQL0102, ESQL0110, ESQL0113, ESQL0115, ESQL0116, ESQL0117, ErrorContext, Result, keys,
};

use crate::{
    AggregateAttachment, DbExpr, ExpressionResolution, FunctionDefinition, FunctionMetadata,
    InlineFunctionGroup, InlineFunctionInfo, MetadataFunctionGroup, MetadataMember, ParseResult,
    SemanticResolver,
};

/// Analyze a complete query statement.
///
/// Inline functions are declared before any of them is converted, so
/// definitions may call each other in any order.
pub fn analyze_query(statement: &QueryStatement, sr: &mut SemanticResolver) -> Result<ParseResult> {
    let function_definitions = convert_inline_function_definitions(statement, sr)?;

    let expression = convert_value_expression(&statement.expr, sr)?;
    if expression.is_untyped_null() {
        return Err(statement.expr.ctx.error(
            sr.strings(),
            ESQL0113,
            keys::RESULT_TYPE_CANNOT_BE_NULL,
            &[],
        ));
    }

    debug!(
        "analyzed query with {} inline functions: {}",
        function_definitions.len(),
        expression
    );
    Ok(ParseResult {
        expression,
        function_definitions,
    })
}

fn convert_inline_function_definitions(
    statement: &QueryStatement,
    sr: &mut SemanticResolver,
) -> Result<Vec<FunctionDefinition>> {
    let mut declared = Vec::with_capacity(statement.functions.len());
    for definition in &statement.functions {
        let parameters = convert_inline_function_parameters(&definition.parameters, sr)?;
        let info = Rc::new(InlineFunctionInfo::new(definition.clone(), parameters));
        sr.type_resolver().declare_inline_function(&definition.name, info.clone());
        declared.push(info);
    }

    declared
        .iter()
        .map(|info| {
            let lambda = info.get_lambda(sr, convert_value_expression)?;
            Ok(FunctionDefinition {
                name: info.name().to_string(),
                lambda,
                span: info.definition().span,
            })
        })
        .collect()
}

fn convert_inline_function_parameters(
    parameters: &[ParameterDefinition],
    sr: &SemanticResolver,
) -> Result<Vec<DbExpr>> {
    let comparer = sr.name_comparer();
    let mut converted: Vec<DbExpr> = Vec::with_capacity(parameters.len());
    for parameter in parameters {
        let name = &parameter.name.name;
        let duplicate = converted
            .iter()
            .filter_map(DbExpr::variable_name)
            .any(|existing| comparer.equals(existing, name));
        if duplicate {
            return Err(parameter.ctx.error(
                sr.strings(),
                ESQL0102,
                keys::MULTIPLE_DEFINITIONS_OF_PARAMETER,
                &[name],
            ));
        }
        let type_usage = sr
            .type_resolver()
            .resolve_type_name(&parameter.type_name, &parameter.ctx)?;
        converted.push(DbExpr::variable(name.clone(), type_usage));
    }
    Ok(converted)
}

/// Convert an expression that must denote a value.
///
/// Enumeration members are values. Untyped nulls are allowed; callers that
/// cannot accept them check [`DbExpr::is_untyped_null`].
pub fn convert_value_expression(expr: &Expr, sr: &mut SemanticResolver) -> Result<DbExpr> {
    match convert_expression(expr, sr)? {
        ExpressionResolution::Value(value) => Ok(value),
        ExpressionResolution::MetadataMember(MetadataMember::EnumMember(member)) => {
            Ok(DbExpr::enum_member(member.member, member.enum_type))
        }
        other => {
            let name = match &other {
                ExpressionResolution::EntityContainer(container) => container.name.clone(),
                ExpressionResolution::MetadataMember(member) => member.name().to_string(),
                ExpressionResolution::Value(_) => String::new(),
            };
            Err(expr.ctx.error(
                sr.strings(),
                ESQL0117,
                keys::EXPRESSION_MUST_BE_VALUE,
                &[&name, &other.class_name()],
            ))
        }
    }
}

/// Convert an expression into whatever it resolves to
pub fn convert_expression(expr: &Expr, sr: &mut SemanticResolver) -> Result<ExpressionResolution> {
    trace!("converting {:?}", expr.kind);
    match &expr.kind {
        ExprKind::Literal(literal) => Ok(ExpressionResolution::Value(DbExpr::constant(
            literal.clone(),
        ))),
        ExprKind::Parameter(name) => sr
            .resolve_parameter(name, &expr.ctx)
            .map(ExpressionResolution::Value),
        ExprKind::Identifier(id) => sr.resolve_simple_name(&id.name, false, &expr.ctx),
        ExprKind::Dot(dot) => convert_dot_expr(dot, &expr.ctx, sr),
        ExprKind::Method(method) => {
            convert_method_expr(method, &expr.ctx, sr).map(ExpressionResolution::Value)
        }
        ExprKind::GroupPartition(partition) => {
            convert_group_partition_expr(partition, &expr.ctx, sr).map(ExpressionResolution::Value)
        }
    }
}

fn convert_dot_expr(
    dot: &DotExpr,
    ctx: &ErrorContext,
    sr: &mut SemanticResolver,
) -> Result<ExpressionResolution> {
    if let Some(group_key) = sr.try_resolve_dot_expr_as_group_key_alternative_name(dot, ctx)? {
        return Ok(ExpressionResolution::Value(group_key));
    }

    let left = match &dot.left.kind {
        ExprKind::Identifier(id) => sr.resolve_simple_name(&id.name, true, &dot.left.ctx)?,
        _ => convert_expression(&dot.left, sr)?,
    };

    let name = &dot.identifier.name;
    match left {
        ExpressionResolution::Value(instance) => sr
            .resolve_property_access(instance, name, ctx)
            .map(ExpressionResolution::Value),
        ExpressionResolution::EntityContainer(container) => {
            sr.resolve_entity_container_member_access(&container, name, ctx)
        }
        ExpressionResolution::MetadataMember(member) => sr
            .resolve_metadata_member_access(&member, name, ctx)
            .map(ExpressionResolution::MetadataMember),
    }
}

fn resolve_function_name(method: &MethodExpr, sr: &SemanticResolver) -> Result<MetadataMember> {
    let ctx = &method.name.ctx;
    match method.name.multipart_identifier() {
        Some(names) if names.len() == 1 => sr.resolve_simple_function_name(&names[0], ctx),
        Some(names) => sr.resolve_metadata_member_name(&names, ctx),
        None => Err(ctx.error(
            sr.strings(),
            ESQL0116,
            keys::NOT_A_FUNCTION,
            &[&method.display_name()],
        )),
    }
}

fn convert_method_expr(method: &MethodExpr, ctx: &ErrorContext, sr: &mut SemanticResolver) -> Result<DbExpr> {
    match resolve_function_name(method, sr)? {
        MetadataMember::FunctionGroup(group) => {
            let has_aggregates = group.functions.iter().any(|f| f.aggregate);
            if has_aggregates && sr.is_in_any_group_scope() {
                convert_aggregate_function_in_group_scope(method, &group, ctx, sr)
            } else {
                convert_function_call(method, &group, ctx, sr)
            }
        }
        MetadataMember::InlineFunctionGroup(group) => convert_inline_function_call(method, &group, ctx, sr),
        other => Err(ctx.error(
            sr.strings(),
            ESQL0116,
            keys::NOT_A_FUNCTION,
            &[other.name()],
        )),
    }
}

fn convert_arguments(args: &[Expr], sr: &mut SemanticResolver) -> Result<Vec<DbExpr>> {
    args.iter().map(|arg| convert_value_expression(arg, sr)).collect()
}

/// First overload taking `arity` arguments
fn select_overload<'f>(
    name: &str,
    overloads: impl IntoIterator<Item = &'f FunctionMetadata>,
    arity: usize,
    ctx: &ErrorContext,
    sr: &SemanticResolver,
) -> Result<&'f FunctionMetadata> {
    overloads
        .into_iter()
        .find(|f| f.parameters.len() == arity)
        .ok_or_else(|| {
            ctx.error(
                sr.strings(),
                ESQL0115,
                keys::NO_FUNCTION_OVERLOAD_MATCH,
                &[name, &arity.to_string()],
            )
        })
}

/// First overload whose parameter types accept the argument types
fn find_typed_overload<'f>(
    overloads: impl IntoIterator<Item = &'f FunctionMetadata>,
    args: &[DbExpr],
) -> Option<&'f FunctionMetadata> {
    overloads.into_iter().find(|f| {
        f.parameters.len() == args.len()
            && f.parameters
                .iter()
                .zip(args)
                .all(|(param, arg)| param.type_usage.accepts(arg.result_type()))
    })
}

/// First aggregate overload whose collection parameters accept the argument
/// types as elements
fn find_group_aggregate_overload<'f>(
    group: &'f MetadataFunctionGroup,
    args: &[DbExpr],
) -> Option<&'f FunctionMetadata> {
    group.functions.iter().filter(|f| f.aggregate).find(|f| {
        f.parameters.len() == args.len()
            && f.parameters.iter().zip(args).all(|(param, arg)| {
                param
                    .type_usage
                    .element_type()
                    .is_some_and(|element| element.accepts(arg.result_type()))
            })
    })
}

fn convert_function_call(
    method: &MethodExpr,
    group: &MetadataFunctionGroup,
    ctx: &ErrorContext,
    sr: &mut SemanticResolver,
) -> Result<DbExpr> {
    let args = convert_arguments(&method.args, sr)?;
    let function = match find_typed_overload(&group.functions, &args) {
        Some(function) => function,
        None => select_overload(&group.name, &group.functions, args.len(), ctx, sr)?,
    };
    Ok(DbExpr::function_call(
        function.full_name.clone(),
        args,
        function.return_type.clone(),
    ))
}

/// Convert a call to a function group with aggregate overloads inside a
/// group scope.
///
/// The call is first tried as an ordinary function over already-collected
/// arguments, e.g. `Count(GROUPPARTITION(o.Total))`. Failing that, the
/// arguments are converted again inside a new aggregate, after the
/// aggregate state touched by the first attempt has been rolled back.
fn convert_aggregate_function_in_group_scope(
    method: &MethodExpr,
    group: &MetadataFunctionGroup,
    ctx: &ErrorContext,
    sr: &mut SemanticResolver,
) -> Result<DbExpr> {
    let snapshot = sr.aggregate_snapshot();
    let args = convert_arguments(&method.args, sr)?;
    if let Some(function) = find_typed_overload(&group.functions, &args) {
        trace!("'{}' converted as a collection function", function.full_name);
        return Ok(DbExpr::function_call(
            function.full_name.clone(),
            args,
            function.return_type.clone(),
        ));
    }
    sr.restore_aggregate_snapshot(snapshot);

    let mut aggregate = sr.enter_function_aggregate(method.clone(), ctx.clone());
    let args = convert_arguments(&method.args, &mut aggregate)?;

    let function = match find_group_aggregate_overload(group, &args) {
        Some(function) => function,
        None => select_overload(
            &group.name,
            group.functions.iter().filter(|f| f.aggregate),
            args.len(),
            ctx,
            &aggregate,
        )?,
    };
    let result_type = function.return_type.clone();
    let name = aggregate.generate_internal_name(&format!("groupAgg{}", function.name()));
    aggregate.attach(name, AggregateAttachment::ResultType(result_type.clone()))?;

    Ok(DbExpr::aggregate(
        function.full_name.clone(),
        method.distinct,
        args,
        result_type,
    ))
}

fn convert_inline_function_call(
    method: &MethodExpr,
    group: &InlineFunctionGroup,
    ctx: &ErrorContext,
    sr: &mut SemanticResolver,
) -> Result<DbExpr> {
    let args = convert_arguments(&method.args, sr)?;
    let Some(function) = group
        .functions
        .iter()
        .find(|f| f.parameters().len() == args.len())
    else {
        return Err(ctx.error(
            sr.strings(),
            ESQL0115,
            keys::NO_FUNCTION_OVERLOAD_MATCH,
            &[&group.name, &args.len().to_string()],
        ));
    };
    let lambda = function.get_lambda(sr, convert_value_expression)?;
    Ok(DbExpr::invoke(
        function.name().to_string(),
        args,
        lambda.result_type().cloned(),
    ))
}

fn convert_group_partition_expr(
    partition: &GroupPartitionExpr,
    ctx: &ErrorContext,
    sr: &mut SemanticResolver,
) -> Result<DbExpr> {
    if !sr.is_in_any_group_scope() {
        return Err(ctx.error(
            sr.strings(),
            ESQL0110,
            keys::AGGREGATE_OUTSIDE_GROUP,
            &["GROUPPARTITION"],
        ));
    }

    let mut aggregate = sr.enter_group_partition(partition.clone(), ctx.clone());
    let argument = convert_value_expression(&partition.argument, &mut aggregate)?;
    if argument.is_untyped_null() {
        return Err(partition.argument.ctx.error(
            aggregate.strings(),
            ESQL0113,
            keys::RESULT_TYPE_CANNOT_BE_NULL,
            &[],
        ));
    }

    let definition = DbExpr::group_aggregate(argument, partition.distinct);
    let name = aggregate.generate_internal_name("groupPartition");
    aggregate.attach(name, AggregateAttachment::Definition(definition.clone()))?;
    Ok(definition)
}
