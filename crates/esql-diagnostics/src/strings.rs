//! String table collaborator
//!
//! Diagnostic messages are looked up by resource key and formatted with
//! positional `{0}`, `{1}`, ... arguments. The table is always passed
//! explicitly to whoever builds a diagnostic; there is no process-wide
//! instance.

use indexmap::IndexMap;
use std::borrow::Cow;

/// Resource keys for every message the resolver produces
pub mod keys {
    pub const COULD_NOT_RESOLVE_IDENTIFIER: &str = "CouldNotResolveIdentifier";
    pub const INVALID_GROUP_IDENTIFIER_REFERENCE: &str = "InvalidGroupIdentifierReference";
    pub const MULTIPLE_DEFINITIONS_OF_PARAMETER: &str = "MultipleDefinitionsOfParameter";
    pub const MULTIPLE_DEFINITIONS_OF_VARIABLE: &str = "MultipleDefinitionsOfVariable";
    pub const AMBIGUOUS_NAME: &str = "AmbiguousName";
    pub const NOT_A_MEMBER_OF_TYPE: &str = "NotAMemberOfType";
    pub const NOT_A_MEMBER_OF_COLLECTION: &str = "NotAMemberOfCollection";
    pub const INVALID_DEREF_PROPERTY: &str = "InvalidDeRefProperty";
    pub const MEMBER_DOES_NOT_BELONG_TO_ENTITY_CONTAINER: &str =
        "MemberDoesNotBelongToEntityContainer";
    pub const INVALID_JOIN_LEFT_CORRELATION: &str = "InvalidJoinLeftCorrelation";
    pub const AGGREGATE_OUTSIDE_GROUP: &str = "AggregateOutsideGroup";
    pub const NESTED_AGGREGATE: &str = "NestedAggregateCannotBeUsedInAggregate";
    pub const CIRCULAR_FUNCTION_DEFINITION: &str = "FunctionDefinitionWithCircularReference";
    pub const RESULT_TYPE_CANNOT_BE_NULL: &str = "ResultingExpressionTypeCannotBeNull";
    pub const INVALID_METADATA_MEMBER_ACCESS: &str = "InvalidMetadataMemberAccess";
    pub const NO_FUNCTION_OVERLOAD_MATCH: &str = "NoFunctionOverloadMatch";
    pub const NOT_A_FUNCTION: &str = "NotAFunction";
    pub const EXPRESSION_MUST_BE_VALUE: &str = "ExpressionMustBeValue";

    // Error context descriptions
    pub const CTX_GENERIC_SYNTAX_ERROR: &str = "GenericSyntaxError";
    pub const CTX_NEAR: &str = "LocalizedNear";
}

/// Lookup of localized message templates by resource key
pub trait StringTable {
    /// Template registered for `key`, if any
    fn lookup(&self, key: &str) -> Option<Cow<'_, str>>;

    /// Resolve `key` and substitute positional arguments.
    ///
    /// Unknown keys format as the key itself followed by the arguments so
    /// that a missing translation never hides the failing name.
    fn format(&self, key: &str, args: &[&str]) -> String {
        match self.lookup(key) {
            Some(template) => substitute(&template, args),
            None if args.is_empty() => key.to_string(),
            None => format!("{}({})", key, args.join(", ")),
        }
    }
}

fn substitute(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        match tail.find('}') {
            Some(close) => match tail[..close].parse::<usize>() {
                Ok(index) if index < args.len() => {
                    out.push_str(args[index]);
                    rest = &tail[close + 1..];
                }
                _ => {
                    out.push('{');
                    rest = tail;
                }
            },
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

/// In-memory string table, pre-populated with English messages
#[derive(Debug, Clone)]
pub struct MessageTable {
    entries: IndexMap<String, String>,
}

impl MessageTable {
    /// An empty table; every lookup falls back to the key
    pub fn empty() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// The built-in English messages
    pub fn english() -> Self {
        let mut table = Self::empty();
        for (key, template) in ENGLISH {
            table.insert(*key, *template);
        }
        table
    }

    /// Register or override a template
    pub fn insert(&mut self, key: impl Into<String>, template: impl Into<String>) {
        self.entries.insert(key.into(), template.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MessageTable {
    fn default() -> Self {
        Self::english()
    }
}

impl StringTable for MessageTable {
    fn lookup(&self, key: &str) -> Option<Cow<'_, str>> {
        self.entries.get(key).map(|s| Cow::Borrowed(s.as_str()))
    }
}

const ENGLISH: &[(&str, &str)] = &[
    (
        keys::COULD_NOT_RESOLVE_IDENTIFIER,
        "'{0}' could not be resolved in the current scope or context. Make sure that all referenced variables are in scope, that required schemas are loaded, and that namespaces are referenced correctly.",
    ),
    (
        keys::INVALID_GROUP_IDENTIFIER_REFERENCE,
        "'{0}' is not valid in the current group context. Only group keys and aggregates can be referenced after GROUP BY.",
    ),
    (
        keys::MULTIPLE_DEFINITIONS_OF_PARAMETER,
        "The parameter '{0}' is defined more than once.",
    ),
    (
        keys::MULTIPLE_DEFINITIONS_OF_VARIABLE,
        "The variable '{0}' is defined more than once.",
    ),
    (
        keys::AMBIGUOUS_NAME,
        "The name '{0}' is ambiguous. It matches '{1}' and '{2}'.",
    ),
    (
        keys::NOT_A_MEMBER_OF_TYPE,
        "'{0}' is not a member of type '{1}' in the currently loaded schemas.",
    ),
    (
        keys::NOT_A_MEMBER_OF_COLLECTION,
        "'{0}' is not a member of '{1}'. To extract a property of a collection element, use a subquery to iterate over the collection.",
    ),
    (
        keys::INVALID_DEREF_PROPERTY,
        "'{0}' is not a member of '{1}'. The left expression of the member access is a reference to '{2}'.",
    ),
    (
        keys::MEMBER_DOES_NOT_BELONG_TO_ENTITY_CONTAINER,
        "The entity container '{1}' does not contain a member named '{0}'.",
    ),
    (
        keys::INVALID_JOIN_LEFT_CORRELATION,
        "The left expression of a JOIN cannot reference the right side of the JOIN.",
    ),
    (
        keys::AGGREGATE_OUTSIDE_GROUP,
        "The aggregate '{0}' is not valid outside of a group context.",
    ),
    (
        keys::NESTED_AGGREGATE,
        "The aggregate '{0}' cannot be nested in the aggregate '{1}' evaluated over the same input.",
    ),
    (
        keys::CIRCULAR_FUNCTION_DEFINITION,
        "The definition of the function '{0}' contains a circular reference.",
    ),
    (
        keys::RESULT_TYPE_CANNOT_BE_NULL,
        "The result type of a query expression cannot be an untyped null.",
    ),
    (
        keys::INVALID_METADATA_MEMBER_ACCESS,
        "'{0}' is not a member of the {1} '{2}'.",
    ),
    (
        keys::NO_FUNCTION_OVERLOAD_MATCH,
        "No overload of the function '{0}' accepts {1} argument(s).",
    ),
    (keys::NOT_A_FUNCTION, "'{0}' cannot be called as a function."),
    (
        keys::EXPRESSION_MUST_BE_VALUE,
        "'{0}' resolves to a {1}, but a value expression is expected.",
    ),
    (keys::CTX_GENERIC_SYNTAX_ERROR, "syntax error"),
    (keys::CTX_NEAR, "near"),
];
