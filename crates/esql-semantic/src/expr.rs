//! Resolved expressions
//!
//! The resolver does not build a full command tree; it produces these
//! lightweight typed expressions so that callers (and tests) can see what a
//! name was bound to.

use std::fmt;

use esql_ast::Literal;

use crate::TypeUsage;

/// A typed, resolved expression. `result_type` is `None` only for an
/// untyped `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct DbExpr {
    pub kind: DbExprKind,
    pub result_type: Option<TypeUsage>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DbExprKind {
    Constant(Literal),
    /// Member of an enumeration type
    EnumMember(String),
    Null,
    VariableRef(String),
    ParameterRef(String),
    Property {
        instance: Box<DbExpr>,
        property: String,
    },
    Deref(Box<DbExpr>),
    /// All instances of an entity set
    Scan {
        container: String,
        extent: String,
    },
    FunctionCall {
        function: String,
        args: Vec<DbExpr>,
    },
    /// Aggregate evaluated over a group
    Aggregate {
        function: String,
        distinct: bool,
        args: Vec<DbExpr>,
    },
    /// `GROUPPARTITION` collection
    GroupAggregate {
        distinct: bool,
        argument: Box<DbExpr>,
    },
    /// Call of an inline function defined in the query
    Invoke {
        function: String,
        args: Vec<DbExpr>,
    },
}

impl DbExpr {
    fn new(kind: DbExprKind, result_type: Option<TypeUsage>) -> Self {
        Self { kind, result_type }
    }

    pub fn constant(literal: Literal) -> Self {
        let result_type = literal.primitive_type_name().map(TypeUsage::primitive);
        match literal {
            Literal::Null => Self::null(),
            literal => Self::new(DbExprKind::Constant(literal), result_type),
        }
    }

    pub fn enum_member(member: impl Into<String>, enum_type: TypeUsage) -> Self {
        Self::new(DbExprKind::EnumMember(member.into()), Some(enum_type))
    }

    /// Untyped `null`
    pub fn null() -> Self {
        Self::new(DbExprKind::Null, None)
    }

    pub fn typed_null(result_type: TypeUsage) -> Self {
        Self::new(DbExprKind::Null, Some(result_type))
    }

    pub fn variable(name: impl Into<String>, result_type: TypeUsage) -> Self {
        Self::new(DbExprKind::VariableRef(name.into()), Some(result_type))
    }

    pub fn parameter(name: impl Into<String>, result_type: TypeUsage) -> Self {
        Self::new(DbExprKind::ParameterRef(name.into()), Some(result_type))
    }

    pub fn property(self, property: impl Into<String>, result_type: TypeUsage) -> Self {
        Self::new(
            DbExprKind::Property {
                instance: Box::new(self),
                property: property.into(),
            },
            Some(result_type),
        )
    }

    /// Dereference an entity reference; the result type is the target entity
    pub fn deref(self) -> Self {
        let result_type = self.result_type.as_ref().and_then(TypeUsage::dereferenced);
        Self::new(DbExprKind::Deref(Box::new(self)), result_type)
    }

    pub fn scan(
        container: impl Into<String>,
        extent: impl Into<String>,
        element_type: TypeUsage,
    ) -> Self {
        Self::new(
            DbExprKind::Scan {
                container: container.into(),
                extent: extent.into(),
            },
            Some(TypeUsage::collection(element_type)),
        )
    }

    pub fn function_call(
        function: impl Into<String>,
        args: Vec<DbExpr>,
        result_type: TypeUsage,
    ) -> Self {
        Self::new(
            DbExprKind::FunctionCall {
                function: function.into(),
                args,
            },
            Some(result_type),
        )
    }

    pub fn aggregate(
        function: impl Into<String>,
        distinct: bool,
        args: Vec<DbExpr>,
        result_type: TypeUsage,
    ) -> Self {
        Self::new(
            DbExprKind::Aggregate {
                function: function.into(),
                distinct,
                args,
            },
            Some(result_type),
        )
    }

    /// Collection of `argument` values over the group
    pub fn group_aggregate(argument: DbExpr, distinct: bool) -> Self {
        let result_type = argument.result_type.clone().map(TypeUsage::collection);
        Self::new(
            DbExprKind::GroupAggregate {
                distinct,
                argument: Box::new(argument),
            },
            result_type,
        )
    }

    pub fn invoke(function: impl Into<String>, args: Vec<DbExpr>, result_type: Option<TypeUsage>) -> Self {
        Self::new(
            DbExprKind::Invoke {
                function: function.into(),
                args,
            },
            result_type,
        )
    }

    pub fn result_type(&self) -> Option<&TypeUsage> {
        self.result_type.as_ref()
    }

    pub fn is_untyped_null(&self) -> bool {
        self.result_type.is_none()
    }

    /// Name of the referenced variable, if this is a variable reference
    pub fn variable_name(&self) -> Option<&str> {
        match &self.kind {
            DbExprKind::VariableRef(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for DbExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, args: &[DbExpr]) -> fmt::Result {
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            Ok(())
        }

        match &self.kind {
            DbExprKind::Constant(Literal::String(s)) => write!(f, "'{}'", s),
            DbExprKind::Constant(Literal::Boolean(b)) => write!(f, "{}", b),
            DbExprKind::Constant(Literal::Integer(i)) => write!(f, "{}", i),
            DbExprKind::Constant(Literal::Decimal(d)) => write!(f, "{}M", d),
            DbExprKind::Constant(Literal::Null) | DbExprKind::Null => write!(f, "null"),
            DbExprKind::EnumMember(member) => match self.result_type.as_ref().and_then(TypeUsage::type_name) {
                Some(enum_type) => write!(f, "{}.{}", enum_type, member),
                None => write!(f, "{}", member),
            },
            DbExprKind::VariableRef(name) => write!(f, "{}", name),
            DbExprKind::ParameterRef(name) => write!(f, "@{}", name),
            DbExprKind::Property { instance, property } => write!(f, "{}.{}", instance, property),
            DbExprKind::Deref(inner) => write!(f, "deref({})", inner),
            DbExprKind::Scan { container, extent } => write!(f, "{}.{}", container, extent),
            DbExprKind::FunctionCall { function, args } | DbExprKind::Invoke { function, args } => {
                write!(f, "{}(", function)?;
                list(f, args)?;
                write!(f, ")")
            }
            DbExprKind::Aggregate {
                function,
                distinct,
                args,
            } => {
                write!(f, "{}(", function)?;
                if *distinct {
                    write!(f, "distinct ")?;
                }
                list(f, args)?;
                write!(f, ")")
            }
            DbExprKind::GroupAggregate { distinct, argument } => {
                if *distinct {
                    write!(f, "groupPartition(distinct {})", argument)
                } else {
                    write!(f, "groupPartition({})", argument)
                }
            }
        }
    }
}

/// A function body together with its bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct DbLambda {
    /// Variable references for each parameter, in declaration order
    pub parameters: Vec<DbExpr>,
    pub body: DbExpr,
}

impl DbLambda {
    pub fn new(parameters: Vec<DbExpr>, body: DbExpr) -> Self {
        Self { parameters, body }
    }

    pub fn result_type(&self) -> Option<&TypeUsage> {
        self.body.result_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> TypeUsage {
        TypeUsage::primitive("Edm.Int32")
    }

    #[test]
    fn test_constant_types() {
        assert!(DbExpr::constant(Literal::Null).is_untyped_null());
        assert_eq!(
            DbExpr::constant(Literal::Integer(3)).result_type(),
            Some(&TypeUsage::primitive("Edm.Int64"))
        );
        assert!(!DbExpr::typed_null(int()).is_untyped_null());
    }

    #[test]
    fn test_deref_and_scan_types() {
        let owner = DbExpr::variable("o", TypeUsage::reference("M.Person")).deref();
        assert_eq!(owner.result_type(), Some(&TypeUsage::entity("M.Person")));

        let scan = DbExpr::scan("Db", "People", TypeUsage::entity("M.Person"));
        assert_eq!(
            scan.result_type(),
            Some(&TypeUsage::collection(TypeUsage::entity("M.Person")))
        );
        assert_eq!(scan.to_string(), "Db.People");
    }

    #[test]
    fn test_display() {
        let x = DbExpr::variable("x", int());
        let agg = DbExpr::aggregate("Edm.Max", true, vec![x.clone().property("a", int())], int());
        assert_eq!(agg.to_string(), "Edm.Max(distinct x.a)");
        assert_eq!(DbExpr::group_aggregate(x, false).to_string(), "groupPartition(x)");
    }
}
