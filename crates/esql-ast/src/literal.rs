//! Literal AST nodes

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Untyped `null`
    Null,
    Boolean(bool),
    /// Integer literal (64-bit signed)
    Integer(i64),
    /// Decimal literal (suffix `M`)
    Decimal(Decimal),
    String(String),
}

impl Literal {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Name of the primitive type this literal denotes, `None` for `null`
    pub fn primitive_type_name(&self) -> Option<&'static str> {
        match self {
            Self::Null => None,
            Self::Boolean(_) => Some("Edm.Boolean"),
            Self::Integer(_) => Some("Edm.Int64"),
            Self::Decimal(_) => Some("Edm.Decimal"),
            Self::String(_) => Some("Edm.String"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_type_names() {
        assert_eq!(Literal::Null.primitive_type_name(), None);
        assert!(Literal::Null.is_null());
        assert_eq!(Literal::Integer(1).primitive_type_name(), Some("Edm.Int64"));
        assert_eq!(
            Literal::Decimal(Decimal::new(15, 1)).primitive_type_name(),
            Some("Edm.Decimal")
        );
    }
}
