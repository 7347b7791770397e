//! Type usages carried by resolved expressions

use std::fmt;

use serde::{Deserialize, Serialize};

/// A named field of a row type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowField {
    pub name: String,
    #[serde(rename = "type")]
    pub type_usage: TypeUsage,
}

impl RowField {
    pub fn new(name: impl Into<String>, type_usage: TypeUsage) -> Self {
        Self {
            name: name.into(),
            type_usage,
        }
    }
}

/// The type of an expression, as far as name resolution needs to know it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypeUsage {
    /// `Edm.Int32`, `Edm.String`, ...
    Primitive { name: String },
    /// Entity type, identified by its full name
    Entity { name: String },
    /// Complex type, identified by its full name
    Complex { name: String },
    /// Enumeration type, identified by its full name
    Enum { name: String },
    /// Anonymous row
    Row { fields: Vec<RowField> },
    Collection { element: Box<TypeUsage> },
    /// Reference to an entity type
    Ref { entity: String },
}

impl TypeUsage {
    pub fn primitive(name: impl Into<String>) -> Self {
        Self::Primitive { name: name.into() }
    }

    pub fn entity(name: impl Into<String>) -> Self {
        Self::Entity { name: name.into() }
    }

    pub fn complex(name: impl Into<String>) -> Self {
        Self::Complex { name: name.into() }
    }

    pub fn enumeration(name: impl Into<String>) -> Self {
        Self::Enum { name: name.into() }
    }

    pub fn row(fields: Vec<RowField>) -> Self {
        Self::Row { fields }
    }

    pub fn collection(element: TypeUsage) -> Self {
        Self::Collection {
            element: Box::new(element),
        }
    }

    pub fn reference(entity: impl Into<String>) -> Self {
        Self::Ref {
            entity: entity.into(),
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Self::Collection { .. })
    }

    /// Whether an argument of type `arg` binds to a parameter of this type.
    /// `None` stands for an untyped null, which binds to anything.
    pub fn accepts(&self, arg: Option<&TypeUsage>) -> bool {
        match (self, arg) {
            (_, None) => true,
            (Self::Collection { element }, Some(Self::Collection { element: arg })) => {
                element.accepts(Some(arg))
            }
            (param, Some(arg)) => param == arg,
        }
    }

    /// Types with named members
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Entity { .. } | Self::Complex { .. } | Self::Row { .. })
    }

    pub fn element_type(&self) -> Option<&TypeUsage> {
        match self {
            Self::Collection { element } => Some(element),
            _ => None,
        }
    }

    /// The entity type a reference points to
    pub fn dereferenced(&self) -> Option<TypeUsage> {
        match self {
            Self::Ref { entity } => Some(Self::entity(entity.clone())),
            _ => None,
        }
    }

    /// Catalog name of a nominal type
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Self::Primitive { name }
            | Self::Entity { name }
            | Self::Complex { name }
            | Self::Enum { name } => Some(name),
            Self::Row { .. } | Self::Collection { .. } | Self::Ref { .. } => None,
        }
    }
}

impl fmt::Display for TypeUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive { name }
            | Self::Entity { name }
            | Self::Complex { name }
            | Self::Enum { name } => write!(f, "{}", name),
            Self::Row { fields } => {
                write!(f, "Row(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", field.name, field.type_usage)?;
                }
                write!(f, ")")
            }
            Self::Collection { element } => write!(f, "Collection({})", element),
            Self::Ref { entity } => write!(f, "Ref({})", entity),
        }
    }
}
