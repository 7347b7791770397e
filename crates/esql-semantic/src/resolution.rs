//! Results of resolving an expression or a name

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::{DbExpr, EntityContainer, FunctionMetadata, InlineFunctionInfo, NameComparer, TypeUsage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionResolutionClass {
    Value,
    EntityContainer,
    MetadataMember,
}

impl fmt::Display for ExpressionResolutionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value => write!(f, "value expression"),
            Self::EntityContainer => write!(f, "entity container"),
            Self::MetadataMember => write!(f, "metadata member"),
        }
    }
}

/// What an expression or a name turned out to denote
#[derive(Debug, Clone)]
pub enum ExpressionResolution {
    Value(DbExpr),
    EntityContainer(EntityContainer),
    MetadataMember(MetadataMember),
}

impl ExpressionResolution {
    pub fn class(&self) -> ExpressionResolutionClass {
        match self {
            Self::Value(_) => ExpressionResolutionClass::Value,
            Self::EntityContainer(_) => ExpressionResolutionClass::EntityContainer,
            Self::MetadataMember(_) => ExpressionResolutionClass::MetadataMember,
        }
    }

    /// Human-readable class, refined for metadata members ("type", "namespace", ...)
    pub fn class_name(&self) -> String {
        match self {
            Self::MetadataMember(member) => member.class().to_string(),
            other => other.class().to_string(),
        }
    }

    pub fn as_value(&self) -> Option<&DbExpr> {
        match self {
            Self::Value(expr) => Some(expr),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<DbExpr> {
        match self {
            Self::Value(expr) => Some(expr),
            _ => None,
        }
    }

    pub fn as_metadata_member(&self) -> Option<&MetadataMember> {
        match self {
            Self::MetadataMember(member) => Some(member),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataMemberClass {
    Type,
    Namespace,
    FunctionGroup,
    InlineFunctionGroup,
    EnumMember,
}

impl fmt::Display for MetadataMemberClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type => write!(f, "type"),
            Self::Namespace => write!(f, "namespace"),
            Self::FunctionGroup | Self::InlineFunctionGroup => write!(f, "function"),
            Self::EnumMember => write!(f, "enumeration member"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataType {
    pub name: String,
    pub type_usage: TypeUsage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataNamespace {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataFunctionGroup {
    pub name: String,
    pub functions: Vec<FunctionMetadata>,
}

#[derive(Debug, Clone)]
pub struct InlineFunctionGroup {
    pub name: String,
    pub functions: Vec<Rc<InlineFunctionInfo>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataEnumMember {
    pub name: String,
    pub enum_type: TypeUsage,
    pub member: String,
}

/// A catalog item referenced by name
#[derive(Debug, Clone)]
pub enum MetadataMember {
    Type(MetadataType),
    Namespace(MetadataNamespace),
    FunctionGroup(MetadataFunctionGroup),
    InlineFunctionGroup(InlineFunctionGroup),
    EnumMember(MetadataEnumMember),
}

impl MetadataMember {
    pub fn type_member(name: impl Into<String>, type_usage: TypeUsage) -> Self {
        Self::Type(MetadataType {
            name: name.into(),
            type_usage,
        })
    }

    pub fn namespace(name: impl Into<String>) -> Self {
        Self::Namespace(MetadataNamespace { name: name.into() })
    }

    pub fn function_group(name: impl Into<String>, functions: Vec<FunctionMetadata>) -> Self {
        Self::FunctionGroup(MetadataFunctionGroup {
            name: name.into(),
            functions,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Type(m) => &m.name,
            Self::Namespace(m) => &m.name,
            Self::FunctionGroup(m) => &m.name,
            Self::InlineFunctionGroup(m) => &m.name,
            Self::EnumMember(m) => &m.name,
        }
    }

    pub fn class(&self) -> MetadataMemberClass {
        match self {
            Self::Type(_) => MetadataMemberClass::Type,
            Self::Namespace(_) => MetadataMemberClass::Namespace,
            Self::FunctionGroup(_) => MetadataMemberClass::FunctionGroup,
            Self::InlineFunctionGroup(_) => MetadataMemberClass::InlineFunctionGroup,
            Self::EnumMember(_) => MetadataMemberClass::EnumMember,
        }
    }
}

/// Equality and hashing of metadata members by name alone, under a
/// caller-supplied name comparer
#[derive(Debug, Clone, Copy)]
pub struct MetadataMemberComparer {
    comparer: NameComparer,
}

impl MetadataMemberComparer {
    pub fn new(comparer: NameComparer) -> Self {
        Self { comparer }
    }

    pub fn equals(&self, a: &MetadataMember, b: &MetadataMember) -> bool {
        self.comparer.equals(a.name(), b.name())
    }

    pub fn hash<H: Hasher>(&self, member: &MetadataMember, state: &mut H) {
        self.comparer.key(member.name()).hash(state);
    }

    /// Drop later members whose name equals an earlier one
    pub fn dedup(&self, members: impl IntoIterator<Item = MetadataMember>) -> Vec<MetadataMember> {
        let mut unique = IndexMap::new();
        for member in members {
            let key = self.comparer.key(member.name()).into_owned();
            unique.entry(key).or_insert(member);
        }
        unique.into_values().collect()
    }
}
