//! Metadata catalog
//!
//! [`Catalog`] is the resolver's only window onto the schema: types,
//! functions, namespaces and entity containers. [`CatalogRegistry`] is an
//! in-memory implementation that can be built in code or loaded from JSON.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{NameComparer, TypeUsage};

/// Errors raised while loading a catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Duplicate definition of '{0}'")]
    Duplicate(String),

    #[error("Default container '{0}' is not defined")]
    UnknownDefaultContainer(String),
}

/// Read-only schema lookups.
///
/// Every lookup takes `ignore_case`; callers pass the current compilation
/// mode's case sensitivity.
pub trait Catalog {
    /// Type with the given full name (`Namespace.Name`)
    fn type_by_name(&self, full_name: &str, ignore_case: bool) -> Option<TypeUsage>;

    /// All overloads of the function with the given full name
    fn function_group(&self, full_name: &str, ignore_case: bool) -> Option<Vec<FunctionMetadata>>;

    /// Whether `name` is a namespace or a leading part of one
    fn is_namespace(&self, name: &str, ignore_case: bool) -> bool;

    fn entity_container(&self, name: &str, ignore_case: bool) -> Option<EntityContainer>;

    /// Container whose members resolve without qualification
    fn default_container(&self) -> Option<EntityContainer>;

    /// Declared member of an entity or complex type
    fn member(&self, type_name: &str, name: &str, ignore_case: bool) -> Option<MemberMetadata>;

    /// Canonical spelling of a member of an enumeration type
    fn enum_member(&self, enum_type: &str, name: &str, ignore_case: bool) -> Option<String>;
}

/// A property of a structural type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub type_usage: TypeUsage,
}

impl MemberMetadata {
    pub fn new(name: impl Into<String>, type_usage: TypeUsage) -> Self {
        Self {
            name: name.into(),
            type_usage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructuralKind {
    Entity,
    Complex,
}

/// An entity or complex type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralType {
    pub full_name: String,
    pub kind: StructuralKind,
    #[serde(default)]
    pub members: Vec<MemberMetadata>,
}

impl StructuralType {
    pub fn type_usage(&self) -> TypeUsage {
        match self.kind {
            StructuralKind::Entity => TypeUsage::entity(self.full_name.clone()),
            StructuralKind::Complex => TypeUsage::complex(self.full_name.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumType {
    pub full_name: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub type_usage: TypeUsage,
}

/// One overload of a catalog function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionMetadata {
    /// `Namespace.Name`; for function imports, `Container.Name`
    pub full_name: String,
    #[serde(default)]
    pub parameters: Vec<FunctionParameter>,
    pub return_type: TypeUsage,
    /// Aggregates take a collection argument and may be used over a group
    #[serde(default)]
    pub aggregate: bool,
}

impl FunctionMetadata {
    pub fn new(full_name: impl Into<String>, return_type: TypeUsage) -> Self {
        Self {
            full_name: full_name.into(),
            parameters: Vec::new(),
            return_type,
            aggregate: false,
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, type_usage: TypeUsage) -> Self {
        self.parameters.push(FunctionParameter {
            name: name.into(),
            type_usage,
        });
        self
    }

    pub fn as_aggregate(mut self) -> Self {
        self.aggregate = true;
        self
    }

    /// Unqualified name
    pub fn name(&self) -> &str {
        self.full_name
            .rsplit_once('.')
            .map_or(self.full_name.as_str(), |(_, name)| name)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.full_name.rsplit_once('.').map(|(ns, _)| ns)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySet {
    pub name: String,
    /// Full name of the element entity type
    pub element_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityContainer {
    pub name: String,
    #[serde(default)]
    pub entity_sets: Vec<EntitySet>,
    #[serde(default)]
    pub function_imports: Vec<FunctionMetadata>,
}

impl EntityContainer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_sets: Vec::new(),
            function_imports: Vec::new(),
        }
    }

    pub fn with_entity_set(mut self, name: impl Into<String>, element_type: impl Into<String>) -> Self {
        self.entity_sets.push(EntitySet {
            name: name.into(),
            element_type: element_type.into(),
        });
        self
    }

    pub fn with_function_import(mut self, function: FunctionMetadata) -> Self {
        self.function_imports.push(function);
        self
    }

    pub fn extent(&self, name: &str, ignore_case: bool) -> Option<&EntitySet> {
        let comparer = comparer(ignore_case);
        self.entity_sets.iter().find(|set| comparer.equals(&set.name, name))
    }

    /// Function import by its unqualified name
    pub fn function_import(&self, name: &str, ignore_case: bool) -> Option<&FunctionMetadata> {
        let comparer = comparer(ignore_case);
        self.function_imports
            .iter()
            .find(|function| comparer.equals(function.name(), name))
    }
}

fn comparer(ignore_case: bool) -> NameComparer {
    if ignore_case {
        NameComparer::CaseInsensitive
    } else {
        NameComparer::CaseSensitive
    }
}

const PRIMITIVE_TYPES: &[&str] = &[
    "Edm.Binary",
    "Edm.Boolean",
    "Edm.Byte",
    "Edm.DateTime",
    "Edm.DateTimeOffset",
    "Edm.Decimal",
    "Edm.Double",
    "Edm.Guid",
    "Edm.Int16",
    "Edm.Int32",
    "Edm.Int64",
    "Edm.Single",
    "Edm.String",
    "Edm.Time",
];

/// In-memory catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogRegistry {
    #[serde(default)]
    types: Vec<StructuralType>,
    #[serde(default)]
    enums: Vec<EnumType>,
    #[serde(default)]
    functions: Vec<FunctionMetadata>,
    #[serde(default)]
    containers: Vec<EntityContainer>,
    #[serde(default)]
    default_container: Option<String>,
}

impl CatalogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from a JSON document
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let registry: Self = serde_json::from_str(json)?;
        registry.validate()?;
        Ok(registry)
    }

    /// Load a catalog from a JSON file at runtime
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = BTreeSet::new();
        let names = self
            .types
            .iter()
            .map(|t| &t.full_name)
            .chain(self.enums.iter().map(|e| &e.full_name))
            .chain(self.containers.iter().map(|c| &c.name));
        for name in names {
            if !seen.insert(name.as_str()) {
                return Err(CatalogError::Duplicate(name.clone()));
            }
        }
        if let Some(default) = &self.default_container {
            if !self.containers.iter().any(|c| &c.name == default) {
                return Err(CatalogError::UnknownDefaultContainer(default.clone()));
            }
        }
        Ok(())
    }

    pub fn with_entity_type(mut self, full_name: impl Into<String>, members: Vec<MemberMetadata>) -> Self {
        self.types.push(StructuralType {
            full_name: full_name.into(),
            kind: StructuralKind::Entity,
            members,
        });
        self
    }

    pub fn with_complex_type(mut self, full_name: impl Into<String>, members: Vec<MemberMetadata>) -> Self {
        self.types.push(StructuralType {
            full_name: full_name.into(),
            kind: StructuralKind::Complex,
            members,
        });
        self
    }

    pub fn with_enum_type(mut self, full_name: impl Into<String>, members: &[&str]) -> Self {
        self.enums.push(EnumType {
            full_name: full_name.into(),
            members: members.iter().map(|m| m.to_string()).collect(),
        });
        self
    }

    pub fn with_function(mut self, function: FunctionMetadata) -> Self {
        self.functions.push(function);
        self
    }

    pub fn with_container(mut self, container: EntityContainer) -> Self {
        self.containers.push(container);
        self
    }

    pub fn with_default_container(mut self, name: impl Into<String>) -> Self {
        self.default_container = Some(name.into());
        self
    }

    fn structural_type(&self, full_name: &str, ignore_case: bool) -> Option<&StructuralType> {
        let comparer = comparer(ignore_case);
        self.types.iter().find(|t| comparer.equals(&t.full_name, full_name))
    }

    fn enum_type(&self, full_name: &str, ignore_case: bool) -> Option<&EnumType> {
        let comparer = comparer(ignore_case);
        self.enums.iter().find(|e| comparer.equals(&e.full_name, full_name))
    }

    fn qualified_names(&self) -> impl Iterator<Item = &str> {
        self.types
            .iter()
            .map(|t| t.full_name.as_str())
            .chain(self.enums.iter().map(|e| e.full_name.as_str()))
            .chain(self.functions.iter().map(|f| f.full_name.as_str()))
            .chain(PRIMITIVE_TYPES.iter().copied())
    }
}

impl Catalog for CatalogRegistry {
    fn type_by_name(&self, full_name: &str, ignore_case: bool) -> Option<TypeUsage> {
        if let Some(ty) = self.structural_type(full_name, ignore_case) {
            return Some(ty.type_usage());
        }
        if let Some(ty) = self.enum_type(full_name, ignore_case) {
            return Some(TypeUsage::enumeration(ty.full_name.clone()));
        }
        let comparer = comparer(ignore_case);
        PRIMITIVE_TYPES
            .iter()
            .find(|name| comparer.equals(name, full_name))
            .map(|name| TypeUsage::primitive(*name))
    }

    fn function_group(&self, full_name: &str, ignore_case: bool) -> Option<Vec<FunctionMetadata>> {
        let comparer = comparer(ignore_case);
        let overloads: Vec<_> = self
            .functions
            .iter()
            .filter(|f| comparer.equals(&f.full_name, full_name))
            .cloned()
            .collect();
        (!overloads.is_empty()).then_some(overloads)
    }

    fn is_namespace(&self, name: &str, ignore_case: bool) -> bool {
        let comparer = comparer(ignore_case);
        self.qualified_names().any(|qualified| {
            let mut prefix_end = qualified.match_indices('.').map(|(i, _)| i);
            prefix_end.any(|end| comparer.equals(&qualified[..end], name))
        })
    }

    fn entity_container(&self, name: &str, ignore_case: bool) -> Option<EntityContainer> {
        let comparer = comparer(ignore_case);
        self.containers
            .iter()
            .find(|c| comparer.equals(&c.name, name))
            .cloned()
    }

    fn default_container(&self) -> Option<EntityContainer> {
        let name = self.default_container.as_deref()?;
        self.containers.iter().find(|c| c.name == name).cloned()
    }

    fn member(&self, type_name: &str, name: &str, ignore_case: bool) -> Option<MemberMetadata> {
        let comparer = comparer(ignore_case);
        self.structural_type(type_name, false)?
            .members
            .iter()
            .find(|m| comparer.equals(&m.name, name))
            .cloned()
    }

    fn enum_member(&self, enum_type: &str, name: &str, ignore_case: bool) -> Option<String> {
        let comparer = comparer(ignore_case);
        self.enum_type(enum_type, false)?
            .members
            .iter()
            .find(|m| comparer.equals(m, name))
            .cloned()
    }
}
