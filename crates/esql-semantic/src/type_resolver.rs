//! Resolution of names against the catalog
//!
//! Unqualified names are looked up at the top level and under every
//! imported namespace; inline functions declared in the query shadow
//! catalog functions of the same name.

use std::cell::RefCell;
use std::iter;
use std::rc::Rc;

use indexmap::IndexMap;
use log::debug;

use esql_diagnostics::{
    ESQL0100, ESQL0104, ESQL0114, ESQL0400, ErrorContext, EsqlError, MessageTable, Result, StringTable, keys,
};

use crate::{
    Catalog, InlineFunctionGroup, InlineFunctionInfo, MetadataEnumMember, MetadataMember,
    MetadataMemberComparer, NameComparer, ParserOptions, TypeUsage,
};

type InlineFunctions = Rc<RefCell<IndexMap<String, InlineFunctionGroup>>>;

/// Catalog name resolution for one compilation.
///
/// Clones share the set of declared inline functions.
#[derive(Clone)]
pub struct TypeResolver {
    catalog: Rc<dyn Catalog>,
    options: ParserOptions,
    strings: Rc<dyn StringTable>,
    namespace_imports: Vec<String>,
    inline_functions: InlineFunctions,
}

impl std::fmt::Debug for TypeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeResolver")
            .field("options", &self.options)
            .field("namespace_imports", &self.namespace_imports)
            .field("inline_functions", &self.inline_functions.borrow().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl TypeResolver {
    pub fn new(catalog: Rc<dyn Catalog>, options: ParserOptions) -> Self {
        Self::with_strings(catalog, options, Rc::new(MessageTable::english()))
    }

    pub fn with_strings(
        catalog: Rc<dyn Catalog>,
        options: ParserOptions,
        strings: Rc<dyn StringTable>,
    ) -> Self {
        Self {
            catalog,
            options,
            strings,
            namespace_imports: Vec::new(),
            inline_functions: Rc::new(RefCell::new(IndexMap::new())),
        }
    }

    pub fn catalog(&self) -> &Rc<dyn Catalog> {
        &self.catalog
    }

    pub fn options(&self) -> ParserOptions {
        self.options
    }

    pub fn strings(&self) -> &Rc<dyn StringTable> {
        &self.strings
    }

    fn comparer(&self) -> NameComparer {
        self.options.name_comparer()
    }

    fn ignore_case(&self) -> bool {
        self.options.is_case_insensitive()
    }

    /// Make the members of `namespace` resolvable without qualification
    pub fn add_namespace_import(&mut self, namespace: impl Into<String>) {
        self.namespace_imports.push(namespace.into());
    }

    pub fn namespace_imports(&self) -> &[String] {
        &self.namespace_imports
    }

    /// Register an overload of the inline function `name`
    pub fn declare_inline_function(&self, name: &str, function: Rc<InlineFunctionInfo>) {
        let key = self.comparer().key(name).into_owned();
        let mut functions = self.inline_functions.borrow_mut();
        functions
            .entry(key)
            .or_insert_with(|| InlineFunctionGroup {
                name: name.to_string(),
                functions: Vec::new(),
            })
            .functions
            .push(function);
        debug!("declared inline function '{}'", name);
    }

    fn inline_function_group(&self, name: &str) -> Option<InlineFunctionGroup> {
        self.inline_functions
            .borrow()
            .get(self.comparer().key(name).as_ref())
            .cloned()
    }

    /// Resolve a single name.
    ///
    /// `part_of_qualified_name` is set when the name is the left-hand side of
    /// a member access; unknown names then resolve to a namespace so that the
    /// rest of the dotted name can still be tried.
    pub fn resolve_unqualified_name(
        &self,
        name: &str,
        part_of_qualified_name: bool,
        ctx: &ErrorContext,
    ) -> Result<MetadataMember> {
        if !part_of_qualified_name {
            if let Some(group) = self.inline_function_group(name) {
                return Ok(MetadataMember::InlineFunctionGroup(group));
            }
        }

        let scopes = iter::once(None).chain(self.namespace_imports.iter().map(Some));
        let mut candidates = Vec::new();
        for namespace in scopes {
            let full_name = match namespace {
                Some(namespace) => format!("{}.{}", namespace, name),
                None => name.to_string(),
            };
            candidates.extend(self.try_resolve_full_name(&full_name));
        }

        let mut candidates = MetadataMemberComparer::new(self.comparer()).dedup(candidates);
        match candidates.len() {
            0 => {}
            1 => return Ok(candidates.remove(0)),
            _ => {
                return Err(ctx.error(
                    self.strings.as_ref(),
                    ESQL0104,
                    keys::AMBIGUOUS_NAME,
                    &[name, candidates[0].name(), candidates[1].name()],
                ));
            }
        }

        if part_of_qualified_name || self.catalog.is_namespace(name, self.ignore_case()) {
            return Ok(MetadataMember::namespace(name));
        }

        Err(ctx.error(
            self.strings.as_ref(),
            ESQL0100,
            keys::COULD_NOT_RESOLVE_IDENTIFIER,
            &[name],
        ))
    }

    /// Types and function groups with exactly this full name
    fn try_resolve_full_name(&self, full_name: &str) -> Vec<MetadataMember> {
        let ignore_case = self.ignore_case();
        let mut found = Vec::new();
        if let Some(type_usage) = self.catalog.type_by_name(full_name, ignore_case) {
            let name = type_usage.type_name().unwrap_or(full_name).to_string();
            found.push(MetadataMember::type_member(name, type_usage));
        }
        if let Some(functions) = self.catalog.function_group(full_name, ignore_case) {
            let name = functions
                .first()
                .map_or(full_name, |f| f.full_name.as_str())
                .to_string();
            found.push(MetadataMember::function_group(name, functions));
        }
        found
    }

    /// Resolve a dotted name such as `Namespace.Type.Member`
    pub fn resolve_metadata_member_name(&self, names: &[String], ctx: &ErrorContext) -> Result<MetadataMember> {
        let Some((first, rest)) = names.split_first() else {
            return Err(EsqlError::internal(ESQL0400, "empty metadata member name"));
        };
        let mut member = self.resolve_unqualified_name(first, !rest.is_empty(), ctx)?;
        for name in rest {
            member = self.resolve_metadata_member_access(&member, name, ctx)?;
        }
        Ok(member)
    }

    /// Resolve `member.name`
    pub fn resolve_metadata_member_access(
        &self,
        member: &MetadataMember,
        name: &str,
        ctx: &ErrorContext,
    ) -> Result<MetadataMember> {
        let ignore_case = self.ignore_case();
        match member {
            MetadataMember::Namespace(namespace) => {
                let full_name = format!("{}.{}", namespace.name, name);
                let mut found = self.try_resolve_full_name(&full_name);
                match found.len() {
                    0 if self.catalog.is_namespace(&full_name, ignore_case) => {
                        Ok(MetadataMember::namespace(full_name))
                    }
                    0 => Err(ctx.error(
                        self.strings.as_ref(),
                        ESQL0100,
                        keys::COULD_NOT_RESOLVE_IDENTIFIER,
                        &[&full_name],
                    )),
                    1 => Ok(found.remove(0)),
                    _ => Err(ctx.error(
                        self.strings.as_ref(),
                        ESQL0104,
                        keys::AMBIGUOUS_NAME,
                        &[&full_name, found[0].name(), found[1].name()],
                    )),
                }
            }
            MetadataMember::Type(ty) => {
                if let TypeUsage::Enum { name: enum_name } = &ty.type_usage {
                    if let Some(enum_member) = self.catalog.enum_member(enum_name, name, ignore_case) {
                        return Ok(MetadataMember::EnumMember(MetadataEnumMember {
                            name: format!("{}.{}", enum_name, enum_member),
                            enum_type: ty.type_usage.clone(),
                            member: enum_member,
                        }));
                    }
                }
                Err(self.invalid_member_access(member, name, ctx))
            }
            MetadataMember::FunctionGroup(_)
            | MetadataMember::InlineFunctionGroup(_)
            | MetadataMember::EnumMember(_) => Err(self.invalid_member_access(member, name, ctx)),
        }
    }

    fn invalid_member_access(&self, member: &MetadataMember, name: &str, ctx: &ErrorContext) -> EsqlError {
        ctx.error(
            self.strings.as_ref(),
            ESQL0114,
            keys::INVALID_METADATA_MEMBER_ACCESS,
            &[name, &member.class().to_string(), member.name()],
        )
    }

    /// Resolve a dotted name that must denote a type
    pub fn resolve_type_name(&self, names: &[String], ctx: &ErrorContext) -> Result<TypeUsage> {
        match self.resolve_metadata_member_name(names, ctx)? {
            MetadataMember::Type(ty) => Ok(ty.type_usage),
            _ => Err(ctx.error(
                self.strings.as_ref(),
                ESQL0100,
                keys::COULD_NOT_RESOLVE_IDENTIFIER,
                &[&names.join(".")],
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CatalogRegistry, CompilationMode, FunctionMetadata, MetadataMemberClass};
    use pretty_assertions::assert_eq;

    fn int() -> TypeUsage {
        TypeUsage::primitive("Edm.Int32")
    }

    fn catalog() -> Rc<dyn Catalog> {
        Rc::new(
            CatalogRegistry::new()
                .with_entity_type("Model.Person", vec![])
                .with_enum_type("Model.Color", &["Red", "Green"])
                .with_function(FunctionMetadata::new("Edm.Length", int()))
                .with_function(FunctionMetadata::new("Other.Length", int())),
        )
    }

    fn resolver() -> TypeResolver {
        TypeResolver::new(catalog(), ParserOptions::default())
    }

    fn names(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_qualified_type_name() {
        let member = resolver()
            .resolve_metadata_member_name(&names(&["model", "person"]), &ErrorContext::detached())
            .unwrap();
        assert_eq!(member.class(), MetadataMemberClass::Type);
        assert_eq!(member.name(), "Model.Person");
    }

    #[test]
    fn test_namespace_import() {
        let mut resolver = resolver();
        resolver.add_namespace_import("Model");
        let member = resolver
            .resolve_unqualified_name("Person", false, &ErrorContext::detached())
            .unwrap();
        assert_eq!(member.name(), "Model.Person");
    }

    #[test]
    fn test_duplicate_imports_are_not_ambiguous() {
        let mut resolver = resolver();
        resolver.add_namespace_import("Edm");
        resolver.add_namespace_import("EDM");
        let member = resolver
            .resolve_unqualified_name("Length", false, &ErrorContext::detached())
            .unwrap();
        assert_eq!(member.class(), MetadataMemberClass::FunctionGroup);
    }

    #[test]
    fn test_ambiguous_name() {
        let mut resolver = resolver();
        resolver.add_namespace_import("Edm");
        resolver.add_namespace_import("Other");
        let err = resolver
            .resolve_unqualified_name("Length", false, &ErrorContext::detached())
            .unwrap_err();
        assert_eq!(err.code(), ESQL0104);
        assert!(err.message().contains("Edm.Length"));
        assert!(err.message().contains("Other.Length"));
    }

    #[test]
    fn test_unknown_names() {
        let resolver = resolver();
        let ctx = ErrorContext::detached();

        let err = resolver.resolve_unqualified_name("Nope", false, &ctx).unwrap_err();
        assert_eq!(err.code(), ESQL0100);

        let member = resolver.resolve_unqualified_name("Nope", true, &ctx).unwrap();
        assert_eq!(member.class(), MetadataMemberClass::Namespace);

        let member = resolver.resolve_unqualified_name("Model", false, &ctx).unwrap();
        assert_eq!(member.class(), MetadataMemberClass::Namespace);
    }

    #[test]
    fn test_enum_member_access() {
        let member = resolver()
            .resolve_metadata_member_name(&names(&["Model", "Color", "red"]), &ErrorContext::detached())
            .unwrap();
        match member {
            MetadataMember::EnumMember(m) => {
                assert_eq!(m.member, "Red");
                assert_eq!(m.name, "Model.Color.Red");
            }
            other => panic!("expected enum member, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_member_access() {
        let err = resolver()
            .resolve_metadata_member_name(&names(&["Model", "Person", "Name"]), &ErrorContext::detached())
            .unwrap_err();
        assert_eq!(err.code(), ESQL0114);
        assert!(err.message().contains("type 'Model.Person'"));
    }

    #[test]
    fn test_case_sensitive_mode() {
        let resolver = TypeResolver::new(
            catalog(),
            ParserOptions::new(CompilationMode::RestrictedViewGeneration),
        );
        let err = resolver
            .resolve_metadata_member_name(&names(&["Model", "person"]), &ErrorContext::detached())
            .unwrap_err();
        assert_eq!(err.code(), ESQL0100);
    }

    #[test]
    fn test_resolve_type_name() {
        let ctx = ErrorContext::detached();
        assert_eq!(
            resolver().resolve_type_name(&names(&["Edm", "Int32"]), &ctx).unwrap(),
            int()
        );
        assert!(resolver().resolve_type_name(&names(&["Edm", "Length"]), &ctx).is_err());
    }
}
