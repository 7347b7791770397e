//! Semantic resolver
//!
//! Owns the scope stack, the scope regions and the chain of active
//! aggregate contexts for one compilation, and resolves names against them
//! and against the catalog.
//!
//! Scope regions, scopes and aggregates are entered through guards. A
//! guard dereferences to the resolver, so resolution continues through it,
//! and restores the previous state when dropped, including when an error
//! unwinds the caller with `?`.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use indexmap::IndexMap;
use log::{debug, error, trace};

use esql_ast::{AliasedExpr, DotExpr, ExprKind, GroupPartitionExpr, MethodExpr};
use esql_diagnostics::{
    ESQL0100, ESQL0102, ESQL0103, ESQL0105, ESQL0106, ESQL0107, ESQL0108, ESQL0109, ESQL0402,
    ESQL0409, ErrorCode, ErrorContext, EsqlError, MessageTable, Result, StringTable, keys,
};

use crate::{
    AggregateAttachment, AggregateKind, AggregateOrigin, AttachedAggregate, Catalog, Clause,
    DbExpr, DbExprKind, EntityContainer, ExpressionResolution, GroupKeyDefinition, MetadataMember,
    NameComparer, ParserOptions, PendingAggregate, RegionId, Savepoint, Scope, ScopeEntry,
    ScopeManager, ScopeRegion, TypeResolver, TypeUsage, select_group_key_form,
};

/// Semantic resolver for one compilation
pub struct SemanticResolver {
    options: ParserOptions,
    comparer: NameComparer,
    strings: Rc<dyn StringTable>,
    type_resolver: TypeResolver,
    parameters: IndexMap<String, DbExpr>,
    variables: IndexMap<String, DbExpr>,
    scopes: ScopeManager,
    /// Current scope region
    region: ScopeRegion,
    /// Enclosing scope regions, outermost first
    outer_regions: Vec<ScopeRegion>,
    /// Active aggregate contexts, outermost first
    aggregates: Vec<PendingAggregate>,
    ignore_entity_container_name_resolution: bool,
    name_counter: u32,
}

impl fmt::Debug for SemanticResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SemanticResolver")
            .field("options", &self.options)
            .field("parameters", &self.parameters)
            .field("variables", &self.variables)
            .field("scopes", &self.scopes)
            .field("region", &self.region)
            .field("outer_regions", &self.outer_regions)
            .field("aggregates", &self.aggregates)
            .finish_non_exhaustive()
    }
}

/// Builder for [`SemanticResolver`]
pub struct SemanticResolverBuilder {
    catalog: Rc<dyn Catalog>,
    options: ParserOptions,
    strings: Rc<dyn StringTable>,
    parameters: Vec<(String, TypeUsage)>,
    variables: Vec<(String, TypeUsage)>,
    namespace_imports: Vec<String>,
}

impl SemanticResolverBuilder {
    pub fn with_options(mut self, options: ParserOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_strings(mut self, strings: Rc<dyn StringTable>) -> Self {
        self.strings = strings;
        self
    }

    /// Query parameter, referenced as `@name`
    pub fn with_parameter(mut self, name: impl Into<String>, type_usage: TypeUsage) -> Self {
        self.parameters.push((name.into(), type_usage));
        self
    }

    /// Free variable, bound in the root scope
    pub fn with_variable(mut self, name: impl Into<String>, type_usage: TypeUsage) -> Self {
        self.variables.push((name.into(), type_usage));
        self
    }

    pub fn with_namespace_import(mut self, namespace: impl Into<String>) -> Self {
        self.namespace_imports.push(namespace.into());
        self
    }

    /// Fails when a parameter or a variable name is given twice
    pub fn build(self) -> Result<SemanticResolver> {
        let comparer = self.options.name_comparer();
        let strings = self.strings;

        let mut parameters = IndexMap::new();
        for (name, type_usage) in self.parameters {
            let key = comparer.key(&name).into_owned();
            if parameters.contains_key(&key) {
                return Err(EsqlError::semantic(
                    ESQL0102,
                    strings.format(keys::MULTIPLE_DEFINITIONS_OF_PARAMETER, &[&name]),
                ));
            }
            parameters.insert(key, DbExpr::parameter(name, type_usage));
        }

        let mut variables = IndexMap::new();
        for (name, type_usage) in self.variables {
            let key = comparer.key(&name).into_owned();
            if variables.contains_key(&key) {
                return Err(EsqlError::semantic(
                    ESQL0103,
                    strings.format(keys::MULTIPLE_DEFINITIONS_OF_VARIABLE, &[&name]),
                ));
            }
            variables.insert(key, DbExpr::variable(name, type_usage));
        }

        let mut type_resolver = TypeResolver::with_strings(self.catalog, self.options, strings.clone());
        for namespace in self.namespace_imports {
            type_resolver.add_namespace_import(namespace);
        }

        SemanticResolver::create(type_resolver, parameters, variables)
    }
}

impl SemanticResolver {
    pub fn builder(catalog: Rc<dyn Catalog>) -> SemanticResolverBuilder {
        SemanticResolverBuilder {
            catalog,
            options: ParserOptions::default(),
            strings: Rc::new(MessageTable::english()),
            parameters: Vec::new(),
            variables: Vec::new(),
            namespace_imports: Vec::new(),
        }
    }

    /// Resolver without parameters or free variables
    pub fn new(catalog: Rc<dyn Catalog>, options: ParserOptions) -> Self {
        let type_resolver = TypeResolver::new(catalog, options);
        Self::with_root_scope(type_resolver, IndexMap::new(), IndexMap::new())
    }

    fn create(
        type_resolver: TypeResolver,
        parameters: IndexMap<String, DbExpr>,
        variables: IndexMap<String, DbExpr>,
    ) -> Result<Self> {
        let mut resolver = Self::with_root_scope(type_resolver, parameters, IndexMap::new());
        for variable in variables.values() {
            let name = variable.variable_name().unwrap_or_default().to_string();
            resolver
                .scopes
                .current_scope_mut()?
                .add(name, ScopeEntry::FreeVar(variable.clone()))?;
        }
        resolver.variables = variables;
        Ok(resolver)
    }

    fn with_root_scope(
        type_resolver: TypeResolver,
        parameters: IndexMap<String, DbExpr>,
        variables: IndexMap<String, DbExpr>,
    ) -> Self {
        let options = type_resolver.options();
        let comparer = options.name_comparer();
        let mut scopes = ScopeManager::new(comparer);
        scopes.enter_scope();
        Self {
            options,
            comparer,
            strings: type_resolver.strings().clone(),
            type_resolver,
            parameters,
            variables,
            scopes,
            region: ScopeRegion::new(RegionId::ROOT, 0),
            outer_regions: Vec::new(),
            aggregates: Vec::new(),
            ignore_entity_container_name_resolution: false,
            name_counter: 0,
        }
    }

    /// A resolver with fresh scopes that shares parameters, variables and
    /// inline function declarations with this one
    pub(crate) fn clone_for_inline_function_conversion(&self) -> Result<Self> {
        Self::create(
            self.type_resolver.clone(),
            self.parameters.clone(),
            self.variables.clone(),
        )
    }

    pub fn options(&self) -> ParserOptions {
        self.options
    }

    pub fn name_comparer(&self) -> NameComparer {
        self.comparer
    }

    pub fn strings(&self) -> &dyn StringTable {
        self.strings.as_ref()
    }

    pub fn type_resolver(&self) -> &TypeResolver {
        &self.type_resolver
    }

    pub fn type_resolver_mut(&mut self) -> &mut TypeResolver {
        &mut self.type_resolver
    }

    pub fn catalog(&self) -> &Rc<dyn Catalog> {
        self.type_resolver.catalog()
    }

    pub fn parameters(&self) -> impl Iterator<Item = &DbExpr> {
        self.parameters.values()
    }

    pub fn variables(&self) -> impl Iterator<Item = &DbExpr> {
        self.variables.values()
    }

    fn error(&self, ctx: &ErrorContext, code: ErrorCode, key: &str, args: &[&str]) -> EsqlError {
        ctx.error(self.strings.as_ref(), code, key, args)
    }

    // Scopes

    pub fn scope_manager(&self) -> &ScopeManager {
        &self.scopes
    }

    pub fn current_scope(&self) -> Result<&Scope> {
        self.scopes.current_scope()
    }

    pub fn current_scope_mut(&mut self) -> Result<&mut Scope> {
        self.scopes.current_scope_mut()
    }

    pub fn current_scope_index(&self) -> Result<usize> {
        self.scopes
            .current_scope_index()
            .ok_or_else(|| EsqlError::internal(ESQL0402, "no current scope"))
    }

    /// Bind `name` in the current scope
    pub fn add_to_current_scope(&mut self, name: impl Into<String>, entry: ScopeEntry) -> Result<()> {
        self.scopes.current_scope_mut()?.add(name, entry)
    }

    pub fn is_bound_in_current_scope(&self, name: &str) -> bool {
        self.scopes.is_bound_in_current_scope(name)
    }

    /// Push a scope that is popped when the guard is dropped
    pub fn enter_scope(&mut self) -> ScopeGuard<'_> {
        self.scopes.enter_scope();
        let depth = self.scopes.len();
        ScopeGuard {
            resolver: self,
            depth,
        }
    }

    /// Execute a closure with a temporary scope
    pub fn with_scope<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        let mut guard = self.enter_scope();
        f(&mut *guard)
    }

    pub fn savepoint(&self) -> Result<Savepoint> {
        self.scopes.savepoint()
    }

    /// Discard every scope entered after `savepoint`. The savepoint must
    /// lie within the current scope region.
    pub fn rollback_to(&mut self, savepoint: Savepoint) -> Result<()> {
        if !self.region.contains_scope(savepoint.scope_index()) {
            return Err(EsqlError::internal(
                ESQL0402,
                format!(
                    "savepoint {} lies outside of the current {}",
                    savepoint.scope_index(),
                    self.region.id()
                ),
            ));
        }
        self.scopes.rollback(savepoint)
    }

    fn try_scope_lookup(&self, name: &str) -> Option<(usize, ScopeEntry)> {
        let found = self.scopes.lookup(name).map(|(index, entry)| (index, entry.clone()));
        trace!(
            "scope lookup '{}': {:?}",
            name,
            found.as_ref().map(|(index, entry)| (index, entry.kind()))
        );
        found
    }

    // Scope regions

    /// Push a scope region together with its first scope
    pub fn enter_scope_region(&mut self) -> ScopeRegionGuard<'_> {
        self.scopes.enter_scope();
        let first_scope_index = self.scopes.len() - 1;
        let id = RegionId(self.outer_regions.len() + 1);
        let outer = std::mem::replace(&mut self.region, ScopeRegion::new(id, first_scope_index));
        self.outer_regions.push(outer);
        debug!("entered {} at scope {}", id, first_scope_index);
        ScopeRegionGuard { resolver: self, id }
    }

    fn leave_scope_region(&mut self, id: RegionId) {
        if self.region.id() != id {
            error!("scope region stack corrupted: leaving {} while {} is current", id, self.region.id());
            return;
        }
        let Some(outer) = self.outer_regions.pop() else {
            error!("attempt to leave the root scope region");
            return;
        };
        let left = std::mem::replace(&mut self.region, outer);
        self.scopes.truncate(left.first_scope_index());
        debug!(
            "left {} ({} aggregates, correlated: {})",
            id,
            left.aggregates().len(),
            left.was_resolution_correlated()
        );
    }

    pub fn current_scope_region(&self) -> &ScopeRegion {
        &self.region
    }

    pub fn scope_region(&self, id: RegionId) -> Option<&ScopeRegion> {
        if id == self.region.id() {
            Some(&self.region)
        } else {
            self.outer_regions.get(id.index())
        }
    }

    fn scope_region_mut(&mut self, id: RegionId) -> Option<&mut ScopeRegion> {
        if id == self.region.id() {
            Some(&mut self.region)
        } else {
            self.outer_regions.get_mut(id.index())
        }
    }

    /// Innermost region that owns `scope_index`
    pub fn defining_scope_region(&self, scope_index: usize) -> RegionId {
        std::iter::once(&self.region)
            .chain(self.outer_regions.iter().rev())
            .find(|region| region.contains_scope(scope_index))
            .map_or(RegionId::ROOT, ScopeRegion::id)
    }

    fn set_scope_region_correlation_flag(&mut self, scope_index: usize) {
        let id = self.defining_scope_region(scope_index);
        if let Some(region) = self.scope_region_mut(id) {
            region.mark_correlated();
        }
    }

    /// Whether GROUP BY has been applied in any active region
    pub fn is_in_any_group_scope(&self) -> bool {
        self.region.is_aggregating() || self.outer_regions.iter().any(ScopeRegion::is_aggregating)
    }

    // Aggregates

    pub fn enter_function_aggregate(&mut self, method: MethodExpr, ctx: ErrorContext) -> AggregateGuard<'_> {
        self.enter_aggregate(AggregateOrigin::Function(method), ctx)
    }

    pub fn enter_group_partition(&mut self, partition: GroupPartitionExpr, ctx: ErrorContext) -> AggregateGuard<'_> {
        self.enter_aggregate(AggregateOrigin::Partition(partition), ctx)
    }

    pub fn enter_group_key_definition(&mut self, ctx: ErrorContext) -> AggregateGuard<'_> {
        self.enter_aggregate(AggregateOrigin::GroupKey, ctx)
    }

    fn enter_aggregate(&mut self, origin: AggregateOrigin, ctx: ErrorContext) -> AggregateGuard<'_> {
        let containing = self.aggregates.len().checked_sub(1);
        debug!("entered {} in {}", origin.kind(), self.region.id());
        self.aggregates
            .push(PendingAggregate::new(origin, ctx, containing, self.region.id()));
        let depth = self.aggregates.len();
        AggregateGuard {
            resolver: self,
            depth,
            finished: false,
        }
    }

    /// Innermost active aggregate context
    pub fn current_aggregate(&self) -> Option<&PendingAggregate> {
        self.aggregates.last()
    }

    /// Active aggregate contexts, outermost first
    pub fn aggregate_chain(&self) -> &[PendingAggregate] {
        &self.aggregates
    }

    fn finish_aggregate(
        &mut self,
        depth: usize,
        name: String,
        attachment: AggregateAttachment,
    ) -> Result<AttachedAggregate> {
        if self.aggregates.len() != depth {
            return Err(EsqlError::internal(
                ESQL0409,
                format!(
                    "aggregate chain corrupted: finishing depth {} with {} active",
                    depth,
                    self.aggregates.len()
                ),
            ));
        }
        let pending = self
            .aggregates
            .pop()
            .ok_or_else(|| EsqlError::internal(ESQL0409, "no active aggregate to finish"))?;
        let attached = pending.attach(name, attachment)?;

        let evaluating = attached.evaluating_region();
        let aggregating = self
            .scope_region(evaluating)
            .is_some_and(ScopeRegion::is_aggregating);
        attached.validate(
            aggregating,
            self.options.is_clause_active(Clause::GroupBy),
            self.strings.as_ref(),
        )?;

        if let Some(containing) = self.aggregates.last_mut() {
            containing.record_contained(&attached);
        }
        if attached.kind() != AggregateKind::GroupKey {
            if let Some(region) = self.scope_region_mut(evaluating) {
                region.register_aggregate(attached.clone());
            }
        }
        debug!(
            "attached {} '{}' evaluated in {}",
            attached.kind(),
            attached.name(),
            evaluating
        );
        Ok(attached)
    }

    /// Capture the aggregate bookkeeping a speculative conversion may touch
    pub(crate) fn aggregate_snapshot(&self) -> AggregateSnapshot {
        AggregateSnapshot {
            name_counter: self.name_counter,
            current: self.aggregates.last().cloned(),
            registered: self
                .outer_regions
                .iter()
                .chain(std::iter::once(&self.region))
                .map(|region| region.aggregates().len())
                .collect(),
        }
    }

    /// Undo the aggregate side effects recorded since `snapshot` was taken.
    /// The region and aggregate stacks must be as deep as they were then.
    pub(crate) fn restore_aggregate_snapshot(&mut self, snapshot: AggregateSnapshot) {
        let regions = self
            .outer_regions
            .iter_mut()
            .chain(std::iter::once(&mut self.region));
        for (region, len) in regions.zip(snapshot.registered) {
            region.truncate_aggregates(len);
        }
        if let (Some(current), Some(saved)) = (self.aggregates.last_mut(), snapshot.current) {
            *current = saved;
        }
        self.name_counter = snapshot.name_counter;
        trace!("restored aggregate state in {}", self.region.id());
    }

    /// Expression denoted by a scope entry, adjusted for the active aggregates
    fn expression_from_scope_entry(
        &mut self,
        entry: &ScopeEntry,
        scope_index: usize,
        name: &str,
        ctx: &ErrorContext,
    ) -> Result<DbExpr> {
        let mut expr = entry.resolve(name, ctx, self.strings.as_ref())?;

        let entry_region = self.defining_scope_region(scope_index);
        if let Some(current) = self.aggregates.last_mut() {
            if entry_region <= current.defining_region() {
                current.record_reference(entry_region);
                if let Some(key) = entry.as_group_key() {
                    let (form, kind) = select_group_key_form(&self.aggregates, entry_region, key);
                    trace!("group key '{}' in {} resolved through {:?}", name, entry_region, kind);
                    expr = form.clone();
                }
            }
        }
        Ok(expr)
    }

    // Name resolution

    /// Suppress resolution of simple names as entity containers until the
    /// guard is dropped. Not reentrant.
    pub fn ignore_entity_container_name_resolution(&mut self) -> Result<IgnoreContainerGuard<'_>> {
        if self.ignore_entity_container_name_resolution {
            return Err(EsqlError::internal(
                ESQL0409,
                "entity container name resolution is already suppressed",
            ));
        }
        self.ignore_entity_container_name_resolution = true;
        Ok(IgnoreContainerGuard { resolver: self })
    }

    /// Resolve a simple identifier: scope entries first, then members of the
    /// default entity container, entity containers and finally catalog names
    pub fn resolve_simple_name(
        &mut self,
        name: &str,
        lhs_of_member_access: bool,
        ctx: &ErrorContext,
    ) -> Result<ExpressionResolution> {
        if let Some((scope_index, entry)) = self.try_scope_lookup(name) {
            if let ScopeEntry::SourceVar(var) = &entry {
                if var.join_left {
                    return Err(self.error(ctx, ESQL0109, keys::INVALID_JOIN_LEFT_CORRELATION, &[]));
                }
            }
            self.set_scope_region_correlation_flag(scope_index);
            let expr = self.expression_from_scope_entry(&entry, scope_index, name, ctx)?;
            return Ok(ExpressionResolution::Value(expr));
        }

        let ignore_case = self.options.is_case_insensitive();
        if let Some(container) = self.catalog().default_container() {
            if let Some(resolution) = self.try_resolve_entity_container_member_access(&container, name) {
                return Ok(resolution);
            }
        }

        if !self.ignore_entity_container_name_resolution {
            if let Some(container) = self.catalog().entity_container(name, ignore_case) {
                return Ok(ExpressionResolution::EntityContainer(container));
            }
        }

        let member = self
            .type_resolver
            .resolve_unqualified_name(name, lhs_of_member_access, ctx)?;
        Ok(ExpressionResolution::MetadataMember(member))
    }

    /// Resolve the name of a called function. Scope entries are not
    /// consulted; names that only resolve to a namespace fall back to
    /// function imports of the default entity container.
    pub fn resolve_simple_function_name(&self, name: &str, ctx: &ErrorContext) -> Result<MetadataMember> {
        let resolution = self.type_resolver.resolve_unqualified_name(name, false, ctx);
        let fallback = match &resolution {
            Ok(MetadataMember::Namespace(_)) => true,
            Err(err) => err.code() == ESQL0100,
            Ok(_) => false,
        };
        if fallback {
            if let Some(container) = self.catalog().default_container() {
                if let Some(ExpressionResolution::MetadataMember(member)) =
                    self.try_resolve_entity_container_member_access(&container, name)
                {
                    return Ok(member);
                }
            }
        }
        resolution
    }

    pub fn resolve_metadata_member_name(&self, names: &[String], ctx: &ErrorContext) -> Result<MetadataMember> {
        self.type_resolver.resolve_metadata_member_name(names, ctx)
    }

    pub fn resolve_metadata_member_access(
        &self,
        member: &MetadataMember,
        name: &str,
        ctx: &ErrorContext,
    ) -> Result<MetadataMember> {
        self.type_resolver.resolve_metadata_member_access(member, name, ctx)
    }

    /// `instance.name`, dereferencing entity references when needed
    pub fn resolve_property_access(&self, instance: DbExpr, name: &str, ctx: &ErrorContext) -> Result<DbExpr> {
        let Some(instance_type) = instance.result_type().cloned() else {
            return Err(self.error(ctx, ESQL0105, keys::NOT_A_MEMBER_OF_TYPE, &[name, "null"]));
        };

        if let Some(property) = self.try_resolve_property(&instance, &instance_type, name) {
            return Ok(property);
        }

        match &instance_type {
            TypeUsage::Ref { entity } => {
                let target = TypeUsage::entity(entity.clone());
                let dereferenced = instance.deref();
                self.try_resolve_property(&dereferenced, &target, name)
                    .ok_or_else(|| {
                        self.error(
                            ctx,
                            ESQL0107,
                            keys::INVALID_DEREF_PROPERTY,
                            &[name, entity.as_str(), &instance_type.to_string()],
                        )
                    })
            }
            collection if collection.is_collection() => Err(self.error(
                ctx,
                ESQL0106,
                keys::NOT_A_MEMBER_OF_COLLECTION,
                &[name, &collection.to_string()],
            )),
            other => Err(self.error(
                ctx,
                ESQL0105,
                keys::NOT_A_MEMBER_OF_TYPE,
                &[name, &other.to_string()],
            )),
        }
    }

    fn try_resolve_property(&self, instance: &DbExpr, instance_type: &TypeUsage, name: &str) -> Option<DbExpr> {
        match instance_type {
            TypeUsage::Row { fields } => fields
                .iter()
                .find(|field| self.comparer.equals(&field.name, name))
                .map(|field| instance.clone().property(field.name.clone(), field.type_usage.clone())),
            TypeUsage::Entity { name: type_name } | TypeUsage::Complex { name: type_name } => self
                .catalog()
                .member(type_name, name, self.options.is_case_insensitive())
                .map(|member| instance.clone().property(member.name, member.type_usage)),
            _ => None,
        }
    }

    /// `container.name`: an entity set or a function import
    pub fn resolve_entity_container_member_access(
        &self,
        container: &EntityContainer,
        name: &str,
        ctx: &ErrorContext,
    ) -> Result<ExpressionResolution> {
        self.try_resolve_entity_container_member_access(container, name)
            .ok_or_else(|| {
                self.error(
                    ctx,
                    ESQL0108,
                    keys::MEMBER_DOES_NOT_BELONG_TO_ENTITY_CONTAINER,
                    &[name, &container.name],
                )
            })
    }

    fn try_resolve_entity_container_member_access(
        &self,
        container: &EntityContainer,
        name: &str,
    ) -> Option<ExpressionResolution> {
        let ignore_case = self.options.is_case_insensitive();
        if let Some(extent) = container.extent(name, ignore_case) {
            let element_type = TypeUsage::entity(extent.element_type.clone());
            let scan = DbExpr::scan(container.name.clone(), extent.name.clone(), element_type);
            return Some(ExpressionResolution::Value(scan));
        }
        container.function_import(name, ignore_case).map(|function| {
            ExpressionResolution::MetadataMember(MetadataMember::function_group(
                function.full_name.clone(),
                vec![function.clone()],
            ))
        })
    }

    /// Resolve `a.b` as a reference to a group key defined as `GROUP BY a.b`
    pub fn try_resolve_dot_expr_as_group_key_alternative_name(
        &mut self,
        dot: &DotExpr,
        ctx: &ErrorContext,
    ) -> Result<Option<DbExpr>> {
        if !self.is_in_any_group_scope() {
            return Ok(None);
        }
        let Some(names) = dot.multipart_identifier() else {
            return Ok(None);
        };
        let full_name = names.join(".");
        let Some((scope_index, entry)) = self.try_scope_lookup(&full_name) else {
            return Ok(None);
        };
        let matches = entry.alternative_name().is_some_and(|alternative| {
            alternative.len() == names.len()
                && alternative
                    .iter()
                    .zip(&names)
                    .all(|(a, b)| self.comparer.equals(a, b))
        });
        if !matches {
            return Ok(None);
        }
        self.set_scope_region_correlation_flag(scope_index);
        self.expression_from_scope_entry(&entry, scope_index, &full_name, ctx)
            .map(Some)
    }

    /// Resolve `@name`
    pub fn resolve_parameter(&self, name: &str, ctx: &ErrorContext) -> Result<DbExpr> {
        self.parameters
            .get(self.comparer.key(name).as_ref())
            .cloned()
            .ok_or_else(|| {
                self.error(
                    ctx,
                    ESQL0100,
                    keys::COULD_NOT_RESOLVE_IDENTIFIER,
                    &[&format!("@{}", name)],
                )
            })
    }

    // GROUP BY

    /// Start grouping the current region's input.
    ///
    /// Marks the region aggregating and rebinds every source variable of the
    /// current scope as a group key: directly it still denotes the input,
    /// inside aggregates it is recomputed from `group_var` or `group_agg`.
    /// Returns `None` when the compilation mode leaves GROUP BY inert.
    pub fn begin_group_by(&mut self, group_var: &DbExpr, group_agg: &DbExpr) -> Result<Option<GroupByRewrite>> {
        if !self.options.is_clause_active(Clause::GroupBy) {
            return Ok(None);
        }
        let scope_index = self.current_scope_index()?;
        if !self.region.contains_scope(scope_index) {
            return Err(EsqlError::internal(ESQL0402, "current scope lies outside of the current region"));
        }

        let sources: Vec<(String, ScopeEntry)> = self
            .scopes
            .current_scope()?
            .iter()
            .filter(|(_, entry)| matches!(entry, ScopeEntry::SourceVar(_)))
            .map(|(name, entry)| (name.to_string(), entry.clone()))
            .collect();
        let single = sources.len() == 1;

        let scope = self.scopes.current_scope_mut()?;
        for (name, entry) in &sources {
            let ScopeEntry::SourceVar(var) = entry else {
                continue;
            };
            let rebase = |base: &DbExpr| match (single, var.expr.result_type()) {
                (false, Some(ty)) => base.clone().property(name.clone(), ty.clone()),
                _ => base.clone(),
            };
            let mut key = GroupKeyDefinition::new(var.expr.clone(), rebase(group_var), rebase(group_agg));
            key.alternative_name = var.alternative_name.clone();
            scope.replace(name, ScopeEntry::GroupKeyDefinition(key))?;
        }

        self.region.set_aggregating(true);
        debug!("grouped {} source variables in {}", sources.len(), self.region.id());
        Ok(Some(GroupByRewrite {
            scope_index,
            originals: sources,
        }))
    }

    // Names

    /// `_##<hint><n>`; the counter is per resolver and wraps around
    pub fn generate_internal_name(&mut self, hint: &str) -> String {
        let name = format!("_##{}{}", hint, self.name_counter);
        self.name_counter = self.name_counter.wrapping_add(1);
        name
    }

    /// The alias of an aliased expression, or a name derived from the
    /// expression itself
    pub fn infer_alias_name(&mut self, aliased: &AliasedExpr, converted: &DbExpr) -> String {
        if let Some(alias) = &aliased.alias {
            return alias.name.clone();
        }
        match &aliased.expr.kind {
            ExprKind::Identifier(id) => return id.name.clone(),
            ExprKind::Dot(dot) if dot.multipart_identifier().is_some() => {
                return dot.identifier.name.clone();
            }
            _ => {}
        }
        match &converted.kind {
            DbExprKind::Scan { extent, .. } => extent.clone(),
            DbExprKind::Property { property, .. } => property.clone(),
            DbExprKind::VariableRef(name) => name.clone(),
            _ => self.generate_internal_name(""),
        }
    }
}

/// Aggregate bookkeeping saved before a throw-away argument conversion
#[derive(Debug)]
pub(crate) struct AggregateSnapshot {
    name_counter: u32,
    current: Option<PendingAggregate>,
    registered: Vec<usize>,
}

/// Source variables rebound by [`SemanticResolver::begin_group_by`]
#[must_use = "a GROUP BY rewrite must be restored or invalidated"]
#[derive(Debug)]
pub struct GroupByRewrite {
    scope_index: usize,
    originals: Vec<(String, ScopeEntry)>,
}

impl GroupByRewrite {
    /// Names of the rebound source variables
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.originals.iter().map(|(name, _)| name.as_str())
    }

    fn check_scope(&self, resolver: &SemanticResolver) -> Result<()> {
        if resolver.scopes.current_scope_index() != Some(self.scope_index) {
            return Err(EsqlError::internal(
                ESQL0402,
                format!(
                    "GROUP BY rewrite of scope {} finished while scope {:?} is current",
                    self.scope_index,
                    resolver.scopes.current_scope_index()
                ),
            ));
        }
        Ok(())
    }

    /// Put the original source variables back and leave grouping
    pub fn restore(self, resolver: &mut SemanticResolver) -> Result<()> {
        self.check_scope(resolver)?;
        let scope = resolver.scopes.current_scope_mut()?;
        for (name, entry) in self.originals {
            scope.replace(&name, entry)?;
        }
        resolver.region.set_aggregating(false);
        Ok(())
    }

    /// Make the source variables unreachable now that the group keys are defined
    pub fn invalidate(self, resolver: &mut SemanticResolver) -> Result<()> {
        self.check_scope(resolver)?;
        let scope = resolver.scopes.current_scope_mut()?;
        for (name, _) in &self.originals {
            scope.replace(name, ScopeEntry::InvalidGroupInputRef)?;
        }
        Ok(())
    }
}

/// Active scope region; leaving it pops every scope entered inside it
pub struct ScopeRegionGuard<'r> {
    resolver: &'r mut SemanticResolver,
    id: RegionId,
}

impl ScopeRegionGuard<'_> {
    pub fn id(&self) -> RegionId {
        self.id
    }
}

impl Deref for ScopeRegionGuard<'_> {
    type Target = SemanticResolver;

    fn deref(&self) -> &SemanticResolver {
        self.resolver
    }
}

impl DerefMut for ScopeRegionGuard<'_> {
    fn deref_mut(&mut self) -> &mut SemanticResolver {
        self.resolver
    }
}

impl Drop for ScopeRegionGuard<'_> {
    fn drop(&mut self) {
        self.resolver.leave_scope_region(self.id);
    }
}

/// Active scope
pub struct ScopeGuard<'r> {
    resolver: &'r mut SemanticResolver,
    depth: usize,
}

impl Deref for ScopeGuard<'_> {
    type Target = SemanticResolver;

    fn deref(&self) -> &SemanticResolver {
        self.resolver
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut SemanticResolver {
        self.resolver
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.resolver.scopes.truncate(self.depth - 1);
    }
}

/// Active aggregate context.
///
/// [`AggregateGuard::attach`] completes and validates the aggregate;
/// dropping the guard without attaching discards it.
pub struct AggregateGuard<'r> {
    resolver: &'r mut SemanticResolver,
    depth: usize,
    finished: bool,
}

impl AggregateGuard<'_> {
    pub fn context(&self) -> Option<&PendingAggregate> {
        self.resolver.aggregates.get(self.depth - 1)
    }

    pub fn attach(mut self, name: impl Into<String>, attachment: AggregateAttachment) -> Result<AttachedAggregate> {
        self.finished = true;
        let depth = self.depth;
        self.resolver.finish_aggregate(depth, name.into(), attachment)
    }
}

impl Deref for AggregateGuard<'_> {
    type Target = SemanticResolver;

    fn deref(&self) -> &SemanticResolver {
        self.resolver
    }
}

impl DerefMut for AggregateGuard<'_> {
    fn deref_mut(&mut self) -> &mut SemanticResolver {
        self.resolver
    }
}

impl Drop for AggregateGuard<'_> {
    fn drop(&mut self) {
        if !self.finished && self.resolver.aggregates.len() == self.depth {
            self.resolver.aggregates.pop();
            debug!("discarded unattached aggregate at depth {}", self.depth);
        }
    }
}

/// Suppression of entity container name resolution
pub struct IgnoreContainerGuard<'r> {
    resolver: &'r mut SemanticResolver,
}

impl Deref for IgnoreContainerGuard<'_> {
    type Target = SemanticResolver;

    fn deref(&self) -> &SemanticResolver {
        self.resolver
    }
}

impl DerefMut for IgnoreContainerGuard<'_> {
    fn deref_mut(&mut self) -> &mut SemanticResolver {
        self.resolver
    }
}

impl Drop for IgnoreContainerGuard<'_> {
    fn drop(&mut self) {
        self.resolver.ignore_entity_container_name_resolution = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use esql_ast::{Expr, Identifier};
    use esql_diagnostics::*;

    use crate::{CatalogRegistry, CompilationMode, FunctionMetadata, MemberMetadata, SourceVar};

    fn person() -> TypeUsage {
        TypeUsage::entity("Model.Person")
    }

    fn int() -> TypeUsage {
        TypeUsage::primitive("Edm.Int32")
    }

    fn catalog() -> Rc<dyn Catalog> {
        Rc::new(
            CatalogRegistry::new()
                .with_entity_type(
                    "Model.Person",
                    vec![
                        MemberMetadata::new("Name", TypeUsage::primitive("Edm.String")),
                        MemberMetadata::new("Age", int()),
                        MemberMetadata::new("Manager", TypeUsage::reference("Model.Person")),
                    ],
                )
                .with_function(
                    FunctionMetadata::new("Edm.Max", int())
                        .with_parameter("values", TypeUsage::collection(int()))
                        .as_aggregate(),
                )
                .with_container(
                    EntityContainer::new("Db")
                        .with_entity_set("People", "Model.Person")
                        .with_function_import(FunctionMetadata::new("Db.Adults", TypeUsage::collection(person()))),
                )
                .with_default_container("Db"),
        )
    }

    fn resolver() -> SemanticResolver {
        SemanticResolver::new(catalog(), ParserOptions::default())
    }

    fn ctx() -> ErrorContext {
        ErrorContext::detached()
    }

    fn value(sr: &mut SemanticResolver, name: &str) -> DbExpr {
        sr.resolve_simple_name(name, false, &ctx())
            .unwrap()
            .into_value()
            .unwrap()
    }

    fn max_call() -> MethodExpr {
        let name = Expr::new(ExprKind::Identifier(Identifier::new("Max")), ctx());
        MethodExpr::new(name, vec![])
    }

    #[test]
    fn test_builder_binds_parameters_and_variables() {
        let mut sr = SemanticResolver::builder(catalog())
            .with_parameter("Limit", int())
            .with_variable("today", int())
            .build()
            .unwrap();

        assert_eq!(value(&mut sr, "TODAY"), DbExpr::variable("today", int()));
        assert_eq!(
            sr.resolve_parameter("limit", &ctx()).unwrap(),
            DbExpr::parameter("Limit", int())
        );
        assert_eq!(
            sr.resolve_parameter("missing", &ctx()).unwrap_err().code(),
            ESQL0100
        );
    }

    #[test]
    fn test_builder_rejects_duplicates() {
        let err = SemanticResolver::builder(catalog())
            .with_parameter("p", int())
            .with_parameter("P", int())
            .build()
            .unwrap_err();
        assert_eq!(err.code(), ESQL0102);

        let err = SemanticResolver::builder(catalog())
            .with_options(ParserOptions::new(CompilationMode::RestrictedViewGeneration))
            .with_variable("v", int())
            .with_variable("V", int())
            .with_variable("v", int())
            .build()
            .unwrap_err();
        assert_eq!(err.code(), ESQL0103);
    }

    #[test]
    fn test_region_guard_pops_its_scopes() {
        let mut sr = resolver();
        {
            let mut region = sr.enter_scope_region();
            assert_eq!(region.id(), RegionId(1));
            region.add_to_current_scope("p", ScopeEntry::source_var(DbExpr::variable("p", person()))).unwrap();
            let mut inner = region.enter_scope();
            inner.add_to_current_scope("q", ScopeEntry::source_var(DbExpr::variable("q", person()))).unwrap();
            assert_eq!(inner.scope_manager().len(), 3);
            assert_eq!(inner.defining_scope_region(2), RegionId(1));
            assert_eq!(inner.defining_scope_region(0), RegionId::ROOT);
        }
        assert_eq!(sr.scope_manager().len(), 1);
        assert_eq!(sr.current_scope_region().id(), RegionId::ROOT);
        assert!(sr.resolve_simple_name("p", false, &ctx()).is_err());
    }

    #[test]
    fn test_rollback_is_confined_to_current_region() {
        let mut sr = resolver();
        let outer = sr.savepoint().unwrap();
        let mut region = sr.enter_scope_region();
        let err = region.rollback_to(outer).unwrap_err();
        assert_eq!(err.code(), ESQL0402);

        let inner = region.savepoint().unwrap();
        region.scopes.enter_scope();
        region.scopes.enter_scope();
        region.rollback_to(inner).unwrap();
        assert_eq!(region.scope_manager().len(), 2);
    }

    #[test]
    fn test_outer_reference_marks_region_correlated() {
        let mut sr = resolver();
        let mut outer = sr.enter_scope_region();
        outer.add_to_current_scope("p", ScopeEntry::source_var(DbExpr::variable("p", person()))).unwrap();
        let mut inner = outer.enter_scope_region();
        value(&mut inner, "p");
        assert!(!inner.current_scope_region().was_resolution_correlated());
        assert!(inner.scope_region(RegionId(1)).unwrap().was_resolution_correlated());
    }

    #[test]
    fn test_join_left_reference_is_rejected() {
        let mut sr = resolver();
        let var = SourceVar::new(DbExpr::variable("l", person())).join_left();
        sr.add_to_current_scope("l", ScopeEntry::SourceVar(var)).unwrap();
        let err = sr.resolve_simple_name("l", false, &ctx()).unwrap_err();
        assert_eq!(err.code(), ESQL0109);
    }

    #[test]
    fn test_resolution_order() {
        let mut sr = resolver();

        // default container members before containers and catalog names
        assert_eq!(
            value(&mut sr, "people"),
            DbExpr::scan("Db", "People", person())
        );
        let adults = sr.resolve_simple_name("Adults", false, &ctx()).unwrap();
        assert_eq!(adults.class_name(), "function");

        let db = sr.resolve_simple_name("Db", false, &ctx()).unwrap();
        assert_eq!(db.class(), crate::ExpressionResolutionClass::EntityContainer);

        let model = sr.resolve_simple_name("Model", true, &ctx()).unwrap();
        assert_eq!(model.class_name(), "namespace");

        // scope entries shadow everything else
        sr.add_to_current_scope("Db", ScopeEntry::FreeVar(DbExpr::variable("Db", int()))).unwrap();
        assert_eq!(value(&mut sr, "db"), DbExpr::variable("Db", int()));
    }

    #[test]
    fn test_ignore_entity_container_name_resolution() {
        let mut sr = resolver();
        let mut guard = sr.ignore_entity_container_name_resolution().unwrap();
        let err = guard.resolve_simple_name("Db", false, &ctx()).unwrap_err();
        assert_eq!(err.code(), ESQL0100);
        assert!(matches!(
            guard.ignore_entity_container_name_resolution(),
            Err(err) if err.code() == ESQL0409
        ));
        drop(guard);
        assert!(sr.resolve_simple_name("Db", false, &ctx()).is_ok());
    }

    #[test]
    fn test_function_name_falls_back_to_function_imports() {
        let sr = resolver();
        let member = sr.resolve_simple_function_name("adults", &ctx()).unwrap();
        assert_eq!(member.name(), "Db.Adults");

        let err = sr.resolve_simple_function_name("Missing", &ctx()).unwrap_err();
        assert_eq!(err.code(), ESQL0100);
    }

    #[test]
    fn test_property_access() {
        let sr = resolver();
        let p = DbExpr::variable("p", person());

        assert_eq!(
            sr.resolve_property_access(p.clone(), "age", &ctx()).unwrap(),
            p.clone().property("Age", int())
        );

        let manager = p.clone().property("Manager", TypeUsage::reference("Model.Person"));
        assert_eq!(
            sr.resolve_property_access(manager.clone(), "Name", &ctx()).unwrap(),
            manager.clone().deref().property("Name", TypeUsage::primitive("Edm.String"))
        );
        assert_eq!(
            sr.resolve_property_access(manager, "Salary", &ctx()).unwrap_err().code(),
            ESQL0107
        );

        let people = DbExpr::scan("Db", "People", person());
        assert_eq!(
            sr.resolve_property_access(people, "Name", &ctx()).unwrap_err().code(),
            ESQL0106
        );
        assert_eq!(
            sr.resolve_property_access(DbExpr::null(), "Name", &ctx()).unwrap_err().code(),
            ESQL0105
        );
    }

    #[test]
    fn test_entity_container_member_access() {
        let sr = resolver();
        let db = sr.catalog().entity_container("Db", false).unwrap();
        let err = sr
            .resolve_entity_container_member_access(&db, "Orders", &ctx())
            .unwrap_err();
        assert_eq!(err.code(), ESQL0108);
        assert!(err.message().contains("'Db'"));
    }

    #[test]
    fn test_group_by_rewrite_and_invalidate() {
        let mut sr = resolver();
        let mut region = sr.enter_scope_region();
        let p = DbExpr::variable("p", person());
        let q = DbExpr::variable("q", person());
        region.add_to_current_scope("p", ScopeEntry::source_var(p.clone())).unwrap();
        region.add_to_current_scope("q", ScopeEntry::source_var(q.clone())).unwrap();

        let group_var = DbExpr::variable("g", TypeUsage::row(vec![]));
        let group_agg = DbExpr::variable("ga", TypeUsage::row(vec![]));
        let rewrite = region.begin_group_by(&group_var, &group_agg).unwrap().unwrap();
        assert_eq!(rewrite.names().collect::<Vec<_>>(), vec!["p", "q"]);
        assert!(region.is_in_any_group_scope());

        let key = region.current_scope().unwrap().try_lookup("q").unwrap().clone();
        assert_eq!(
            key.as_group_key().unwrap(),
            &GroupKeyDefinition::new(
                q.clone(),
                group_var.clone().property("q", person()),
                group_agg.clone().property("q", person()),
            )
        );
        assert_eq!(value(&mut region, "q"), q);

        rewrite.invalidate(&mut region).unwrap();
        let err = region.resolve_simple_name("p", false, &ctx()).unwrap_err();
        assert_eq!(err.code(), ESQL0101);
    }

    #[test]
    fn test_group_by_restore() {
        let mut sr = resolver();
        let mut region = sr.enter_scope_region();
        let p = DbExpr::variable("p", person());
        region.add_to_current_scope("p", ScopeEntry::source_var(p.clone())).unwrap();

        let group_var = DbExpr::variable("g", person());
        let rewrite = region.begin_group_by(&group_var, &DbExpr::variable("ga", person())).unwrap().unwrap();
        let key = region.current_scope().unwrap().try_lookup("p").unwrap().clone();
        assert_eq!(key.as_group_key().unwrap().group_var_based, group_var);

        let nested = region.enter_scope();
        assert_eq!(rewrite.check_scope(&nested).unwrap_err().code(), ESQL0402);
        drop(nested);

        rewrite.restore(&mut region).unwrap();
        assert!(!region.is_in_any_group_scope());
        assert_eq!(
            region.current_scope().unwrap().try_lookup("p"),
            Some(&ScopeEntry::source_var(p))
        );
    }

    #[test]
    fn test_group_by_is_inert_in_restricted_mode() {
        let options = ParserOptions::new(CompilationMode::RestrictedViewGeneration);
        let mut sr = SemanticResolver::new(catalog(), options);
        let rewrite = sr.begin_group_by(&DbExpr::null(), &DbExpr::null()).unwrap();
        assert!(rewrite.is_none());
        assert!(!sr.is_in_any_group_scope());
    }

    #[test]
    fn test_unattached_aggregate_is_discarded() {
        let mut sr = resolver();
        {
            let guard = sr.enter_function_aggregate(max_call(), ctx());
            assert_eq!(guard.aggregate_chain().len(), 1);
            assert_eq!(guard.context().unwrap().kind(), AggregateKind::Function);
        }
        assert!(sr.current_aggregate().is_none());
    }

    #[test]
    fn test_aggregate_outside_group_is_rejected() {
        let mut sr = resolver();
        let guard = sr.enter_function_aggregate(max_call(), ctx());
        let err = guard
            .attach("_##groupAggMax0", AggregateAttachment::ResultType(int()))
            .unwrap_err();
        assert_eq!(err.code(), ESQL0110);
        assert!(sr.aggregate_chain().is_empty());
    }

    #[test]
    fn test_group_key_alternative_name() {
        let mut sr = resolver();
        let mut region = sr.enter_scope_region();
        let key = GroupKeyDefinition::new(
            DbExpr::variable("k", int()),
            DbExpr::variable("gk", int()),
            DbExpr::variable("gak", int()),
        )
        .with_alternative_name(["p", "Age"]);
        region.add_to_current_scope("p.Age", ScopeEntry::GroupKeyDefinition(key)).unwrap();

        let dot = DotExpr::new(
            Expr::new(ExprKind::Identifier(Identifier::new("P")), ctx()),
            Identifier::new("age"),
        );
        // only consulted once grouping is in effect
        assert_eq!(
            region.try_resolve_dot_expr_as_group_key_alternative_name(&dot, &ctx()).unwrap(),
            None
        );
        region.region.set_aggregating(true);
        assert_eq!(
            region.try_resolve_dot_expr_as_group_key_alternative_name(&dot, &ctx()).unwrap(),
            Some(DbExpr::variable("k", int()))
        );
    }

    #[test]
    fn test_internal_names() {
        let mut sr = resolver();
        assert_eq!(sr.generate_internal_name("groupAggMax"), "_##groupAggMax0");
        assert_eq!(sr.generate_internal_name(""), "_##1");

        sr.name_counter = u32::MAX;
        assert_eq!(sr.generate_internal_name("x"), format!("_##x{}", u32::MAX));
        assert_eq!(sr.generate_internal_name("x"), "_##x0");
    }

    #[test]
    fn test_infer_alias_name() {
        let mut sr = resolver();
        let ident = |name: &str| Expr::new(ExprKind::Identifier(Identifier::new(name)), ctx());
        let literal = Expr::new(ExprKind::Literal(esql_ast::Literal::Integer(1)), ctx());
        let p = DbExpr::variable("p", person());

        let aliased = AliasedExpr::new(ident("p")).with_alias(Identifier::new("x"));
        assert_eq!(sr.infer_alias_name(&aliased, &p), "x");
        assert_eq!(sr.infer_alias_name(&AliasedExpr::new(ident("p")), &p), "p");

        let dotted = Expr::new(ExprKind::Dot(DotExpr::new(ident("p"), Identifier::new("Age"))), ctx());
        assert_eq!(sr.infer_alias_name(&AliasedExpr::new(dotted), &p), "Age");

        let from_expr = |sr: &mut SemanticResolver, converted: DbExpr| {
            sr.infer_alias_name(&AliasedExpr::new(literal.clone()), &converted)
        };
        assert_eq!(from_expr(&mut sr, DbExpr::scan("Db", "People", person())), "People");
        assert_eq!(from_expr(&mut sr, p.clone().property("Age", int())), "Age");
        assert_eq!(from_expr(&mut sr, p), "p");
        assert_eq!(from_expr(&mut sr, DbExpr::constant(esql_ast::Literal::Integer(1))), "_##0");
    }
}
