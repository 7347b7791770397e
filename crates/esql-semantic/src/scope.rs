//! Scopes and the scope stack
//!
//! A [`Scope`] maps names to [`ScopeEntry`] values under the compilation's
//! [`NameComparer`]. The [`ScopeManager`] keeps scopes on a stack; index 0 is
//! the root scope holding free variables, the highest index is the current
//! scope.

use indexmap::IndexMap;
use log::trace;
use smallvec::SmallVec;
use std::fmt;

use esql_diagnostics::{
    ESQL0101, ESQL0401, ESQL0402, ESQL0403, ESQL0404, ESQL0407, ErrorContext, EsqlError, Result,
    StringTable, keys,
};

use crate::{DbExpr, NameComparer};

/// Dotted name under which a grouped expression may also be referenced,
/// e.g. `a.b` for the key `GROUP BY a.b`
pub type AlternativeName = SmallVec<[String; 2]>;

/// Variable introduced by a FROM clause
#[derive(Debug, Clone, PartialEq)]
pub struct SourceVar {
    pub expr: DbExpr,
    /// Set while the left input of a JOIN is being resolved; such variables
    /// must not be referenced from the left side of the same join
    pub join_left: bool,
    pub alternative_name: Option<AlternativeName>,
}

impl SourceVar {
    pub fn new(expr: DbExpr) -> Self {
        Self {
            expr,
            join_left: false,
            alternative_name: None,
        }
    }

    pub fn join_left(mut self) -> Self {
        self.join_left = true;
        self
    }
}

/// A GROUP BY key (or a source variable adjusted to grouping).
///
/// The same key is reachable three ways, depending on where it is
/// referenced from.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupKeyDefinition {
    /// Outside any aggregate: the key itself
    pub direct: DbExpr,
    /// Inside an aggregate function argument: recomputed from the group variable
    pub group_var_based: DbExpr,
    /// Inside `GROUPPARTITION`: recomputed from the group aggregate
    pub group_agg_based: DbExpr,
    pub alternative_name: Option<AlternativeName>,
}

impl GroupKeyDefinition {
    pub fn new(direct: DbExpr, group_var_based: DbExpr, group_agg_based: DbExpr) -> Self {
        Self {
            direct,
            group_var_based,
            group_agg_based,
            alternative_name: None,
        }
    }

    pub fn with_alternative_name(mut self, name: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.alternative_name = Some(name.into_iter().map(Into::into).collect());
        self
    }
}

/// What a name in a scope is bound to
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeEntry {
    SourceVar(SourceVar),
    /// Externally supplied variable or inline function parameter
    FreeVar(DbExpr),
    /// SELECT list item, visible in ORDER BY
    ProjectionItemDefinition(DbExpr),
    GroupKeyDefinition(GroupKeyDefinition),
    /// Group input variable that went out of reach after GROUP BY
    InvalidGroupInputRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeEntryKind {
    SourceVar,
    FreeVar,
    ProjectionItemDefinition,
    GroupKeyDefinition,
    InvalidGroupInputRef,
}

impl fmt::Display for ScopeEntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceVar => write!(f, "source variable"),
            Self::FreeVar => write!(f, "free variable"),
            Self::ProjectionItemDefinition => write!(f, "projection item"),
            Self::GroupKeyDefinition => write!(f, "group key"),
            Self::InvalidGroupInputRef => write!(f, "invalid group input reference"),
        }
    }
}

impl ScopeEntry {
    pub fn source_var(expr: DbExpr) -> Self {
        Self::SourceVar(SourceVar::new(expr))
    }

    pub fn kind(&self) -> ScopeEntryKind {
        match self {
            Self::SourceVar(_) => ScopeEntryKind::SourceVar,
            Self::FreeVar(_) => ScopeEntryKind::FreeVar,
            Self::ProjectionItemDefinition(_) => ScopeEntryKind::ProjectionItemDefinition,
            Self::GroupKeyDefinition(_) => ScopeEntryKind::GroupKeyDefinition,
            Self::InvalidGroupInputRef => ScopeEntryKind::InvalidGroupInputRef,
        }
    }

    /// The expression a reference to this entry denotes outside of any
    /// aggregate. For group keys this is the direct form.
    pub fn resolve(
        &self,
        reference_name: &str,
        ctx: &ErrorContext,
        strings: &dyn StringTable,
    ) -> Result<DbExpr> {
        match self {
            Self::SourceVar(var) => Ok(var.expr.clone()),
            Self::FreeVar(expr) | Self::ProjectionItemDefinition(expr) => Ok(expr.clone()),
            Self::GroupKeyDefinition(key) => Ok(key.direct.clone()),
            Self::InvalidGroupInputRef => Err(ctx.error(
                strings,
                ESQL0101,
                keys::INVALID_GROUP_IDENTIFIER_REFERENCE,
                &[reference_name],
            )),
        }
    }

    pub fn as_group_key(&self) -> Option<&GroupKeyDefinition> {
        match self {
            Self::GroupKeyDefinition(key) => Some(key),
            _ => None,
        }
    }

    pub fn alternative_name(&self) -> Option<&AlternativeName> {
        match self {
            Self::SourceVar(var) => var.alternative_name.as_ref(),
            Self::GroupKeyDefinition(key) => key.alternative_name.as_ref(),
            _ => None,
        }
    }
}

/// One level of name bindings
#[derive(Debug, Clone)]
pub struct Scope {
    comparer: NameComparer,
    /// Keyed by the comparer's normalized name; values keep the name as written
    entries: IndexMap<String, (String, ScopeEntry)>,
}

impl Scope {
    pub fn new(comparer: NameComparer) -> Self {
        Self {
            comparer,
            entries: IndexMap::new(),
        }
    }

    /// Bind `name`; binding a name twice in one scope is an internal error
    pub fn add(&mut self, name: impl Into<String>, entry: ScopeEntry) -> Result<()> {
        let name = name.into();
        let key = self.comparer.key(&name).into_owned();
        if self.entries.contains_key(&key) {
            return Err(EsqlError::internal(
                ESQL0401,
                format!("'{}' is already bound in the current scope", name),
            ));
        }
        self.entries.insert(key, (name, entry));
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<ScopeEntry> {
        self.entries
            .shift_remove(self.comparer.key(name).as_ref())
            .map(|(_, entry)| entry)
            .ok_or_else(|| not_bound(name))
    }

    /// Swap the entry bound to `name`, returning the previous one
    pub fn replace(&mut self, name: &str, entry: ScopeEntry) -> Result<ScopeEntry> {
        let slot = self
            .entries
            .get_mut(self.comparer.key(name).as_ref())
            .ok_or_else(|| not_bound(name))?;
        Ok(std::mem::replace(&mut slot.1, entry))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(self.comparer.key(name).as_ref())
    }

    pub fn try_lookup(&self, name: &str) -> Option<&ScopeEntry> {
        self.entries
            .get(self.comparer.key(name).as_ref())
            .map(|(_, entry)| entry)
    }

    /// Entries in binding order, with names as written
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScopeEntry)> {
        self.entries.values().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn not_bound(name: &str) -> EsqlError {
    EsqlError::internal(ESQL0404, format!("'{}' is not bound in the current scope", name))
}

/// Index of the current scope at some point in time; rolling back to it
/// discards every scope entered since
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Savepoint(usize);

impl Savepoint {
    pub fn scope_index(self) -> usize {
        self.0
    }
}

/// Stack of scopes
#[derive(Debug, Clone)]
pub struct ScopeManager {
    comparer: NameComparer,
    scopes: Vec<Scope>,
}

impl ScopeManager {
    /// An empty stack; the first entered scope becomes the root
    pub fn new(comparer: NameComparer) -> Self {
        Self {
            comparer,
            scopes: Vec::new(),
        }
    }

    pub fn comparer(&self) -> NameComparer {
        self.comparer
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(Scope::new(self.comparer));
        trace!("entered scope {}", self.scopes.len() - 1);
    }

    pub fn leave_scope(&mut self) -> Result<Scope> {
        let scope = self
            .scopes
            .pop()
            .ok_or_else(|| EsqlError::internal(ESQL0407, "leave_scope on an empty scope stack"))?;
        trace!("left scope {}", self.scopes.len());
        Ok(scope)
    }

    /// Index of the top scope, `None` while the stack is empty
    pub fn current_scope_index(&self) -> Option<usize> {
        self.scopes.len().checked_sub(1)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn current_scope(&self) -> Result<&Scope> {
        self.scopes.last().ok_or_else(empty_stack)
    }

    pub fn current_scope_mut(&mut self) -> Result<&mut Scope> {
        self.scopes.last_mut().ok_or_else(empty_stack)
    }

    pub fn scope_at(&self, index: usize) -> Result<&Scope> {
        self.scopes.get(index).ok_or_else(|| {
            EsqlError::internal(
                ESQL0402,
                format!("scope index {} is out of range (depth {})", index, self.scopes.len()),
            )
        })
    }

    pub fn savepoint(&self) -> Result<Savepoint> {
        self.current_scope_index()
            .map(Savepoint)
            .ok_or_else(|| EsqlError::internal(ESQL0403, "savepoint on an empty scope stack"))
    }

    /// Discard every scope above `savepoint`
    pub fn rollback(&mut self, savepoint: Savepoint) -> Result<()> {
        if savepoint.0 >= self.scopes.len() {
            return Err(EsqlError::internal(
                ESQL0403,
                format!(
                    "savepoint {} is above the current scope index {:?}",
                    savepoint.0,
                    self.current_scope_index()
                ),
            ));
        }
        self.scopes.truncate(savepoint.0 + 1);
        trace!("rolled back to scope {}", savepoint.0);
        Ok(())
    }

    /// Keep only the scopes below `len`
    pub(crate) fn truncate(&mut self, len: usize) {
        self.scopes.truncate(len);
    }

    pub fn is_bound_in_current_scope(&self, name: &str) -> bool {
        self.scopes.last().is_some_and(|scope| scope.contains(name))
    }

    /// Find `name`, searching from the current scope down to the root.
    ///
    /// Returns the index of the scope that binds it.
    pub fn lookup(&self, name: &str) -> Option<(usize, &ScopeEntry)> {
        self.scopes
            .iter()
            .enumerate()
            .rev()
            .find_map(|(index, scope)| scope.try_lookup(name).map(|entry| (index, entry)))
    }

    /// Execute a closure with a temporary scope
    pub fn with_scope<F, R>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Self) -> Result<R>,
    {
        self.enter_scope();
        let result = f(self);
        self.leave_scope()?;
        result
    }
}

fn empty_stack() -> EsqlError {
    EsqlError::internal(ESQL0407, "the scope stack is empty")
}
