//! Aggregate contexts
//!
//! While the argument of an aggregate is resolved, a [`PendingAggregate`]
//! sits on the resolver's aggregate chain. It records which scope regions
//! the argument references. Attaching a name and a result consumes the
//! pending context and produces an [`AttachedAggregate`], so an aggregate
//! can be attached at most once and its result cannot be read before that.
//!
//! ```compile_fail
//! # use esql_semantic::*;
//! # use esql_diagnostics::ErrorContext;
//! let pending = PendingAggregate::new(AggregateOrigin::GroupKey, ErrorContext::detached(), None, RegionId::ROOT);
//! let int = TypeUsage::primitive("Edm.Int32");
//! let first = pending.attach("k", AggregateAttachment::ResultType(int.clone()));
//! let second = pending.attach("k", AggregateAttachment::ResultType(int));
//! ```

use std::fmt;

use esql_ast::{GroupPartitionExpr, MethodExpr};
use esql_diagnostics::{ESQL0110, ESQL0111, ESQL0408, ErrorContext, EsqlError, Result, StringTable, keys};

use crate::{DbExpr, GroupKeyDefinition, RegionId, TypeUsage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateKind {
    /// Aggregate function over a group, e.g. `max(x)`
    Function,
    /// `GROUPPARTITION(x)`
    Partition,
    /// Definition of a GROUP BY key
    GroupKey,
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function => write!(f, "function aggregate"),
            Self::Partition => write!(f, "group partition"),
            Self::GroupKey => write!(f, "group key"),
        }
    }
}

/// The syntax node an aggregate context was created for
#[derive(Debug, Clone)]
pub enum AggregateOrigin {
    Function(MethodExpr),
    Partition(GroupPartitionExpr),
    GroupKey,
}

impl AggregateOrigin {
    pub fn kind(&self) -> AggregateKind {
        match self {
            Self::Function(_) => AggregateKind::Function,
            Self::Partition(_) => AggregateKind::Partition,
            Self::GroupKey => AggregateKind::GroupKey,
        }
    }

    /// Name used in diagnostics
    pub fn display_name(&self) -> String {
        match self {
            Self::Function(method) => method.display_name(),
            Self::Partition(_) => "GROUPPARTITION".to_string(),
            Self::GroupKey => "group key".to_string(),
        }
    }
}

/// What an aggregate contributes to the group once it has been resolved
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateAttachment {
    /// Function aggregates are computed by the group operation; only their
    /// type is known here
    ResultType(TypeUsage),
    /// Group partitions and keys carry their full definition
    Definition(DbExpr),
}

impl AggregateAttachment {
    pub fn result_type(&self) -> Option<&TypeUsage> {
        match self {
            Self::ResultType(ty) => Some(ty),
            Self::Definition(expr) => expr.result_type(),
        }
    }
}

/// Nested aggregate already attached inside a pending one
#[derive(Debug, Clone, PartialEq, Eq)]
struct ContainedAggregate {
    display_name: String,
    evaluating_region: RegionId,
}

/// An aggregate whose argument is still being resolved
#[derive(Debug, Clone)]
pub struct PendingAggregate {
    origin: AggregateOrigin,
    ctx: ErrorContext,
    containing: Option<usize>,
    defining_region: RegionId,
    innermost_referenced_region: Option<RegionId>,
    contained: Vec<ContainedAggregate>,
}

impl PendingAggregate {
    /// `containing` is the position of the enclosing context on the aggregate chain
    pub fn new(
        origin: AggregateOrigin,
        ctx: ErrorContext,
        containing: Option<usize>,
        defining_region: RegionId,
    ) -> Self {
        Self {
            origin,
            ctx,
            containing,
            defining_region,
            innermost_referenced_region: None,
            contained: Vec::new(),
        }
    }

    pub fn kind(&self) -> AggregateKind {
        self.origin.kind()
    }

    pub fn origin(&self) -> &AggregateOrigin {
        &self.origin
    }

    pub fn ctx(&self) -> &ErrorContext {
        &self.ctx
    }

    pub fn containing(&self) -> Option<usize> {
        self.containing
    }

    /// Region that was current when the aggregate was entered
    pub fn defining_region(&self) -> RegionId {
        self.defining_region
    }

    pub fn innermost_referenced_region(&self) -> Option<RegionId> {
        self.innermost_referenced_region
    }

    /// Note a reference to a name bound in `region`
    pub fn record_reference(&mut self, region: RegionId) {
        self.innermost_referenced_region = Some(match self.innermost_referenced_region {
            Some(current) => current.max(region),
            None => region,
        });
    }

    /// Region the aggregate is evaluated in, as far as is known so far
    pub fn evaluating_region(&self) -> RegionId {
        self.innermost_referenced_region.unwrap_or(self.defining_region)
    }

    pub(crate) fn record_contained(&mut self, inner: &AttachedAggregate) {
        self.contained.push(ContainedAggregate {
            display_name: inner.origin.display_name(),
            evaluating_region: inner.evaluating_region,
        });
    }

    /// Complete the aggregate. Fails if `name` is empty or the definition
    /// is an untyped null.
    pub fn attach(self, name: impl Into<String>, attachment: AggregateAttachment) -> Result<AttachedAggregate> {
        let name = name.into();
        if name.is_empty() {
            return Err(EsqlError::internal(ESQL0408, "aggregate attached without a name"));
        }
        if let AggregateAttachment::Definition(definition) = &attachment {
            if definition.is_untyped_null() {
                return Err(EsqlError::internal(
                    ESQL0408,
                    format!("aggregate '{}' attached with an untyped null definition", name),
                ));
            }
        }
        let evaluating_region = self.evaluating_region();
        Ok(AttachedAggregate {
            origin: self.origin,
            ctx: self.ctx,
            defining_region: self.defining_region,
            evaluating_region,
            contained: self.contained,
            name,
            attachment,
        })
    }
}

/// A fully resolved aggregate
#[derive(Debug, Clone)]
pub struct AttachedAggregate {
    origin: AggregateOrigin,
    ctx: ErrorContext,
    defining_region: RegionId,
    evaluating_region: RegionId,
    contained: Vec<ContainedAggregate>,
    name: String,
    attachment: AggregateAttachment,
}

impl AttachedAggregate {
    pub fn kind(&self) -> AggregateKind {
        self.origin.kind()
    }

    pub fn origin(&self) -> &AggregateOrigin {
        &self.origin
    }

    pub fn ctx(&self) -> &ErrorContext {
        &self.ctx
    }

    /// Internal name the aggregate is registered under
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attachment(&self) -> &AggregateAttachment {
        &self.attachment
    }

    pub fn defining_region(&self) -> RegionId {
        self.defining_region
    }

    pub fn evaluating_region(&self) -> RegionId {
        self.evaluating_region
    }

    /// Check that the aggregate can be evaluated where it ended up.
    ///
    /// `evaluating_region_aggregating` tells whether GROUP BY has been
    /// applied to the evaluating region; `group_by_active` whether the
    /// compilation mode lets GROUP BY take part at all.
    pub fn validate(
        &self,
        evaluating_region_aggregating: bool,
        group_by_active: bool,
        strings: &dyn StringTable,
    ) -> Result<()> {
        if self.kind() == AggregateKind::GroupKey {
            return Ok(());
        }
        if group_by_active && !evaluating_region_aggregating {
            return Err(self.ctx.error(
                strings,
                ESQL0110,
                keys::AGGREGATE_OUTSIDE_GROUP,
                &[&self.origin.display_name()],
            ));
        }
        if let Some(nested) = self
            .contained
            .iter()
            .find(|inner| inner.evaluating_region == self.evaluating_region)
        {
            return Err(self.ctx.error(
                strings,
                ESQL0111,
                keys::NESTED_AGGREGATE,
                &[&nested.display_name, &self.origin.display_name()],
            ));
        }
        Ok(())
    }
}

/// Pick the form of a group key referenced from inside the aggregate chain.
///
/// Walks the chain from the innermost context outwards; the first context
/// defined in `entry_region` decides. Function aggregates see the key
/// through the group variable, group partitions through the group
/// aggregate; group key definitions and references outside any matching
/// context see the key directly.
pub fn select_group_key_form<'k>(
    chain: &[PendingAggregate],
    entry_region: RegionId,
    key: &'k GroupKeyDefinition,
) -> (&'k DbExpr, Option<AggregateKind>) {
    let matching = chain
        .iter()
        .rev()
        .find(|context| context.defining_region == entry_region)
        .map(PendingAggregate::kind);
    let form = match matching {
        Some(AggregateKind::Function) => &key.group_var_based,
        Some(AggregateKind::Partition) => &key.group_agg_based,
        Some(AggregateKind::GroupKey) | None => &key.direct,
    };
    (form, matching)
}
