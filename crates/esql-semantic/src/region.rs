//! Scope regions
//!
//! A region groups the scopes of one query expression (FROM, WHERE, GROUP
//! BY, ...). Aggregates are evaluated against regions, not scopes.

use std::fmt;

use crate::{AttachedAggregate, NameComparer};

/// Position of a region on the region stack. Outer regions have smaller ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionId(pub(crate) usize);

impl RegionId {
    pub const ROOT: RegionId = RegionId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region {}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ScopeRegion {
    id: RegionId,
    first_scope_index: usize,
    is_aggregating: bool,
    was_resolution_correlated: bool,
    aggregates: Vec<AttachedAggregate>,
}

impl ScopeRegion {
    pub(crate) fn new(id: RegionId, first_scope_index: usize) -> Self {
        Self {
            id,
            first_scope_index,
            is_aggregating: false,
            was_resolution_correlated: false,
            aggregates: Vec::new(),
        }
    }

    pub fn id(&self) -> RegionId {
        self.id
    }

    pub fn first_scope_index(&self) -> usize {
        self.first_scope_index
    }

    /// Whether `scope_index` was entered while this region was active
    pub fn contains_scope(&self, scope_index: usize) -> bool {
        scope_index >= self.first_scope_index
    }

    /// Set once GROUP BY has been applied to the region's input
    pub fn is_aggregating(&self) -> bool {
        self.is_aggregating
    }

    pub(crate) fn set_aggregating(&mut self, aggregating: bool) {
        self.is_aggregating = aggregating;
    }

    /// Whether a name bound in this region was referenced from an inner region
    pub fn was_resolution_correlated(&self) -> bool {
        self.was_resolution_correlated
    }

    pub(crate) fn mark_correlated(&mut self) {
        self.was_resolution_correlated = true;
    }

    /// Aggregates evaluated over this region's group
    pub fn aggregates(&self) -> &[AttachedAggregate] {
        &self.aggregates
    }

    pub(crate) fn register_aggregate(&mut self, aggregate: AttachedAggregate) {
        self.aggregates.push(aggregate);
    }

    pub(crate) fn truncate_aggregates(&mut self, len: usize) {
        self.aggregates.truncate(len);
    }

    /// Aggregate registered under the internal name `name`
    pub fn find_aggregate(&self, name: &str, comparer: NameComparer) -> Option<&AttachedAggregate> {
        self.aggregates
            .iter()
            .find(|aggregate| comparer.equals(aggregate.name(), name))
    }
}
