//! Memoized projections of one dependency graph.
//!
//! Projection under a tight search budget has a failure mode: lazily
//! materializing a projection the first time a spec asks for it burns the
//! budget on graph construction instead of searching. [`ProjectionCache::warm`]
//! exists so the driver can materialize every relation set the spec table
//! mentions before it starts the clock.

use hashbrown::HashMap;

use super::DepGraph;
use crate::rels::RelSet;

/// Caches `base.project(rels)` per relation set.
///
/// One cache belongs to one search task; it is never shared across threads.
#[derive(Debug)]
pub struct ProjectionCache {
    base: DepGraph,
    memo: HashMap<RelSet, DepGraph>,
}

impl ProjectionCache {
    #[must_use]
    pub fn new(base: DepGraph) -> Self {
        Self {
            base,
            memo: HashMap::new(),
        }
    }

    /// The unprojected graph this cache projects.
    #[must_use]
    pub fn base(&self) -> &DepGraph {
        &self.base
    }

    /// Eagerly materializes the projections for every given relation set.
    pub fn warm<I>(&mut self, rel_sets: I)
    where
        I: IntoIterator<Item = RelSet>,
    {
        for rels in rel_sets {
            self.ensure(rels);
        }
        tracing::trace!(
            projections = self.memo.len(),
            vertices = self.base.vertex_count(),
            "projection cache warmed"
        );
    }

    fn ensure(&mut self, rels: RelSet) {
        if !self.memo.contains_key(&rels) {
            self.memo.insert(rels, self.base.project(rels));
        }
    }

    /// The projection onto `rels`, computing and memoizing it if missed.
    pub fn get(&mut self, rels: RelSet) -> &DepGraph {
        self.ensure(rels);
        &self.memo[&rels]
    }

    /// Two projections at once, for searches that walk a first-edge graph
    /// and a rest-of-cycle graph.
    pub fn get_pair(&mut self, first: RelSet, rest: RelSet) -> (&DepGraph, &DepGraph) {
        self.ensure(first);
        self.ensure(rest);
        (&self.memo[&first], &self.memo[&rest])
    }
}
