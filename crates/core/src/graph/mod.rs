//! The multi-relational dependency graph.
//!
//! Vertices are [`TxnId`]s; every edge carries a [`RelSet`] label. An edge
//! inserted twice merges its labels, so a pair of transactions related by
//! both ww and realtime order is one edge labeled `{ww, realtime}`.
//!
//! The searches never walk this graph directly; they walk *projections* of
//! it (edges whose label is a subset of a requested relation set), which
//! [`projection::ProjectionCache`] memoizes.

use hashbrown::{HashMap, HashSet};

use crate::history::TxnId;
use crate::rels::RelSet;

pub mod projection;

/// Directed graph over transactions with relation-set edge labels.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct DepGraph {
    adj: HashMap<TxnId, HashMap<TxnId, RelSet>>,
}

impl DepGraph {
    /// Adds a vertex with no outgoing edges (if not already present).
    pub fn add_vertex(&mut self, v: TxnId) {
        self.adj.entry(v).or_default();
    }

    /// Inserts an edge, merging `label` into any existing label.
    ///
    /// Both endpoints are added to the graph if not already present.
    ///
    /// # Panics
    ///
    /// An empty label is a configuration error: every dependency edge must
    /// assert at least one relation.
    pub fn add_edge(&mut self, source: TxnId, target: TxnId, label: RelSet) {
        assert!(!label.is_empty(), "edge {source} -> {target} has no relations");
        let entry = self.adj.entry(source).or_default().entry(target).or_default();
        *entry = entry.union(label);
        self.adj.entry(target).or_default();
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.adj.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.adj.values().map(HashMap::len).sum()
    }

    /// `true` if the graph has no vertices at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adj.is_empty()
    }

    pub fn vertices(&self) -> impl Iterator<Item = TxnId> + '_ {
        self.adj.keys().copied()
    }

    /// Vertices in ascending id order. The searches iterate this way so a
    /// given graph always yields the same witness.
    #[must_use]
    pub fn sorted_vertices(&self) -> Vec<TxnId> {
        let mut vs: Vec<TxnId> = self.vertices().collect();
        vs.sort_unstable();
        vs
    }

    #[must_use]
    pub fn contains_vertex(&self, v: TxnId) -> bool {
        self.adj.contains_key(&v)
    }

    /// The label of the edge `source -> target`, if present.
    #[must_use]
    pub fn label(&self, source: TxnId, target: TxnId) -> Option<RelSet> {
        self.adj.get(&source)?.get(&target).copied()
    }

    pub fn successors(&self, v: TxnId) -> impl Iterator<Item = (TxnId, RelSet)> + '_ {
        self.adj
            .get(&v)
            .into_iter()
            .flat_map(|targets| targets.iter().map(|(t, l)| (*t, *l)))
    }

    /// Successors in ascending id order, for deterministic walks.
    #[must_use]
    pub fn sorted_successors(&self, v: TxnId) -> Vec<(TxnId, RelSet)> {
        let mut out: Vec<(TxnId, RelSet)> = self.successors(v).collect();
        out.sort_unstable_by_key(|(t, _)| *t);
        out
    }

    /// Projects onto the edges whose label is a subset of `rels`.
    ///
    /// The vertex set is preserved; only edges are filtered. The subset
    /// test is tight: an edge labeled `{ww, realtime}` is *not* in the
    /// projection onto `{ww}`.
    #[must_use]
    pub fn project(&self, rels: RelSet) -> Self {
        let adj = self
            .adj
            .iter()
            .map(|(v, targets)| {
                let kept = targets
                    .iter()
                    .filter(|(_, label)| label.is_subset_of(rels))
                    .map(|(t, l)| (*t, *l))
                    .collect();
                (*v, kept)
            })
            .collect();
        Self { adj }
    }

    /// The subgraph induced by `keep`: those vertices, and every edge with
    /// both endpoints among them.
    #[must_use]
    pub fn induced(&self, keep: &HashSet<TxnId>) -> Self {
        let adj = self
            .adj
            .iter()
            .filter(|(v, _)| keep.contains(*v))
            .map(|(v, targets)| {
                let kept = targets
                    .iter()
                    .filter(|(t, _)| keep.contains(*t))
                    .map(|(t, l)| (*t, *l))
                    .collect();
                (*v, kept)
            })
            .collect();
        Self { adj }
    }

    /// Strongly connected components, via iterative Tarjan.
    ///
    /// Deterministic: roots are taken in ascending vertex order and
    /// successors expanded in ascending order. Each component is sorted
    /// ascending and the component list is sorted by minimum vertex.
    /// Singleton components are included.
    #[must_use]
    pub fn sccs(&self) -> Vec<Vec<TxnId>> {
        struct Frame {
            v: TxnId,
            succs: Vec<TxnId>,
            next: usize,
        }

        let mut index: HashMap<TxnId, usize> = HashMap::new();
        let mut low: HashMap<TxnId, usize> = HashMap::new();
        let mut on_stack: HashSet<TxnId> = HashSet::new();
        let mut stack: Vec<TxnId> = Vec::new();
        let mut next_index = 0usize;
        let mut components: Vec<Vec<TxnId>> = Vec::new();

        for root in self.sorted_vertices() {
            if index.contains_key(&root) {
                continue;
            }

            let mut frames = Vec::new();
            let open = |v: TxnId,
                        index: &mut HashMap<TxnId, usize>,
                        low: &mut HashMap<TxnId, usize>,
                        next_index: &mut usize,
                        stack: &mut Vec<TxnId>,
                        on_stack: &mut HashSet<TxnId>| {
                index.insert(v, *next_index);
                low.insert(v, *next_index);
                *next_index += 1;
                stack.push(v);
                on_stack.insert(v);
                let mut succs: Vec<TxnId> = Vec::new();
                succs.extend(
                    self.adj
                        .get(&v)
                        .into_iter()
                        .flat_map(|targets| targets.keys().copied()),
                );
                succs.sort_unstable();
                Frame { v, succs, next: 0 }
            };

            frames.push(open(
                root,
                &mut index,
                &mut low,
                &mut next_index,
                &mut stack,
                &mut on_stack,
            ));

            while let Some(frame) = frames.last_mut() {
                if frame.next < frame.succs.len() {
                    let w = frame.succs[frame.next];
                    frame.next += 1;
                    let v = frame.v;
                    if index.contains_key(&w) {
                        if on_stack.contains(&w) {
                            let lw = index[&w];
                            let lv = low.get_mut(&v).expect("visited vertex has a lowlink");
                            *lv = (*lv).min(lw);
                        }
                    } else {
                        let child = open(
                            w,
                            &mut index,
                            &mut low,
                            &mut next_index,
                            &mut stack,
                            &mut on_stack,
                        );
                        frames.push(child);
                    }
                } else {
                    let v = frame.v;
                    frames.pop();
                    if let Some(parent) = frames.last() {
                        let lv = low[&v];
                        let lp = low.get_mut(&parent.v).expect("parent has a lowlink");
                        *lp = (*lp).min(lv);
                    }
                    if low[&v] == index[&v] {
                        let mut component = Vec::new();
                        loop {
                            let w = stack.pop().expect("tarjan stack holds the component");
                            on_stack.remove(&w);
                            component.push(w);
                            if w == v {
                                break;
                            }
                        }
                        component.sort_unstable();
                        components.push(component);
                    }
                }
            }
        }

        components.sort_unstable_by_key(|c| c[0]);
        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rels::Rel;

    fn t(id: u64) -> TxnId {
        TxnId(id)
    }

    #[test]
    fn add_edge_merges_labels() {
        let mut g = DepGraph::default();
        g.add_edge(t(1), t(2), RelSet::WW);
        g.add_edge(t(1), t(2), RelSet::REALTIME);
        assert_eq!(g.label(t(1), t(2)), Some(RelSet::WW.union(RelSet::REALTIME)));
        assert_eq!(g.edge_count(), 1);
        assert!(g.contains_vertex(t(2)));
    }

    #[test]
    #[should_panic(expected = "has no relations")]
    fn empty_label_rejected() {
        let mut g = DepGraph::default();
        g.add_edge(t(1), t(2), RelSet::EMPTY);
    }

    #[test]
    fn projection_is_tight() {
        let mut g = DepGraph::default();
        g.add_edge(t(1), t(2), RelSet::WW);
        g.add_edge(t(2), t(3), RelSet::WW.union(RelSet::REALTIME));
        g.add_edge(t(3), t(1), RelSet::WR);

        let ww = g.project(RelSet::WW);
        assert_eq!(ww.label(t(1), t(2)), Some(RelSet::WW));
        assert_eq!(ww.label(t(2), t(3)), None);
        assert_eq!(ww.label(t(3), t(1)), None);
        // vertex set is preserved
        assert_eq!(ww.vertex_count(), 3);

        let wide = g.project(RelSet::of(&[Rel::Ww, Rel::Realtime]));
        assert_eq!(
            wide.label(t(2), t(3)),
            Some(RelSet::WW.union(RelSet::REALTIME))
        );
    }

    #[test]
    fn projection_keeps_exactly_subset_edges() {
        let mut g = DepGraph::default();
        g.add_edge(t(0), t(1), RelSet::WW);
        g.add_edge(t(1), t(2), RelSet::WR);
        g.add_edge(t(2), t(0), RelSet::RW.union(RelSet::PROCESS));
        g.add_edge(t(2), t(3), RelSet::PROCESS);

        for rels in [
            RelSet::WW,
            RelSet::of(&[Rel::Ww, Rel::Wr]),
            RelSet::of(&[Rel::Rw, Rel::Process]),
            RelSet::ALL,
        ] {
            let proj = g.project(rels);
            for v in g.vertices() {
                for (w, label) in g.successors(v) {
                    assert_eq!(
                        proj.label(v, w).is_some(),
                        label.is_subset_of(rels),
                        "edge {v}->{w} {label:?} vs projection {rels:?}"
                    );
                }
                for (w, label) in proj.successors(v) {
                    assert!(label.is_subset_of(rels), "stray edge {v}->{w} in {rels:?}");
                }
            }
        }
    }

    #[test]
    fn induced_subgraph() {
        let mut g = DepGraph::default();
        g.add_edge(t(1), t(2), RelSet::WW);
        g.add_edge(t(2), t(3), RelSet::WW);
        g.add_edge(t(3), t(1), RelSet::WW);

        let keep: HashSet<TxnId> = [t(1), t(2)].into_iter().collect();
        let sub = g.induced(&keep);
        assert_eq!(sub.vertex_count(), 2);
        assert_eq!(sub.label(t(1), t(2)), Some(RelSet::WW));
        assert_eq!(sub.label(t(2), t(3)), None);
    }

    #[test]
    fn sccs_of_two_cycles_and_a_bridge() {
        let mut g = DepGraph::default();
        // cycle {1,2}, bridge 2->3, cycle {3,4}
        g.add_edge(t(1), t(2), RelSet::WW);
        g.add_edge(t(2), t(1), RelSet::WW);
        g.add_edge(t(2), t(3), RelSet::WR);
        g.add_edge(t(3), t(4), RelSet::WW);
        g.add_edge(t(4), t(3), RelSet::WW);

        let sccs = g.sccs();
        assert_eq!(sccs, vec![vec![t(1), t(2)], vec![t(3), t(4)]]);
    }

    #[test]
    fn sccs_singletons_are_reported() {
        let mut g = DepGraph::default();
        g.add_edge(t(1), t(2), RelSet::WW);
        g.add_edge(t(2), t(3), RelSet::WW);

        let sccs = g.sccs();
        assert_eq!(sccs, vec![vec![t(1)], vec![t(2)], vec![t(3)]]);
    }

    #[test]
    fn sccs_long_chain_does_not_overflow() {
        let mut g = DepGraph::default();
        for i in 0..10_000 {
            g.add_edge(t(i), t(i + 1), RelSet::WW);
        }
        g.add_edge(t(10_000), t(0), RelSet::WW);
        let sccs = g.sccs();
        assert_eq!(sccs.len(), 1);
        assert_eq!(sccs[0].len(), 10_001);
    }
}
