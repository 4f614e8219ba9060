//! Bounded cycle searches over projected dependency graphs.
//!
//! Three entry points, in increasing generality:
//!
//! - [`find_cycle`]: any cycle in the graph.
//! - [`find_cycle_starting_with`]: a cycle whose first edge comes from one
//!   graph and whose remaining edges come from another.
//! - [`find_cycle_with`]: a cycle accepted by a per-step [`Transition`]
//!   and a conjunction of whole-path [`CyclePred`]s.
//!
//! Every search returns at most one *simple* cycle (no repeated interior
//! vertex, at least two vertices) and is deterministic: vertices and
//! successors are visited in ascending id order, so a given graph always
//! yields the same witness.
//!
//! The first two searches are SCC-guided BFS and finish in O(V·E). The
//! general search explores simple paths under its constraints, which has
//! no polynomial bound; it polls a cooperative [`SearchBudget`] at every
//! step and unwinds with [`Interrupted`] the moment the deadline passes,
//! so the caller's wall-clock budget is the governing bound.

use std::collections::VecDeque;
use std::fmt::{self, Display, Formatter};
use std::time::Instant;

use hashbrown::{HashMap, HashSet};

use crate::graph::DepGraph;
use crate::history::TxnId;
use crate::rels::RelSet;

/// A simple cycle: `vertices[i] -> vertices[i+1]` for each consecutive
/// pair, plus the closing edge from the last vertex back to the first.
/// `labels[i]` is the label of the edge leaving `vertices[i]`.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    pub vertices: Vec<TxnId>,
    pub labels: Vec<RelSet>,
}

impl Cycle {
    /// Builds a cycle from a closed vertex walk, reading each edge label
    /// (including the wrap-around edge) out of `g`.
    ///
    /// # Panics
    ///
    /// If some consecutive pair is not an edge of `g`.
    #[must_use]
    pub fn from_vertices(g: &DepGraph, vertices: Vec<TxnId>) -> Self {
        let labels = (0..vertices.len())
            .map(|i| {
                let a = vertices[i];
                let b = vertices[(i + 1) % vertices.len()];
                g.label(a, b)
                    .unwrap_or_else(|| panic!("cycle step {a} -> {b} is not an edge"))
            })
            .collect();
        Self { vertices, labels }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Steps `(from, label, to)` around the cycle, wrap included.
    pub fn steps(&self) -> impl Iterator<Item = (TxnId, RelSet, TxnId)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.labels[i], self.vertices[(i + 1) % n]))
    }
}

impl Display for Cycle {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for (from, label, _) in self.steps() {
            write!(f, "{from} -{label}-> ")?;
        }
        write!(f, "{}", self.vertices[0])
    }
}

/// The path context a whole-path predicate inspects: the labels of the
/// edges traversed so far, in order (closing edge included by the time
/// predicates run).
#[derive(Debug, Clone, Copy)]
pub struct PathState<'a> {
    labels: &'a [RelSet],
}

impl<'a> PathState<'a> {
    #[must_use]
    pub const fn new(labels: &'a [RelSet]) -> Self {
        Self { labels }
    }

    #[must_use]
    pub const fn labels(&self) -> &'a [RelSet] {
        self.labels
    }
}

/// Per-step admission rule for [`find_cycle_with`], interpreted against a
/// one-bit [`TransitionState`] threaded along the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Accept every edge.
    Trivial,
    /// The first edge must lie in the set; no later edge may.
    FirstOnly(RelSet),
    /// Edges in the set must never be adjacent. The initial state counts
    /// as "previous edge was in the set", which also keeps the closing
    /// wrap from pairing two set edges: an accepted cycle never starts
    /// with one.
    Nonadjacent(RelSet),
}

/// State threaded through [`Transition::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionState(bool);

impl Transition {
    #[must_use]
    pub const fn initial(&self) -> TransitionState {
        match self {
            Self::Trivial => TransitionState(false),
            Self::FirstOnly(_) | Self::Nonadjacent(_) => TransitionState(true),
        }
    }

    /// Admits or rejects traversing an edge labeled `label`, yielding the
    /// state for the rest of the path.
    #[must_use]
    pub fn step(&self, state: TransitionState, label: RelSet) -> Option<TransitionState> {
        match self {
            Self::Trivial => Some(state),
            Self::FirstOnly(rels) => {
                let in_rels = label.is_subset_of(*rels);
                match (state.0, in_rels) {
                    // first edge pending: it must be in the set
                    (true, true) => Some(TransitionState(false)),
                    (true, false) => None,
                    // afterwards: no further set edges
                    (false, true) => None,
                    (false, false) => Some(state),
                }
            }
            Self::Nonadjacent(rels) => {
                if label.is_subset_of(*rels) {
                    if state.0 {
                        None
                    } else {
                        Some(TransitionState(true))
                    }
                } else {
                    Some(TransitionState(false))
                }
            }
        }
    }
}

/// Whole-path predicate, evaluated once a candidate cycle is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CyclePred {
    /// At least two edges of the cycle lie in the set.
    Multiple(RelSet),
    /// At least one edge of the cycle lies in the set.
    Required(RelSet),
}

impl CyclePred {
    #[must_use]
    pub fn eval(&self, path: PathState) -> bool {
        match self {
            Self::Multiple(rels) => {
                path.labels()
                    .iter()
                    .filter(|label| label.is_subset_of(*rels))
                    .count()
                    >= 2
            }
            Self::Required(rels) => path
                .labels()
                .iter()
                .any(|label| label.is_subset_of(*rels)),
        }
    }
}

/// Short-circuit conjunction of predicates.
#[must_use]
pub fn eval_all(preds: &[CyclePred], path: PathState) -> bool {
    preds.iter().all(|pred| pred.eval(path))
}

/// Cooperative wall-clock budget, polled by every search step.
#[derive(Debug, Clone, Copy)]
pub struct SearchBudget {
    deadline: Option<Instant>,
}

impl SearchBudget {
    pub const UNLIMITED: Self = Self { deadline: None };

    #[must_use]
    pub const fn until(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    #[must_use]
    pub fn expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// The budget ran out mid-search; whatever was in flight is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

/// Finds any simple cycle in `g`, or `None` if `g` is acyclic.
///
/// Guided by the SCC decomposition: only a component of at least two
/// vertices can hold a cycle, and a shortest witness inside the first such
/// component is found by BFS from its minimum vertex.
///
/// # Errors
///
/// [`Interrupted`] if the budget expires first.
pub fn find_cycle(g: &DepGraph, budget: SearchBudget) -> Result<Option<Cycle>, Interrupted> {
    for scc in g.sccs() {
        if scc.len() < 2 {
            continue;
        }
        if let Some(cycle) = bfs_close(g, scc[0], budget)? {
            return Ok(Some(cycle));
        }
    }
    Ok(None)
}

/// Finds a cycle whose first edge is an edge of `first` and whose
/// remaining edges are edges of `rest`.
///
/// For every `first` edge `a -> b` (in ascending order), BFS through
/// `rest` looks for a path from `b` back to `a`.
///
/// # Errors
///
/// [`Interrupted`] if the budget expires first.
pub fn find_cycle_starting_with(
    first: &DepGraph,
    rest: &DepGraph,
    budget: SearchBudget,
) -> Result<Option<Cycle>, Interrupted> {
    for a in first.sorted_vertices() {
        for (b, first_label) in first.sorted_successors(a) {
            if b == a {
                continue;
            }
            if budget.expired() {
                return Err(Interrupted);
            }
            if let Some(path) = bfs_path(rest, b, a, budget)? {
                // path runs b, ..., a; the cycle starts at a
                let mut vertices = Vec::with_capacity(path.len());
                vertices.push(a);
                vertices.extend(&path[..path.len() - 1]);

                let mut labels = Vec::with_capacity(path.len());
                labels.push(first_label);
                for pair in path.windows(2) {
                    labels.push(
                        rest.label(pair[0], pair[1])
                            .expect("bfs path follows rest edges"),
                    );
                }
                return Ok(Some(Cycle { vertices, labels }));
            }
        }
    }
    Ok(None)
}

/// The general search: finds a simple cycle every step of which is
/// admitted by `transition` and which, once closed, satisfies every
/// predicate in `preds`.
///
/// Transitions are rotation-sensitive (a first-edge rule cares where the
/// cycle starts), so the search tries every vertex as a starting point
/// and explores simple paths from it in depth-first order. The budget is
/// polled at every recursion step.
///
/// # Errors
///
/// [`Interrupted`] if the budget expires first.
pub fn find_cycle_with(
    transition: &Transition,
    preds: &[CyclePred],
    g: &DepGraph,
    budget: SearchBudget,
) -> Result<Option<Cycle>, Interrupted> {
    let mut search = PathSearch {
        transition,
        preds,
        g,
        budget,
        path: Vec::new(),
        labels: Vec::new(),
        in_path: HashSet::new(),
    };
    for start in g.sorted_vertices() {
        search.path.clear();
        search.labels.clear();
        search.in_path.clear();
        search.path.push(start);
        search.in_path.insert(start);
        if let Some(cycle) = search.dfs(start, transition.initial())? {
            return Ok(Some(cycle));
        }
    }
    Ok(None)
}

struct PathSearch<'a> {
    transition: &'a Transition,
    preds: &'a [CyclePred],
    g: &'a DepGraph,
    budget: SearchBudget,
    path: Vec<TxnId>,
    labels: Vec<RelSet>,
    in_path: HashSet<TxnId>,
}

impl PathSearch<'_> {
    fn dfs(
        &mut self,
        start: TxnId,
        state: TransitionState,
    ) -> Result<Option<Cycle>, Interrupted> {
        if self.budget.expired() {
            return Err(Interrupted);
        }
        let v = *self.path.last().expect("path holds at least the start");
        for (w, label) in self.g.sorted_successors(v) {
            if w == start {
                if self.path.len() < 2 {
                    continue;
                }
                if self.transition.step(state, label).is_some() {
                    self.labels.push(label);
                    let accepted = eval_all(self.preds, PathState::new(&self.labels));
                    if accepted {
                        return Ok(Some(Cycle {
                            vertices: self.path.clone(),
                            labels: self.labels.clone(),
                        }));
                    }
                    self.labels.pop();
                }
            } else if !self.in_path.contains(&w) {
                if let Some(next) = self.transition.step(state, label) {
                    self.path.push(w);
                    self.labels.push(label);
                    self.in_path.insert(w);
                    let found = self.dfs(start, next);
                    self.path.pop();
                    self.labels.pop();
                    self.in_path.remove(&w);
                    if let Some(cycle) = found? {
                        return Ok(Some(cycle));
                    }
                }
            }
        }
        Ok(None)
    }
}

/// BFS from `start`'s successors back to `start`; returns the shortest
/// closed walk as a cycle.
fn bfs_close(
    g: &DepGraph,
    start: TxnId,
    budget: SearchBudget,
) -> Result<Option<Cycle>, Interrupted> {
    let path = bfs_from_successors(g, start, start, budget)?;
    Ok(path.map(|mut vertices| {
        // path runs from a successor of start back to start itself; drop
        // the closing start and put it in front instead
        vertices.pop();
        vertices.insert(0, start);
        Cycle::from_vertices(g, vertices)
    }))
}

/// Shortest path from `from` to `to` in `g`, as `[from, ..., to]`.
fn bfs_path(
    g: &DepGraph,
    from: TxnId,
    to: TxnId,
    budget: SearchBudget,
) -> Result<Option<Vec<TxnId>>, Interrupted> {
    if let Some((_, path)) = bfs(g, [from], to, budget)? {
        Ok(Some(path))
    } else {
        Ok(None)
    }
}

fn bfs_from_successors(
    g: &DepGraph,
    start: TxnId,
    to: TxnId,
    budget: SearchBudget,
) -> Result<Option<Vec<TxnId>>, Interrupted> {
    let seeds: Vec<TxnId> = g
        .sorted_successors(start)
        .into_iter()
        .map(|(w, _)| w)
        .filter(|w| *w != start)
        .collect();
    Ok(bfs(g, seeds, to, budget)?.map(|(_, path)| path))
}

/// BFS from the seed set to `to`. Returns the reached seed and the path
/// `[seed, ..., to]`. `to` is never expanded, only recognized as a target.
fn bfs(
    g: &DepGraph,
    seeds: impl IntoIterator<Item = TxnId>,
    to: TxnId,
    budget: SearchBudget,
) -> Result<Option<(TxnId, Vec<TxnId>)>, Interrupted> {
    let mut parent: HashMap<TxnId, Option<TxnId>> = HashMap::new();
    let mut queue: VecDeque<TxnId> = VecDeque::new();

    for seed in seeds {
        if seed == to {
            return Ok(Some((seed, vec![seed])));
        }
        if !parent.contains_key(&seed) {
            parent.insert(seed, None);
            queue.push_back(seed);
        }
    }

    while let Some(u) = queue.pop_front() {
        if budget.expired() {
            return Err(Interrupted);
        }
        for (w, _) in g.sorted_successors(u) {
            if w == to {
                let mut rev = vec![to, u];
                let mut cur = u;
                while let Some(Some(prev)) = parent.get(&cur) {
                    rev.push(*prev);
                    cur = *prev;
                }
                rev.reverse();
                let seed = rev[0];
                return Ok(Some((seed, rev)));
            }
            if !parent.contains_key(&w) {
                parent.insert(w, Some(u));
                queue.push_back(w);
            }
        }
    }
    Ok(None)
}
