//! The SCC driver: runs the anomaly-spec table over every strongly
//! connected component of the dependency graph, under a per-component
//! wall-clock budget.
//!
//! Components are independent: each task reads only its own induced
//! subgraph and a private projection cache, so they run in parallel.
//! Within a component the spec table is evaluated strictly in priority
//! order; that order is observable, because it determines which anomalies
//! were already found when a timeout fires.

use std::hash::Hash;
use std::time::{Duration, Instant};

use hashbrown::HashSet;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use typed_builder::TypedBuilder;

use crate::anomaly::explain::{self, CycleExplanation, PairExplainer};
use crate::anomaly::specs::{cycle_anomaly_specs, CompiledSpec, CycleAnomalySpec, SearchPlan};
use crate::anomaly::{Anomaly, AnomalyKind, AnomalyMap, AnomalyType, TimeoutInfo};
use crate::graph::projection::ProjectionCache;
use crate::graph::DepGraph;
use crate::history::{Txn, TxnId};
use crate::lost_update::lost_update_cases;
use crate::models::ConsistencyModel;
use crate::rels::{Rel, RelSet};
use crate::search::{
    find_cycle, find_cycle_starting_with, find_cycle_with, Cycle, Interrupted, SearchBudget,
};
use crate::verdict::{self, CheckResult};

/// Options for a check run.
#[derive(Debug, Clone, TypedBuilder)]
pub struct CheckOptions {
    /// Models the history is expected to satisfy.
    #[builder(default = vec![ConsistencyModel::StrictSerializable])]
    pub consistency_models: Vec<ConsistencyModel>,
    /// Extra anomaly kinds to flag even if no declared model prohibits
    /// them.
    #[builder(default)]
    pub anomalies: Vec<AnomalyKind>,
    /// Wall-clock budget per strongly connected component.
    #[builder(default = Duration::from_millis(1000))]
    pub cycle_search_timeout: Duration,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// What the history analyzer hands the driver: the dependency graph and
/// its strongly connected components.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub graph: DepGraph,
    pub sccs: Vec<Vec<TxnId>>,
}

impl Analysis {
    #[must_use]
    pub const fn new(graph: DepGraph, sccs: Vec<Vec<TxnId>>) -> Self {
        Self { graph, sccs }
    }

    /// Computes the components from the graph itself.
    #[must_use]
    pub fn from_graph(graph: DepGraph) -> Self {
        let sccs = graph.sccs();
        Self { graph, sccs }
    }
}

/// The relation subsets the timeout fallback tries, narrowest first. The
/// first one whose projection still has a non-trivial component supplies
/// the witness.
const FALLBACK_CASCADE: [RelSet; 6] = [
    RelSet::WW,
    RelSet::of(&[Rel::Ww, Rel::Realtime, Rel::Process]),
    RelSet::of(&[Rel::Ww, Rel::Wr]),
    RelSet::of(&[Rel::Ww, Rel::Wr, Rel::Realtime, Rel::Process]),
    RelSet::of(&[Rel::Ww, Rel::Wr, Rel::Rw]),
    RelSet::ALL,
];

/// Runs the whole spec table over every component of the graph and merges
/// the witnesses by anomaly type.
///
/// An empty graph yields a single inconclusive
/// [`AnomalyKind::EmptyTransactionGraph`] finding.
#[must_use]
pub fn cycles<K, V>(
    options: &CheckOptions,
    analysis: &Analysis,
    explainer: &dyn PairExplainer,
) -> AnomalyMap<K, V>
where
    K: Send,
    V: Send,
{
    if analysis.graph.is_empty() {
        tracing::debug!("empty transaction graph");
        let mut map = AnomalyMap::new();
        map.insert(
            AnomalyKind::EmptyTransactionGraph,
            vec![Anomaly::EmptyTransactionGraph],
        );
        return map;
    }

    let compiled: Vec<CompiledSpec> = cycle_anomaly_specs()
        .iter()
        .map(CycleAnomalySpec::compile)
        .collect();

    // every relation set any spec or the fallback will ask for
    let warm: Vec<RelSet> = compiled
        .iter()
        .flat_map(CompiledSpec::rel_sets)
        .chain(FALLBACK_CASCADE)
        .collect::<HashSet<RelSet>>()
        .into_iter()
        .collect();

    let components: Vec<&Vec<TxnId>> = analysis
        .sccs
        .iter()
        .filter(|scc| scc.len() >= 2)
        .collect();

    tracing::debug!(
        components = components.len(),
        vertices = analysis.graph.vertex_count(),
        "searching components for anomaly witnesses"
    );

    let per_component: Vec<Vec<Anomaly<K, V>>> = components
        .par_iter()
        .map(|scc| check_scc(options, &analysis.graph, &compiled, &warm, scc, explainer))
        .collect();

    let mut map = AnomalyMap::new();
    for anomalies in per_component {
        for anomaly in anomalies {
            map.entry(anomaly.kind()).or_default().push(anomaly);
        }
    }
    map
}

/// Full check: cycle anomalies, lost updates, verdict.
#[must_use]
pub fn check<K, V>(
    options: &CheckOptions,
    history: &[Txn<K, V>],
    analysis: &Analysis,
    explainer: &dyn PairExplainer,
) -> CheckResult<K, V>
where
    K: Eq + Hash + Clone + Ord + Send,
    V: Eq + Hash + Clone + Send,
{
    let mut anomalies = cycles(options, analysis, explainer);

    let lost = lost_update_cases(history);
    if !lost.is_empty() {
        anomalies
            .entry(AnomalyKind::LostUpdate)
            .or_default()
            .extend(lost.into_iter().map(Anomaly::LostUpdate));
    }

    verdict::verdict(options, anomalies)
}

/// Evaluates the spec table over one component.
fn check_scc<K, V>(
    options: &CheckOptions,
    graph: &DepGraph,
    specs: &[CompiledSpec],
    warm: &[RelSet],
    scc: &[TxnId],
    explainer: &dyn PairExplainer,
) -> Vec<Anomaly<K, V>> {
    let members: HashSet<TxnId> = scc.iter().copied().collect();
    let mut cache = ProjectionCache::new(graph.induced(&members));
    // materialize projections before the clock starts; doing it lazily
    // burns the budget on graph construction instead of searching
    cache.warm(warm.iter().copied());

    let budget = SearchBudget::until(Instant::now() + options.cycle_search_timeout);
    let mut found: Vec<Anomaly<K, V>> = Vec::new();
    let mut checked: Vec<AnomalyType> = Vec::new();

    for spec in specs {
        match run_spec(spec, &mut cache, budget, explainer) {
            Ok(Some(explanation)) => {
                tracing::debug!(spec = %spec.ty, ty = %explanation.ty, "witness found");
                found.push(Anomaly::Cycle(explanation));
                checked.push(spec.ty);
            }
            Ok(None) => checked.push(spec.ty),
            Err(Interrupted) => {
                tracing::debug!(
                    spec = %spec.ty,
                    scc_size = scc.len(),
                    "cycle search timed out"
                );
                found.push(Anomaly::CycleSearchTimeout(TimeoutInfo {
                    anomaly_spec_type: spec.ty,
                    checked: checked.clone(),
                    scc_size: scc.len(),
                }));
                if let Some(cycle) = fallback_cycle(&mut cache) {
                    if let Some(explanation) = explain::explain(&cycle, explainer) {
                        found.push(Anomaly::Cycle(explanation));
                    } else {
                        // a cascade witness can be a pure ordering cycle,
                        // which has no place in the data-dependency taxonomy
                        tracing::warn!(%cycle, "fallback cycle has no data dependency");
                    }
                }
                break;
            }
        }
    }
    found
}

/// Runs one compiled spec against the cached projections. A witness is
/// classified immediately; a `type` filter rejects mismatches.
fn run_spec(
    spec: &CompiledSpec,
    cache: &mut ProjectionCache,
    budget: SearchBudget,
    explainer: &dyn PairExplainer,
) -> Result<Option<CycleExplanation>, Interrupted> {
    let cycle = match &spec.plan {
        SearchPlan::Filtered(rels) => {
            find_cycle_with(&spec.transition, &spec.preds, cache.get(*rels), budget)?
        }
        SearchPlan::StartingWith { first, rest } => {
            let (first, rest) = cache.get_pair(*first, *rest);
            find_cycle_starting_with(first, rest, budget)?
        }
        SearchPlan::Plain(rels) => find_cycle(cache.get(*rels), budget)?,
    };

    Ok(cycle.and_then(|cycle| {
        let explanation = explain::explain(&cycle, explainer).unwrap_or_else(|| {
            unreachable!(
                "spec {} produced a cycle with no data dependency: {}",
                spec.ty, cycle
            )
        });
        match spec.type_filter {
            Some(filter) if explanation.ty != filter => None,
            _ => Some(explanation),
        }
    }))
}

/// Best-effort witness after a timeout: project onto each cascade subset
/// in turn, and search inside the first non-trivial sub-component (the
/// smaller the component, the more readable the witness). Falls back to
/// any cycle in the whole component.
fn fallback_cycle(cache: &mut ProjectionCache) -> Option<Cycle> {
    for rels in FALLBACK_CASCADE {
        let projection = cache.get(rels);
        let Some(scc) = projection.sccs().into_iter().find(|scc| scc.len() >= 2) else {
            continue;
        };
        let members: HashSet<TxnId> = scc.iter().copied().collect();
        let sub = projection.induced(&members);
        if let Ok(Some(cycle)) = find_cycle(&sub, SearchBudget::UNLIMITED) {
            return Some(cycle);
        }
    }
    find_cycle(cache.base(), SearchBudget::UNLIMITED).ok().flatten()
}
