//! Turns a raw cycle into a typed explanation.
//!
//! The classifier only computes the [`AnomalyType`]; the human-readable
//! rendering of each step is delegated to the caller's [`PairExplainer`],
//! which knows the underlying history.

use std::fmt::{self, Display, Formatter};

use super::{AnomalyType, DataDep, OrderSuffix};
use crate::history::TxnId;
use crate::rels::{Rel, RelSet};
use crate::search::Cycle;

/// One edge of an explained cycle.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub from: TxnId,
    pub to: TxnId,
    /// The full label of the underlying edge.
    pub label: RelSet,
    /// The relation this step is counted as (see [`RelSet::primary`]).
    pub rel: Rel,
    /// Whether the anti-dependency was through a predicate read. Nothing
    /// in this crate sets it; analyzers that track predicate reads may.
    pub predicate: bool,
    /// Human-readable rendering from the pair explainer.
    pub explanation: String,
}

/// A classified cycle.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleExplanation {
    pub ty: AnomalyType,
    pub steps: Vec<Step>,
}

impl Display for CycleExplanation {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        writeln!(f, "{}:", self.ty)?;
        for step in &self.steps {
            writeln!(f, "  {}", step.explanation)?;
        }
        Ok(())
    }
}

/// Renders the relationship between one pair of adjacent transactions in
/// a cycle. Implementations must be pure with respect to their inputs and
/// must not touch the graph.
pub trait PairExplainer: Sync {
    fn explain_pair(&self, from: TxnId, to: TxnId, label: RelSet) -> String;
}

/// Fallback explainer that states the relation and nothing else. Useful
/// when no history-aware explainer is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct RelsExplainer;

impl PairExplainer for RelsExplainer {
    fn explain_pair(&self, from: TxnId, to: TxnId, label: RelSet) -> String {
        format!("{from} -{label}-> {to}")
    }
}

/// Builds the steps of `cycle`, rendering each pair through `explainer`.
#[must_use]
pub fn steps_of(cycle: &Cycle, explainer: &dyn PairExplainer) -> Vec<Step> {
    cycle
        .steps()
        .map(|(from, label, to)| Step {
            from,
            to,
            label,
            rel: label
                .primary()
                .unwrap_or_else(|| unreachable!("edge {from} -> {to} has an empty label")),
            predicate: false,
            explanation: explainer.explain_pair(from, to, label),
        })
        .collect()
}

/// Classifies a cycle from the relations of its steps.
///
/// Returns `None` for a cycle with no data-dependency step at all (pure
/// process/realtime cycles); for any cycle produced by an anomaly-spec
/// search that is an internal logic error and the caller must treat it as
/// fatal.
#[must_use]
pub fn classify(steps: &[Step]) -> Option<AnomalyType> {
    let count = |rel: Rel| steps.iter().filter(|step| step.rel == rel).count();
    let rw = count(Rel::Rw);
    let ww = count(Rel::Ww);
    let wr = count(Rel::Wr);
    let process = count(Rel::Process);
    let realtime = count(Rel::Realtime);

    let base = if rw == 1 {
        DataDep::GSingle
    } else if rw > 1 {
        if adjacent_rw(steps) {
            if steps.iter().any(|step| step.predicate) {
                DataDep::G2
            } else {
                DataDep::G2Item
            }
        } else {
            DataDep::GNonadjacent
        }
    } else if wr > 0 {
        DataDep::G1c
    } else if ww > 0 {
        DataDep::G0
    } else {
        return None;
    };

    // realtime order implies process order, so it wins the suffix
    let suffix = if realtime > 0 {
        OrderSuffix::Realtime
    } else if process > 0 {
        OrderSuffix::Process
    } else {
        OrderSuffix::None
    };

    Some(AnomalyType::new(base, suffix))
}

/// True if some pair of cyclically consecutive steps are both
/// anti-dependencies. The last step wraps around to the first.
fn adjacent_rw(steps: &[Step]) -> bool {
    let n = steps.len();
    (0..n).any(|i| steps[i].rel == Rel::Rw && steps[(i + 1) % n].rel == Rel::Rw)
}

/// Explains and classifies in one go.
#[must_use]
pub fn explain(cycle: &Cycle, explainer: &dyn PairExplainer) -> Option<CycleExplanation> {
    let steps = steps_of(cycle, explainer);
    classify(&steps).map(|ty| CycleExplanation { ty, steps })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(from: u64, to: u64, label: RelSet) -> Step {
        Step {
            from: TxnId(from),
            to: TxnId(to),
            label,
            rel: label.primary().unwrap(),
            predicate: false,
            explanation: String::new(),
        }
    }

    fn classify_labels(labels: &[RelSet]) -> Option<AnomalyType> {
        let n = labels.len() as u64;
        let steps: Vec<Step> = labels
            .iter()
            .enumerate()
            .map(|(i, label)| step(i as u64, (i as u64 + 1) % n, *label))
            .collect();
        classify(&steps)
    }

    #[test]
    fn ww_only_is_g0() {
        assert_eq!(
            classify_labels(&[RelSet::WW, RelSet::WW]),
            Some(AnomalyType::plain(DataDep::G0))
        );
    }

    #[test]
    fn ww_wr_is_g1c() {
        assert_eq!(
            classify_labels(&[RelSet::WW, RelSet::WR]),
            Some(AnomalyType::plain(DataDep::G1c))
        );
    }

    #[test]
    fn one_rw_is_g_single() {
        assert_eq!(
            classify_labels(&[RelSet::WW, RelSet::WR, RelSet::RW]),
            Some(AnomalyType::plain(DataDep::GSingle))
        );
    }

    #[test]
    fn spread_rws_are_nonadjacent() {
        assert_eq!(
            classify_labels(&[RelSet::RW, RelSet::WW, RelSet::RW, RelSet::WW]),
            Some(AnomalyType::plain(DataDep::GNonadjacent))
        );
    }

    #[test]
    fn adjacent_rws_are_g2_item() {
        assert_eq!(
            classify_labels(&[RelSet::RW, RelSet::RW, RelSet::WW]),
            Some(AnomalyType::plain(DataDep::G2Item))
        );
    }

    #[test]
    fn wrap_around_counts_as_adjacent() {
        // rw, ww, rw: steps 2 and 0 are cyclically consecutive
        assert_eq!(
            classify_labels(&[RelSet::RW, RelSet::WW, RelSet::RW]),
            Some(AnomalyType::plain(DataDep::G2Item))
        );
    }

    #[test]
    fn predicate_step_upgrades_to_g2() {
        let mut steps = vec![
            step(0, 1, RelSet::RW),
            step(1, 2, RelSet::RW),
            step(2, 0, RelSet::WW),
        ];
        steps[0].predicate = true;
        assert_eq!(classify(&steps), Some(AnomalyType::plain(DataDep::G2)));
    }

    #[test]
    fn realtime_beats_process_in_the_suffix() {
        assert_eq!(
            classify_labels(&[RelSet::WW, RelSet::PROCESS, RelSet::REALTIME]),
            Some(AnomalyType::new(DataDep::G0, OrderSuffix::Realtime))
        );
    }

    #[test]
    fn process_suffix_without_realtime() {
        assert_eq!(
            classify_labels(&[RelSet::WW, RelSet::WR, RelSet::PROCESS]),
            Some(AnomalyType::new(DataDep::G1c, OrderSuffix::Process))
        );
    }

    #[test]
    fn combined_labels_count_as_their_primary() {
        // a ww+realtime edge is a ww step, not a realtime step
        assert_eq!(
            classify_labels(&[RelSet::WW.union(RelSet::REALTIME), RelSet::WW]),
            Some(AnomalyType::plain(DataDep::G0))
        );
    }

    #[test]
    fn pure_order_cycle_is_unclassifiable() {
        assert_eq!(classify_labels(&[RelSet::PROCESS, RelSet::REALTIME]), None);
    }

    #[test]
    fn classification_is_total_over_data_labels() {
        // every cycle with at least one data-dependency step gets a type
        let data = [RelSet::WW, RelSet::WR, RelSet::RW];
        for a in data {
            for b in data {
                for c in [RelSet::WW, RelSet::WR, RelSet::RW, RelSet::PROCESS] {
                    assert!(
                        classify_labels(&[a, b, c]).is_some(),
                        "unclassified: {a:?} {b:?} {c:?}"
                    );
                }
            }
        }
    }
}
