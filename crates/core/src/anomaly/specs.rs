//! The declarative cycle-anomaly specification table and its compiler.
//!
//! Each [`CycleAnomalySpec`] describes a family of cycles declaratively;
//! [`CycleAnomalySpec::compile`] lowers it to a search plan, a per-step
//! transition, and whole-path predicates for the search engine. The table
//! is an ordered list, not a hash-ordered structure: priority is
//! observable, because it decides which anomalies were already found
//! when a timeout fires.

use super::{AnomalyType, DataDep, OrderSuffix};
use crate::rels::{Rel, RelSet};
use crate::search::{CyclePred, Transition};

/// A declarative description of one cycle-anomaly family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleAnomalySpec {
    /// The table entry's name, used in reports and timeout records.
    pub ty: AnomalyType,
    /// Base edge alphabet for the cycle.
    pub rels: RelSet,
    /// Must appear, but never at cyclically adjacent positions.
    pub nonadjacent_rels: Option<RelSet>,
    /// Must appear exactly once, as the first edge.
    pub single_rels: Option<RelSet>,
    /// Must appear at least twice.
    pub multiple_rels: Option<RelSet>,
    /// Must appear at least once.
    pub required_rels: Option<RelSet>,
    /// Force a process-order edge into the cycle.
    pub process: bool,
    /// Force a realtime-order edge into the cycle.
    pub realtime: bool,
    /// Reject witnesses whose classified type differs.
    pub type_filter: Option<AnomalyType>,
}

impl CycleAnomalySpec {
    const fn new(base: DataDep, rels: RelSet) -> Self {
        Self {
            ty: AnomalyType::plain(base),
            rels,
            nonadjacent_rels: None,
            single_rels: None,
            multiple_rels: None,
            required_rels: None,
            process: false,
            realtime: false,
            type_filter: None,
        }
    }

    /// The spec for the same base anomaly, additionally leaning on the
    /// given ordering relation.
    fn with_order(&self, rel: Rel) -> Self {
        let suffix = match rel {
            Rel::Process => OrderSuffix::Process,
            Rel::Realtime => OrderSuffix::Realtime,
            _ => unreachable!("order variants only exist for process and realtime"),
        };
        Self {
            ty: AnomalyType::new(self.ty.base, suffix),
            rels: self.rels.union(RelSet::single(rel)),
            process: rel == Rel::Process,
            realtime: rel == Rel::Realtime,
            type_filter: self
                .type_filter
                .map(|filter| AnomalyType::new(filter.base, suffix)),
            ..self.clone()
        }
    }

    /// Compiles to an executable search, per the table:
    ///
    /// | condition | effect |
    /// |---|---|
    /// | `multiple_rels` | predicate: at least two such edges |
    /// | `required_rels` | predicate: at least one such edge |
    /// | `process` | predicate: at least one pure process edge |
    /// | `realtime` | predicate: at least one pure realtime edge |
    /// | `single_rels` | transition: first edge only |
    /// | else `nonadjacent_rels` | transition: never adjacent |
    ///
    /// A spec with predicates or a nonadjacency constraint searches the
    /// projection onto every relation set it mentions; a bare
    /// `single_rels` spec searches first-edge/rest-graph; anything else is
    /// a plain cycle search on the base projection.
    ///
    /// # Panics
    ///
    /// A spec with an empty base alphabet is a configuration error.
    #[must_use]
    pub fn compile(&self) -> CompiledSpec {
        assert!(!self.rels.is_empty(), "anomaly spec {} has empty rels", self.ty);

        let mut preds = Vec::new();
        if let Some(multiple) = self.multiple_rels {
            preds.push(CyclePred::Multiple(multiple));
        }
        if let Some(required) = self.required_rels {
            preds.push(CyclePred::Required(required));
        }
        if self.process {
            preds.push(CyclePred::Required(RelSet::PROCESS));
        }
        if self.realtime {
            preds.push(CyclePred::Required(RelSet::REALTIME));
        }

        let transition = if let Some(single) = self.single_rels {
            Transition::FirstOnly(single)
        } else if let Some(nonadjacent) = self.nonadjacent_rels {
            Transition::Nonadjacent(nonadjacent)
        } else {
            Transition::Trivial
        };

        let plan = if !preds.is_empty() || self.nonadjacent_rels.is_some() {
            let mut rels = self.rels;
            for extra in [
                self.nonadjacent_rels,
                self.required_rels,
                self.single_rels,
                self.multiple_rels,
            ]
            .into_iter()
            .flatten()
            {
                rels = rels.union(extra);
            }
            SearchPlan::Filtered(rels)
        } else if let Some(single) = self.single_rels {
            SearchPlan::StartingWith {
                first: single,
                rest: self.rels,
            }
        } else {
            SearchPlan::Plain(self.rels)
        };

        CompiledSpec {
            ty: self.ty,
            plan,
            transition,
            preds,
            type_filter: self.type_filter,
        }
    }
}

/// Which graphs a compiled spec searches, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchPlan {
    /// General search over one projection, with transition and predicates.
    Filtered(RelSet),
    /// First edge from one projection, the rest from another.
    StartingWith { first: RelSet, rest: RelSet },
    /// Any cycle in the projection.
    Plain(RelSet),
}

/// An executable anomaly search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledSpec {
    pub ty: AnomalyType,
    pub plan: SearchPlan,
    pub transition: Transition,
    pub preds: Vec<CyclePred>,
    pub type_filter: Option<AnomalyType>,
}

impl CompiledSpec {
    /// Every relation set this spec's plan projects onto; the driver warms
    /// them all before starting the clock.
    #[must_use]
    pub fn rel_sets(&self) -> Vec<RelSet> {
        match self.plan {
            SearchPlan::Filtered(rels) | SearchPlan::Plain(rels) => vec![rels],
            SearchPlan::StartingWith { first, rest } => vec![first, rest],
        }
    }
}

const DATA: RelSet = RelSet::of(&[Rel::Ww, Rel::Wr]);
const DATA_RW: RelSet = RelSet::of(&[Rel::Ww, Rel::Wr, Rel::Rw]);

fn base_specs() -> Vec<CycleAnomalySpec> {
    let g0 = CycleAnomalySpec::new(DataDep::G0, RelSet::WW);

    let g1c = CycleAnomalySpec {
        required_rels: Some(RelSet::WR),
        ..CycleAnomalySpec::new(DataDep::G1c, DATA)
    };

    let g_single = CycleAnomalySpec {
        single_rels: Some(RelSet::RW),
        ..CycleAnomalySpec::new(DataDep::GSingle, DATA)
    };

    let g_nonadjacent = CycleAnomalySpec {
        nonadjacent_rels: Some(RelSet::RW),
        multiple_rels: Some(RelSet::RW),
        ..CycleAnomalySpec::new(DataDep::GNonadjacent, DATA)
    };

    let g2_item = CycleAnomalySpec {
        multiple_rels: Some(RelSet::RW),
        type_filter: Some(AnomalyType::plain(DataDep::G2Item)),
        ..CycleAnomalySpec::new(DataDep::G2Item, DATA_RW)
    };

    let g2 = CycleAnomalySpec {
        multiple_rels: Some(RelSet::RW),
        type_filter: Some(AnomalyType::plain(DataDep::G2)),
        ..CycleAnomalySpec::new(DataDep::G2, DATA_RW)
    };

    vec![g0, g1c, g_single, g_nonadjacent, g2_item, g2]
}

/// The full spec table, in priority order (worst anomalies first): the
/// six data-dependency families, then their process variants, then their
/// realtime variants.
#[must_use]
pub fn cycle_anomaly_specs() -> Vec<CycleAnomalySpec> {
    let base = base_specs();
    let mut specs = Vec::with_capacity(base.len() * 3);
    specs.extend(base.iter().cloned());
    specs.extend(base.iter().map(|spec| spec.with_order(Rel::Process)));
    specs.extend(base.iter().map(|spec| spec.with_order(Rel::Realtime)));
    specs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_eighteen_specs_in_priority_order() {
        let specs = cycle_anomaly_specs();
        assert_eq!(specs.len(), 18);

        let names: Vec<String> = specs.iter().map(|s| s.ty.to_string()).collect();
        assert_eq!(
            &names[..6],
            &["G0", "G1c", "G-single", "G-nonadjacent", "G2-item", "G2"]
        );
        assert_eq!(names[6], "G0-process");
        assert_eq!(names[12], "G0-realtime");
        assert_eq!(names[17], "G2-realtime");
    }

    #[test]
    fn g0_compiles_to_plain_search() {
        let spec = &cycle_anomaly_specs()[0];
        let compiled = spec.compile();
        assert_eq!(compiled.plan, SearchPlan::Plain(RelSet::WW));
        assert_eq!(compiled.transition, Transition::Trivial);
        assert!(compiled.preds.is_empty());
    }

    #[test]
    fn g_single_compiles_to_starting_with() {
        let spec = &cycle_anomaly_specs()[2];
        let compiled = spec.compile();
        assert_eq!(
            compiled.plan,
            SearchPlan::StartingWith {
                first: RelSet::RW,
                rest: DATA
            }
        );
        assert_eq!(compiled.rel_sets(), vec![RelSet::RW, DATA]);
    }

    #[test]
    fn g_nonadjacent_compiles_to_filtered_search() {
        let spec = &cycle_anomaly_specs()[3];
        let compiled = spec.compile();
        assert_eq!(compiled.plan, SearchPlan::Filtered(DATA_RW));
        assert_eq!(compiled.transition, Transition::Nonadjacent(RelSet::RW));
        assert_eq!(compiled.preds, vec![CyclePred::Multiple(RelSet::RW)]);
    }

    #[test]
    fn process_variant_extends_rels_and_preds() {
        let specs = cycle_anomaly_specs();
        // G-single-process
        let spec = &specs[8];
        assert_eq!(spec.ty.to_string(), "G-single-process");
        assert!(spec.rels.contains(Rel::Process));
        assert!(spec.process);

        let compiled = spec.compile();
        // predicates force a pure process edge; the plan folds every
        // mentioned set into one projection
        assert_eq!(compiled.preds, vec![CyclePred::Required(RelSet::PROCESS)]);
        assert_eq!(compiled.transition, Transition::FirstOnly(RelSet::RW));
        assert_eq!(
            compiled.plan,
            SearchPlan::Filtered(DATA_RW.union(RelSet::PROCESS))
        );
    }

    #[test]
    fn type_filters_follow_the_variant_suffix() {
        let specs = cycle_anomaly_specs();
        let g2_item_realtime = &specs[16];
        assert_eq!(g2_item_realtime.ty.to_string(), "G2-item-realtime");
        assert_eq!(
            g2_item_realtime.type_filter.map(|t| t.to_string()),
            Some("G2-item-realtime".to_string())
        );
    }

    #[test]
    #[should_panic(expected = "empty rels")]
    fn empty_rels_is_a_configuration_error() {
        let mut spec = CycleAnomalySpec::new(DataDep::G0, RelSet::WW);
        spec.rels = RelSet::EMPTY;
        let _ = spec.compile();
    }
}
