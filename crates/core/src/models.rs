//! Consistency models and the static mapping from models to the anomaly
//! kinds that rule them out.
//!
//! Two relations drive the verdict:
//!
//! - **Prohibition**: each model lists the kinds whose presence violates
//!   it. The listed sets are closed over implication, so prohibiting a
//!   kind also prohibits everything that witnesses it.
//! - **Implication**: detecting one kind can prove another is present.
//!   A ww-only cycle is in particular a ww∪wr cycle, an item
//!   anti-dependency cycle is an anti-dependency cycle, and a cycle that
//!   needs no ordering edges also witnesses the order-extended family.

use std::collections::BTreeSet;

use crate::anomaly::{AnomalyKind, AnomalyType, DataDep, OrderSuffix};

/// A consistency model a history can be checked against.
#[cfg_attr(
    feature = "serde",
    derive(::serde::Serialize, ::serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConsistencyModel {
    ReadUncommitted,
    ReadCommitted,
    Causal,
    RepeatableRead,
    SnapshotIsolation,
    Serializable,
    StrictSerializable,
}

impl ConsistencyModel {
    pub const ALL: [Self; 7] = [
        Self::ReadUncommitted,
        Self::ReadCommitted,
        Self::Causal,
        Self::RepeatableRead,
        Self::SnapshotIsolation,
        Self::Serializable,
        Self::StrictSerializable,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "read-uncommitted",
            Self::ReadCommitted => "read-committed",
            Self::Causal => "causal",
            Self::RepeatableRead => "repeatable-read",
            Self::SnapshotIsolation => "snapshot-isolation",
            Self::Serializable => "serializable",
            Self::StrictSerializable => "strict-serializable",
        }
    }

    /// The anomaly kinds this model directly rules out.
    #[must_use]
    pub fn prohibits(self) -> Vec<AnomalyKind> {
        let cycle = |base, suffix| AnomalyKind::Cycle(AnomalyType::new(base, suffix));
        let plain = |base| cycle(base, OrderSuffix::None);

        match self {
            Self::ReadUncommitted => vec![plain(DataDep::G0)],
            Self::ReadCommitted => vec![plain(DataDep::G0), plain(DataDep::G1c)],
            Self::Causal => vec![
                plain(DataDep::G0),
                plain(DataDep::G1c),
                cycle(DataDep::G0, OrderSuffix::Process),
                cycle(DataDep::G1c, OrderSuffix::Process),
            ],
            Self::RepeatableRead => vec![
                plain(DataDep::G0),
                plain(DataDep::G1c),
                plain(DataDep::G2Item),
                AnomalyKind::LostUpdate,
            ],
            Self::SnapshotIsolation => vec![
                plain(DataDep::G0),
                plain(DataDep::G1c),
                plain(DataDep::GSingle),
                AnomalyKind::LostUpdate,
            ],
            Self::Serializable => {
                let mut kinds: Vec<AnomalyKind> = DataDep::ALL.into_iter().map(plain).collect();
                kinds.push(AnomalyKind::LostUpdate);
                kinds
            }
            Self::StrictSerializable => {
                let mut kinds: Vec<AnomalyKind> = AnomalyType::all()
                    .into_iter()
                    .map(AnomalyKind::Cycle)
                    .collect();
                kinds.push(AnomalyKind::LostUpdate);
                kinds
            }
        }
    }

    /// The prohibited set closed over implication: every kind whose
    /// detection witnesses a directly prohibited kind.
    #[must_use]
    pub fn prohibits_expanded(self) -> BTreeSet<AnomalyKind> {
        expand_prohibited(self.prohibits().into_iter().collect())
    }

    /// `self` rules out no more than `other` does.
    #[must_use]
    pub fn weaker_or_equal(self, other: Self) -> bool {
        self.prohibits_expanded()
            .is_subset(&other.prohibits_expanded())
    }
}

impl std::fmt::Display for ConsistencyModel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Kinds whose presence `kind` directly proves.
fn implies(kind: AnomalyKind) -> Vec<AnomalyKind> {
    let AnomalyKind::Cycle(ty) = kind else {
        return Vec::new();
    };
    let mut out = Vec::new();

    // a cycle of the base family is also a cycle of the wider family
    let wider = match ty.base {
        DataDep::G0 => Some(DataDep::G1c),
        DataDep::GSingle | DataDep::GNonadjacent => Some(DataDep::G2Item),
        DataDep::G2Item => Some(DataDep::G2),
        DataDep::G1c | DataDep::G2 => None,
    };
    if let Some(base) = wider {
        out.push(AnomalyKind::Cycle(AnomalyType::new(base, ty.suffix)));
    }

    // a cycle that stands without an ordering relation also witnesses the
    // order-extended family
    let wider_suffix = match ty.suffix {
        OrderSuffix::None => Some(OrderSuffix::Process),
        OrderSuffix::Process => Some(OrderSuffix::Realtime),
        OrderSuffix::Realtime => None,
    };
    if let Some(suffix) = wider_suffix {
        out.push(AnomalyKind::Cycle(AnomalyType::new(ty.base, suffix)));
    }

    out
}

/// The kinds that imply (transitively) any of `targets`, plus the targets
/// themselves. Used to turn user-requested extra anomalies into the full
/// set worth reporting.
#[must_use]
pub fn all_anomalies_implying(targets: &[AnomalyKind]) -> BTreeSet<AnomalyKind> {
    let targets: BTreeSet<AnomalyKind> = targets.iter().copied().collect();
    let mut out = targets.clone();

    // small universe: iterate all kinds and close transitively
    let universe: Vec<AnomalyKind> = AnomalyType::all()
        .into_iter()
        .map(AnomalyKind::Cycle)
        .chain([AnomalyKind::LostUpdate])
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for kind in &universe {
            if out.contains(kind) {
                continue;
            }
            if implies(*kind).iter().any(|implied| out.contains(implied)) {
                out.insert(*kind);
                changed = true;
            }
        }
    }
    out
}

fn expand_prohibited(prohibited: BTreeSet<AnomalyKind>) -> BTreeSet<AnomalyKind> {
    let targets: Vec<AnomalyKind> = prohibited.into_iter().collect();
    all_anomalies_implying(&targets)
}

/// Union of the expanded prohibited sets of all given models.
#[must_use]
pub fn anomalies_prohibited_by(models: &[ConsistencyModel]) -> BTreeSet<AnomalyKind> {
    models
        .iter()
        .flat_map(|model| model.prohibits_expanded())
        .collect()
}

/// The friendly boundary for a set of detected kinds: which models the
/// detections rule out.
///
/// Returns `(not, also_not)`: the weakest violated models (nothing
/// strictly weaker is violated), and every other violated model.
#[must_use]
pub fn friendly_boundary(detected: &BTreeSet<AnomalyKind>) -> (Vec<ConsistencyModel>, Vec<ConsistencyModel>) {
    let violated: Vec<ConsistencyModel> = ConsistencyModel::ALL
        .into_iter()
        .filter(|model| {
            model
                .prohibits_expanded()
                .iter()
                .any(|kind| detected.contains(kind))
        })
        .collect();

    let not: Vec<ConsistencyModel> = violated
        .iter()
        .copied()
        .filter(|model| {
            !violated
                .iter()
                .any(|other| other != model && other.weaker_or_equal(*model))
        })
        .collect();
    let also_not: Vec<ConsistencyModel> = violated
        .iter()
        .copied()
        .filter(|model| !not.contains(model))
        .collect();

    (not, also_not)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(name: &str) -> AnomalyKind {
        name.parse().unwrap()
    }

    #[test]
    fn implication_closure_pulls_in_witnessing_kinds() {
        // asking about G2 pulls in every anti-dependency family
        let implying = all_anomalies_implying(&[kind("G2")]);
        for name in ["G2", "G2-item", "G-single", "G-nonadjacent"] {
            assert!(implying.contains(&kind(name)), "missing {name}");
        }
        assert!(!implying.contains(&kind("G0")));
        assert!(!implying.contains(&kind("G2-realtime")));
    }

    #[test]
    fn suffix_implication_points_outward() {
        // a plain cycle witnesses the realtime-extended family, not the
        // other way around
        let implying = all_anomalies_implying(&[kind("G0-realtime")]);
        assert!(implying.contains(&kind("G0")));
        assert!(implying.contains(&kind("G0-process")));

        let implying = all_anomalies_implying(&[kind("G0")]);
        assert!(!implying.contains(&kind("G0-realtime")));
    }

    #[test]
    fn serializable_does_not_prohibit_realtime_flavors() {
        let prohibited = ConsistencyModel::Serializable.prohibits_expanded();
        assert!(prohibited.contains(&kind("G-single")));
        assert!(prohibited.contains(&kind("lost-update")));
        assert!(!prohibited.contains(&kind("G-single-realtime")));
    }

    #[test]
    fn strict_serializable_prohibits_everything_cyclic() {
        let prohibited = ConsistencyModel::StrictSerializable.prohibits_expanded();
        for ty in AnomalyType::all() {
            assert!(prohibited.contains(&AnomalyKind::Cycle(ty)), "missing {ty}");
        }
        assert!(prohibited.contains(&AnomalyKind::LostUpdate));
    }

    #[test]
    fn model_strength_chain() {
        use ConsistencyModel::{
            ReadCommitted, ReadUncommitted, Serializable, SnapshotIsolation, StrictSerializable,
        };
        assert!(ReadUncommitted.weaker_or_equal(ReadCommitted));
        assert!(ReadCommitted.weaker_or_equal(SnapshotIsolation));
        assert!(SnapshotIsolation.weaker_or_equal(Serializable));
        assert!(Serializable.weaker_or_equal(StrictSerializable));
        assert!(!Serializable.weaker_or_equal(SnapshotIsolation));
    }

    #[test]
    fn friendly_boundary_reports_weakest_violated() {
        // a G-single violates snapshot isolation directly, and (as a
        // one-antidep G2-item witness) repeatable read and stronger
        let detected: BTreeSet<AnomalyKind> = [kind("G-single")].into_iter().collect();
        let (not, also_not) = friendly_boundary(&detected);
        assert_eq!(not, vec![ConsistencyModel::SnapshotIsolation]);
        assert_eq!(
            also_not,
            vec![
                ConsistencyModel::RepeatableRead,
                ConsistencyModel::Serializable,
                ConsistencyModel::StrictSerializable
            ]
        );
    }

    #[test]
    fn inconclusive_kinds_violate_nothing() {
        let detected: BTreeSet<AnomalyKind> =
            [AnomalyKind::CycleSearchTimeout].into_iter().collect();
        let (not, also_not) = friendly_boundary(&detected);
        assert!(not.is_empty());
        assert!(also_not.is_empty());
    }
}
