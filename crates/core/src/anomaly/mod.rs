//! The anomaly taxonomy: cycle types, detected-anomaly payloads, and the
//! map the checker accumulates them in.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::lost_update::LostUpdateCase;

pub mod explain;
pub mod specs;

pub use explain::{CycleExplanation, PairExplainer, RelsExplainer, Step};

/// The data-dependency shape of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataDep {
    /// Write-write edges only (dirty write).
    G0,
    /// Write-write and write-read edges (dirty read / circular information
    /// flow).
    G1c,
    /// Exactly one anti-dependency edge.
    GSingle,
    /// Two or more anti-dependency edges, never adjacent.
    GNonadjacent,
    /// Two or more anti-dependency edges, some adjacent, all item-level.
    G2Item,
    /// Anti-dependency cycle involving a predicate read.
    G2,
}

impl DataDep {
    pub const ALL: [Self; 6] = [
        Self::G0,
        Self::G1c,
        Self::GSingle,
        Self::GNonadjacent,
        Self::G2Item,
        Self::G2,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::G0 => "G0",
            Self::G1c => "G1c",
            Self::GSingle => "G-single",
            Self::GNonadjacent => "G-nonadjacent",
            Self::G2Item => "G2-item",
            Self::G2 => "G2",
        }
    }
}

/// Which ordering relation, if any, a cycle additionally leans on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OrderSuffix {
    None,
    Process,
    Realtime,
}

impl OrderSuffix {
    pub const ALL: [Self; 3] = [Self::None, Self::Process, Self::Realtime];
}

/// A classified cycle type: data-dependency base plus order suffix, e.g.
/// `G-single-realtime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnomalyType {
    pub base: DataDep,
    pub suffix: OrderSuffix,
}

impl AnomalyType {
    #[must_use]
    pub const fn new(base: DataDep, suffix: OrderSuffix) -> Self {
        Self { base, suffix }
    }

    #[must_use]
    pub const fn plain(base: DataDep) -> Self {
        Self::new(base, OrderSuffix::None)
    }

    /// All 18 cycle types, bases within suffix, plain first.
    #[must_use]
    pub fn all() -> Vec<Self> {
        OrderSuffix::ALL
            .into_iter()
            .flat_map(|suffix| {
                DataDep::ALL
                    .into_iter()
                    .map(move |base| Self::new(base, suffix))
            })
            .collect()
    }
}

impl Display for AnomalyType {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.base.name())?;
        match self.suffix {
            OrderSuffix::None => Ok(()),
            OrderSuffix::Process => f.write_str("-process"),
            OrderSuffix::Realtime => f.write_str("-realtime"),
        }
    }
}

/// Failed to parse an anomaly name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAnomalyError(String);

impl Display for ParseAnomalyError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "unknown anomaly name: {}", self.0)
    }
}

impl std::error::Error for ParseAnomalyError {}

impl FromStr for AnomalyType {
    type Err = ParseAnomalyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base_name, suffix) = if let Some(stripped) = s.strip_suffix("-realtime") {
            (stripped, OrderSuffix::Realtime)
        } else if let Some(stripped) = s.strip_suffix("-process") {
            (stripped, OrderSuffix::Process)
        } else {
            (s, OrderSuffix::None)
        };
        let base = DataDep::ALL
            .into_iter()
            .find(|base| base.name() == base_name)
            .ok_or_else(|| ParseAnomalyError(s.to_string()))?;
        Ok(Self::new(base, suffix))
    }
}

/// Everything the checker can report: the 18 cycle types plus the
/// lost-update pattern and the two inconclusive kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnomalyKind {
    Cycle(AnomalyType),
    LostUpdate,
    /// The per-SCC search budget expired. Inconclusive, not invalid.
    CycleSearchTimeout,
    /// The dependency graph had no vertices. Inconclusive, not invalid.
    EmptyTransactionGraph,
}

impl AnomalyKind {
    /// `true` for kinds whose presence proves nothing by itself: they make
    /// the verdict unknown rather than invalid.
    #[must_use]
    pub const fn is_inconclusive(self) -> bool {
        matches!(self, Self::CycleSearchTimeout | Self::EmptyTransactionGraph)
    }
}

impl From<AnomalyType> for AnomalyKind {
    fn from(ty: AnomalyType) -> Self {
        Self::Cycle(ty)
    }
}

impl Display for AnomalyKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Cycle(ty) => write!(f, "{ty}"),
            Self::LostUpdate => f.write_str("lost-update"),
            Self::CycleSearchTimeout => f.write_str("cycle-search-timeout"),
            Self::EmptyTransactionGraph => f.write_str("empty-transaction-graph"),
        }
    }
}

impl FromStr for AnomalyKind {
    type Err = ParseAnomalyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lost-update" => Ok(Self::LostUpdate),
            "cycle-search-timeout" => Ok(Self::CycleSearchTimeout),
            "empty-transaction-graph" => Ok(Self::EmptyTransactionGraph),
            other => other.parse::<AnomalyType>().map(Self::Cycle),
        }
    }
}

// Anomaly names are the serialized form: "G-single-realtime", not a
// nested enum encoding. Keeps JSON keys and values readable.

#[cfg(feature = "serde")]
mod string_serde {
    use super::{AnomalyKind, AnomalyType};

    macro_rules! as_string {
        ($ty:ty) => {
            impl ::serde::Serialize for $ty {
                fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
                where
                    S: ::serde::Serializer,
                {
                    serializer.collect_str(self)
                }
            }

            impl<'de> ::serde::Deserialize<'de> for $ty {
                fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
                where
                    D: ::serde::Deserializer<'de>,
                {
                    let s = <::std::string::String as ::serde::Deserialize>::deserialize(
                        deserializer,
                    )?;
                    s.parse().map_err(::serde::de::Error::custom)
                }
            }
        };
    }

    as_string!(AnomalyType);
    as_string!(AnomalyKind);
}

/// What a timeout interrupted: the spec that was running, the specs that
/// had already been fully evaluated, and how big the component was.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutInfo {
    pub anomaly_spec_type: AnomalyType,
    pub checked: Vec<AnomalyType>,
    pub scc_size: usize,
}

/// One detected anomaly.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly<K, V> {
    Cycle(CycleExplanation),
    LostUpdate(LostUpdateCase<K, V>),
    CycleSearchTimeout(TimeoutInfo),
    EmptyTransactionGraph,
}

impl<K, V> Anomaly<K, V> {
    #[must_use]
    pub fn kind(&self) -> AnomalyKind {
        match self {
            Self::Cycle(explanation) => AnomalyKind::Cycle(explanation.ty),
            Self::LostUpdate(_) => AnomalyKind::LostUpdate,
            Self::CycleSearchTimeout(_) => AnomalyKind::CycleSearchTimeout,
            Self::EmptyTransactionGraph => AnomalyKind::EmptyTransactionGraph,
        }
    }
}

/// Detected anomalies, grouped by kind. Ordered so reports list kinds in
/// a stable, sorted order.
pub type AnomalyMap<K, V> = BTreeMap<AnomalyKind, Vec<Anomaly<K, V>>>;
