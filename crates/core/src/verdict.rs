//! The final verdict: detected anomalies projected onto what the declared
//! consistency models prohibit.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use crate::anomaly::{AnomalyKind, AnomalyMap};
use crate::driver::CheckOptions;
use crate::models::{all_anomalies_implying, anomalies_prohibited_by, friendly_boundary, ConsistencyModel};

/// Three-valued outcome of a check.
#[cfg_attr(
    feature = "serde",
    derive(::serde::Serialize, ::serde::Deserialize),
    serde(rename_all = "lowercase")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// Nothing reportable was detected.
    Valid,
    /// Only inconclusive kinds (timeouts, an empty graph) were detected.
    Unknown,
    /// At least one prohibited anomaly was detected.
    Invalid,
}

impl Display for Validity {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Valid => "valid",
            Self::Unknown => "unknown",
            Self::Invalid => "invalid",
        })
    }
}

/// The result of checking one history against the declared models.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult<K, V> {
    pub valid: Validity,
    /// Sorted kinds of the reportable anomalies.
    pub anomaly_types: Vec<AnomalyKind>,
    /// The reportable anomalies themselves.
    pub anomalies: AnomalyMap<K, V>,
    /// Weakest models ruled out by everything detected.
    pub not: Vec<ConsistencyModel>,
    /// Other models ruled out, all stronger than some entry of `not`.
    pub also_not: Vec<ConsistencyModel>,
}

impl<K, V> CheckResult<K, V> {
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self.valid, Validity::Valid)
    }
}

/// Projects `detected` onto the prohibited and reportable kind sets and
/// renders the verdict.
///
/// Prohibited kinds come from the declared models plus everything
/// implying an explicitly requested extra anomaly. Inconclusive kinds are
/// always reportable but never prohibited: alone they yield `Unknown`.
#[must_use]
pub fn verdict<K, V>(options: &CheckOptions, detected: AnomalyMap<K, V>) -> CheckResult<K, V> {
    let mut prohibited = anomalies_prohibited_by(&options.consistency_models);
    prohibited.extend(all_anomalies_implying(&options.anomalies));

    let detected_kinds: BTreeSet<AnomalyKind> = detected.keys().copied().collect();

    let report: AnomalyMap<K, V> = detected
        .into_iter()
        .filter(|(kind, _)| prohibited.contains(kind) || kind.is_inconclusive())
        .collect();

    if report.is_empty() {
        tracing::debug!("verdict: valid");
        return CheckResult {
            valid: Validity::Valid,
            anomaly_types: Vec::new(),
            anomalies: report,
            not: Vec::new(),
            also_not: Vec::new(),
        };
    }

    let bad = report.keys().any(|kind| prohibited.contains(kind));
    let valid = if bad { Validity::Invalid } else { Validity::Unknown };
    let (not, also_not) = friendly_boundary(&detected_kinds);

    let anomaly_types: Vec<AnomalyKind> = report.keys().copied().collect();
    tracing::debug!(%valid, kinds = anomaly_types.len(), "verdict");

    CheckResult {
        valid,
        anomaly_types,
        anomalies: report,
        not,
        also_not,
    }
}
