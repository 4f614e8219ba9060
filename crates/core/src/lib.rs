//! Detects transactional isolation anomalies in recorded histories.
//!
//! Given a multi-relational dependency graph between transactions
//! (write-write, write-read, read-write, process- and realtime-order
//! edges), this crate classifies cycles into the Adya taxonomy (G0, G1c,
//! G-single, G-nonadjacent, G2-item, G2, with process/realtime variants),
//! scans committed transactions for the lost-update pattern, and renders
//! a verdict against a set of declared consistency models.
//!
//! The graph itself is built by a history analyzer outside this crate;
//! [`check`] takes its output (an [`Analysis`]) together with the raw
//! history and a [`PairExplainer`](anomaly::PairExplainer) for rendering
//! witnesses.

pub mod anomaly;
pub mod driver;
pub mod graph;
pub mod history;
pub mod lost_update;
pub mod models;
pub mod rels;
pub mod search;
pub mod verdict;

pub use anomaly::{Anomaly, AnomalyKind, AnomalyMap, AnomalyType};
pub use driver::{check, cycles, Analysis, CheckOptions};
pub use models::ConsistencyModel;
pub use verdict::{CheckResult, Validity};
