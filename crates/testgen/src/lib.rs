//! Synthetic transactional workloads for exercising the anomaly checker.

pub mod generator;

pub use generator::{GeneratorParams, History, KeyDist};
