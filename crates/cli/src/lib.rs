//! adya CLI -- generate workloads and check dependency graphs.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use adya_core::graph::DepGraph;
use adya_core::history::{Txn, TxnId};
use adya_core::rels::{Rel, RelSet};
use adya_core::{Analysis, ConsistencyModel};
use clap::{Parser, Subcommand, ValueEnum};
use derive_more::From;
use serde::{Deserialize, Serialize};

#[derive(Debug, Parser)]
#[command(
    name = "adya",
    about = "Detect isolation anomalies in transactional dependency graphs"
)]
pub struct App {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate random transactional histories
    Generate(GenerateArgs),
    /// Check a dependency graph, and the history behind it, for anomalies
    Check(CheckArgs),
}

#[derive(Debug, Parser)]
pub struct GenerateArgs {
    /// Number of histories to generate
    #[arg(long)]
    pub n_hist: u64,
    /// Number of transactions per history
    #[arg(long)]
    pub n_txn: u64,
    /// Key distribution
    #[arg(long, value_enum, default_value = "exponential")]
    pub key_dist: KeyDistArg,
    /// Size of the active-key pool (defaults per distribution)
    #[arg(long)]
    pub key_count: Option<u64>,
    /// Output directory for generated history files
    #[arg(long)]
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KeyDistArg {
    Uniform,
    Exponential,
}

impl From<KeyDistArg> for adya_testgen::KeyDist {
    fn from(dist: KeyDistArg) -> Self {
        match dist {
            KeyDistArg::Uniform => Self::Uniform,
            KeyDistArg::Exponential => Self::Exponential,
        }
    }
}

#[derive(Debug, Parser)]
pub struct CheckArgs {
    /// Input JSON file with the analyzed graph ({"txns": [...], "edges": [...]})
    #[arg(long)]
    pub input: PathBuf,
    /// Consistency models the history is expected to satisfy
    #[arg(long, value_enum, value_delimiter = ',', default_value = "strict-serializable")]
    pub consistency_models: Vec<ModelArg>,
    /// Extra anomaly kinds to flag, by name (e.g. G-single-realtime)
    #[arg(long, value_delimiter = ',')]
    pub anomalies: Vec<String>,
    /// Cycle search budget per strongly connected component, in ms
    #[arg(long, default_value_t = 1000)]
    pub cycle_search_timeout: u64,
    /// Output the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelArg {
    ReadUncommitted,
    ReadCommitted,
    Causal,
    RepeatableRead,
    SnapshotIsolation,
    Serializable,
    StrictSerializable,
}

impl From<ModelArg> for ConsistencyModel {
    fn from(model: ModelArg) -> Self {
        match model {
            ModelArg::ReadUncommitted => Self::ReadUncommitted,
            ModelArg::ReadCommitted => Self::ReadCommitted,
            ModelArg::Causal => Self::Causal,
            ModelArg::RepeatableRead => Self::RepeatableRead,
            ModelArg::SnapshotIsolation => Self::SnapshotIsolation,
            ModelArg::Serializable => Self::Serializable,
            ModelArg::StrictSerializable => Self::StrictSerializable,
        }
    }
}

/// On-disk form of an analyzed history: the transactions plus the labeled
/// dependency edges between them.
#[derive(Debug, Deserialize, Serialize)]
pub struct GraphInput {
    #[serde(default)]
    pub txns: Vec<Txn<String, i64>>,
    pub edges: Vec<EdgeInput>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EdgeInput {
    pub from: u64,
    pub to: u64,
    pub rels: Vec<Rel>,
}

/// Why a [`GraphInput`] could not be loaded or converted.
#[derive(Debug, From)]
pub enum InputError {
    #[from]
    Io(std::io::Error),
    #[from]
    Json(serde_json::Error),
    /// An edge listed no relations.
    EmptyEdge { from: u64, to: u64 },
}

impl Display for InputError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Json(err) => write!(f, "invalid JSON: {err}"),
            Self::EmptyEdge { from, to } => {
                write!(f, "edge T{from} -> T{to} lists no relations")
            }
        }
    }
}

impl std::error::Error for InputError {}

impl GraphInput {
    /// Builds the dependency graph and its SCC analysis.
    ///
    /// # Errors
    ///
    /// [`InputError::EmptyEdge`] if an edge lists no relations.
    pub fn into_parts(self) -> Result<(Vec<Txn<String, i64>>, Analysis), InputError> {
        let mut graph = DepGraph::default();
        for txn in &self.txns {
            graph.add_vertex(txn.id);
        }
        for edge in &self.edges {
            if edge.rels.is_empty() {
                return Err(InputError::EmptyEdge {
                    from: edge.from,
                    to: edge.to,
                });
            }
            let label: RelSet = edge.rels.iter().copied().collect();
            graph.add_edge(TxnId(edge.from), TxnId(edge.to), label);
        }
        Ok((self.txns, Analysis::from_graph(graph)))
    }
}
