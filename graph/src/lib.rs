/// Deterministic hashing of ordered value tuples.
pub mod hash;
pub use hash::{ContentHash, TupleHasher};

/// Graph nodes: artifacts and parameter values.
mod node;
pub use node::{Artifact, Node, NodeId, StepId};

/// Per-configuration subgraph construction.
mod build;
pub use build::{DockFileCombo, GraphBuilder};

/// The merged graph and its finalization pass.
mod graph;
pub use graph::{BuildGraph, Edge, StepInstance};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Step \"{0}\" declares output \"{1}\", which another step already produces")]
    DuplicateOutput(String, String),
    #[error("Step \"{0}\" declares output \"{1}\", which an earlier step consumes as input (cycle)")]
    OutputFeedsAncestor(String, String),
    #[error("Cycle detected in build graph at \"{0}\"")]
    CycleDetected(String),
    #[error("Artifact \"{0}\" has more than one producing step")]
    MultipleProducers(String),
    #[error("Configuration produces no \"{0}\" dock file")]
    MissingDockFile(&'static str),
}
