//! Built-in verification strategies, selected by [`mesh_types::VerifierKind`].

mod deterministic;
mod noop;
mod trace;

pub use deterministic::DeterministicVerifier;
pub use noop::NoopVerifier;
pub use trace::{DirectoryTraceSource, TraceConsensusVerifier, TraceSource};

use mesh_types::{Job, NodeState, PerNodeJobState};

/// Assigned nodes with their state, skipping nodes that never reported.
pub(crate) fn assigned_states(job: &Job) -> impl Iterator<Item = (&String, &PerNodeJobState)> {
    job.deal
        .assigned_nodes
        .iter()
        .filter_map(move |node| job.state.get(node).map(|s| (node, s)))
}

/// Identifier of a node's result: its pointer, or the node id if it has none.
pub(crate) fn result_id(node: &str, state: &PerNodeJobState) -> String {
    state.result_pointer.clone().unwrap_or_else(|| node.to_string())
}

pub(crate) fn is_failed(state: &PerNodeJobState) -> bool {
    state.state == NodeState::Error
}
