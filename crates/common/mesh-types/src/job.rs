use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::Display;

/// Node identifiers are opaque strings (peer ids on the wire).
pub type NodeId = String;

/// Which verification strategy a job asks its requester to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, Default)]
pub enum VerifierKind {
    /// Accept every completed result without checking it.
    #[default]
    Noop,
    /// Group results by their result pointer and accept the majority group.
    Deterministic,
    /// Cluster resource-usage traces and accept the majority cluster.
    TraceConsensus,
}

/// The deal a client has made with the network for one job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deal {
    /// How many compute nodes should run the job redundantly.
    pub concurrency: usize,

    /// Minimum size of the winning group for the deterministic verifier.
    #[serde(default)]
    pub confidence: usize,

    /// How many distinct bids must arrive before any of them is accepted.
    /// Zero means every bid is decided as soon as it arrives.
    #[serde(default)]
    pub min_bids: usize,

    /// Distance below which two trace cluster centers are treated as equal.
    /// `None` leaves the choice to the requester's configured default.
    #[serde(default)]
    pub tolerance: Option<f64>,

    /// Nodes whose bids were accepted, in acceptance order.
    #[serde(default)]
    pub assigned_nodes: Vec<NodeId>,
}

impl Default for Deal {
    fn default() -> Self {
        Self {
            concurrency: 1,
            confidence: 0,
            min_bids: 0,
            tolerance: None,
            assigned_nodes: Vec::new(),
        }
    }
}

impl Deal {
    pub fn is_assigned(&self, node_id: &str) -> bool {
        self.assigned_nodes.iter().any(|n| n == node_id)
    }
}

/// Execution parameters of a job. Everything but the verifier tag and the
/// shard count is opaque to the requester.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSpec {
    #[serde(default)]
    pub verifier: VerifierKind,

    /// Number of shards the work is split into.
    #[serde(default = "default_shards")]
    pub shards: usize,

    /// Engine specific payload, passed through untouched.
    #[serde(default)]
    pub payload: serde_json::Value,
}

fn default_shards() -> usize {
    1
}

impl Default for JobSpec {
    fn default() -> Self {
        Self {
            verifier: VerifierKind::default(),
            shards: default_shards(),
            payload: serde_json::Value::Null,
        }
    }
}

/// Lifecycle of one compute node's involvement in a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum NodeState {
    Bidding,
    BidRejected,
    Running,
    Error,
    Complete,
}

impl NodeState {
    /// A node in a terminal state will not contribute anything further.
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeState::Error | NodeState::Complete | NodeState::BidRejected)
    }
}

/// One compute node's contribution to a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerNodeJobState {
    pub state: NodeState,

    /// Human readable status text.
    pub status: String,

    pub shard_index: usize,

    /// Opaque reference to the externally stored output.
    pub result_pointer: Option<String>,

    /// `Some(true)` once the requester accepted the result, `Some(false)`
    /// once it rejected it.
    pub verified: Option<bool>,
}

impl PerNodeJobState {
    pub fn new(state: NodeState, shard_index: usize) -> Self {
        Self {
            state,
            status: String::new(),
            shard_index,
            result_pointer: None,
            verified: None,
        }
    }
}

/// A job as seen by the requester: the left fold of its event stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: String,

    /// The requester node that owns arbitration and verification.
    pub owner_node_id: NodeId,

    pub spec: JobSpec,

    pub deal: Deal,

    /// Per-node progress, keyed by node id.
    pub state: BTreeMap<NodeId, PerNodeJobState>,

    /// Set when the requester reported a job level failure.
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: impl Into<String>, owner_node_id: impl Into<String>, spec: JobSpec, deal: Deal) -> Self {
        Self {
            id: id.into(),
            owner_node_id: owner_node_id.into(),
            spec,
            deal,
            state: BTreeMap::new(),
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn node_state(&self, node_id: &str) -> Option<&PerNodeJobState> {
        self.state.get(node_id)
    }

    /// Assigned nodes that reported a final result.
    pub fn completed_nodes(&self) -> Vec<&NodeId> {
        self.deal
            .assigned_nodes
            .iter()
            .filter(|n| matches!(self.state.get(*n), Some(s) if s.state == NodeState::Complete))
            .collect()
    }

    /// True when every assigned node has reached a terminal state.
    pub fn all_assigned_terminal(&self) -> bool {
        !self.deal.assigned_nodes.is_empty()
            && self
                .deal
                .assigned_nodes
                .iter()
                .all(|n| self.state.get(n).map_or(false, |s| s.state.is_terminal()))
    }

    /// Default completion rule shared by the built-in verifiers: enough nodes
    /// completed, or the deal is fully assigned and nobody is still running.
    pub fn is_execution_complete(&self) -> bool {
        let concurrency = self.deal.concurrency;
        self.completed_nodes().len() >= concurrency
            || (self.deal.assigned_nodes.len() >= concurrency && self.all_assigned_terminal())
    }
}
