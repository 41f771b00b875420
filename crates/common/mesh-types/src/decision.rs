use serde::{Deserialize, Serialize};

use crate::job::NodeId;

/// Reason attached to a bid rejected because the deal is full.
pub const REASON_OVERSUBSCRIBED: &str = "oversubscribed";

/// Reason attached to a bid from a node that already holds an assignment.
pub const REASON_ALREADY_ASSIGNED: &str = "already assigned";

/// Outcome of arbitrating one bid. Never persisted directly: its effect is
/// recorded as `BidAccepted` / `BidRejected` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidDecision {
    pub accepted: bool,
    pub target_node_id: NodeId,
    pub shard_index: usize,
    /// Why the bid was rejected; empty for accepted bids.
    pub reason: String,
}

impl BidDecision {
    pub fn accept(target_node_id: impl Into<String>, shard_index: usize) -> Self {
        Self {
            accepted: true,
            target_node_id: target_node_id.into(),
            shard_index,
            reason: String::new(),
        }
    }

    pub fn reject(target_node_id: impl Into<String>, shard_index: usize, reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            target_node_id: target_node_id.into(),
            shard_index,
            reason: reason.into(),
        }
    }
}

/// Verdict on one node's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub job_id: String,
    pub node_id: NodeId,
    /// Identifies the produced result (its pointer, or the node id when the
    /// node published none).
    pub result_id: String,
    pub shard_index: usize,
    pub verified: bool,
}

impl VerificationResult {
    pub fn new(
        job_id: impl Into<String>,
        node_id: impl Into<String>,
        result_id: impl Into<String>,
        shard_index: usize,
        verified: bool,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            node_id: node_id.into(),
            result_id: result_id.into(),
            shard_index,
            verified,
        }
    }
}
