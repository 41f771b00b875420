//! Outbound notifications for bid and verification decisions.
//!
//! Each decision is published to the network before its local event is
//! recorded; a failed publish records nothing locally.

use mesh_types::{BidDecision, JobEvent, JobEventKind, JobLocalEvent, LocalEventKind, VerificationResult};
use std::sync::Arc;

use crate::error::{RequesterError, Result};
use crate::ledger::EventLedger;
use crate::metrics;
use crate::publisher::EventPublisher;

/// Turns decisions into an outbound job event for the affected node plus a
/// local bookkeeping event for the requester itself.
pub struct NotificationDispatcher {
    node_id: String,
    ledger: Arc<dyn EventLedger>,
    publisher: Arc<dyn EventPublisher>,
}

impl NotificationDispatcher {
    pub fn new(node_id: impl Into<String>, ledger: Arc<dyn EventLedger>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            node_id: node_id.into(),
            ledger,
            publisher,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub async fn notify_bid(&self, job_id: &str, decision: &BidDecision) -> Result<()> {
        let (kind, local_kind) = if decision.accepted {
            (JobEventKind::BidAccepted, LocalEventKind::BidAccepted)
        } else {
            (JobEventKind::BidRejected, LocalEventKind::BidRejected)
        };
        let event = JobEvent::new(job_id, kind, self.node_id.as_str())
            .with_target(decision.target_node_id.clone())
            .with_shard(decision.shard_index)
            .with_status(decision.reason.clone());
        self.publisher.publish(event).await?;
        self.ledger
            .add_local_event(
                JobLocalEvent::new(local_kind, job_id).for_node(decision.target_node_id.clone(), decision.shard_index),
            )
            .await?;
        Ok(())
    }

    /// Notifies every decision even if some fail; returns the first failure.
    pub async fn notify_bids(&self, job_id: &str, decisions: &[BidDecision]) -> Result<()> {
        let mut first_error = None;
        for decision in decisions {
            if let Err(e) = self.notify_bid(job_id, decision).await {
                tracing::error!(job_id, node_id = %decision.target_node_id, "Failed to notify bid decision: {}", e);
                metrics::record_dispatch_failure();
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub async fn notify_verification(&self, result: &VerificationResult) -> Result<()> {
        let (kind, local_kind, status) = if result.verified {
            (JobEventKind::ResultsAccepted, LocalEventKind::ResultsAccepted, "results accepted")
        } else {
            (JobEventKind::ResultsRejected, LocalEventKind::ResultsRejected, "results rejected")
        };
        let mut event = JobEvent::new(result.job_id.as_str(), kind, self.node_id.as_str())
            .with_target(result.node_id.clone())
            .with_shard(result.shard_index)
            .with_status(status);
        event.result_pointer = Some(result.result_id.clone());
        event.verification = Some(result.clone());
        self.publisher.publish(event).await?;
        self.ledger
            .add_local_event(
                JobLocalEvent::new(local_kind, result.job_id.as_str()).for_node(result.node_id.clone(), result.shard_index),
            )
            .await?;
        metrics::record_result_verdict(result.verified);
        Ok(())
    }

    /// Notifies every verdict even if some fail; returns the first failure.
    pub async fn notify_verifications(&self, results: &[VerificationResult]) -> Result<()> {
        let mut first_error = None;
        for result in results {
            if let Err(e) = self.notify_verification(result).await {
                tracing::error!(
                    job_id = %result.job_id,
                    node_id = %result.node_id,
                    "Failed to notify verification result: {}",
                    e
                );
                metrics::record_dispatch_failure();
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Records that the job has been verified. Local only.
    pub async fn notify_verification_complete(&self, job_id: &str) -> Result<()> {
        self.ledger
            .add_local_event(JobLocalEvent::new(LocalEventKind::Verified, job_id))
            .await?;
        tracing::info!(job_id, "Job verification complete");
        Ok(())
    }

    /// Publishes a job level error, addressed to no particular node.
    pub async fn notify_job_error(&self, job_id: &str, error: &RequesterError) -> Result<()> {
        let event = JobEvent::new(job_id, JobEventKind::Error, self.node_id.as_str()).with_status(error.to_string());
        self.publisher.publish(event).await.map_err(|e| {
            metrics::record_dispatch_failure();
            RequesterError::from(e)
        })
    }
}
