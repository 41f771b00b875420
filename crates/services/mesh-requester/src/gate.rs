//! At-most-once verification of jobs whose assigned nodes have all finished.

use mesh_types::{LocalEventKind, NodeId, Verifier};
use std::sync::Arc;

use crate::dispatcher::NotificationDispatcher;
use crate::error::{RequesterError, Result};
use crate::ledger::EventLedger;
use crate::locks::JobLocks;
use crate::metrics;

/// What a verification attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Not enough results yet; nothing happened.
    NotReady,
    /// The job was verified by an earlier attempt.
    AlreadyVerified,
    Verified {
        accepted: Vec<NodeId>,
        rejected: Vec<NodeId>,
    },
}

/// Runs verification for a job at most once, once execution is complete.
pub struct CompletionGate {
    ledger: Arc<dyn EventLedger>,
    dispatcher: Arc<NotificationDispatcher>,
    locks: JobLocks,
}

impl CompletionGate {
    pub fn new(ledger: Arc<dyn EventLedger>, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self {
            ledger,
            dispatcher,
            locks: JobLocks::new("verification"),
        }
    }

    /// Checks completion and the verified marker under the job's
    /// verification lock, then verifies and notifies every node.
    ///
    /// The marker is only written once every per-node notification went
    /// through, so a failed attempt can simply be retried. A verifier
    /// failure is also reported to the network as a job level error.
    pub async fn attempt_verification(&self, job_id: &str, verifier: &dyn Verifier) -> Result<VerificationOutcome> {
        let _guard = self.locks.lock(job_id).await;
        let job = self.ledger.get_job(job_id).await?;

        let complete = match verifier.is_execution_complete(&job).await {
            Ok(complete) => complete,
            Err(e) => return Err(self.fail(job_id, e.into()).await),
        };
        if !complete {
            tracing::debug!(job_id, "Execution not complete, skipping verification");
            metrics::record_verification_attempt("not_ready");
            return Ok(VerificationOutcome::NotReady);
        }

        if self.ledger.has_local_event(job_id, LocalEventKind::Verified).await? {
            tracing::debug!(job_id, "Job already verified");
            metrics::record_verification_attempt("already_verified");
            return Ok(VerificationOutcome::AlreadyVerified);
        }

        tracing::info!(job_id, verifier = %verifier.kind(), "Verifying job");
        let results = match verifier.verify_job(&job).await {
            Ok(results) => results,
            Err(e) => return Err(self.fail(job_id, e.into()).await),
        };

        if let Err(e) = self.dispatcher.notify_verifications(&results).await {
            metrics::record_verification_attempt("error");
            return Err(e);
        }
        self.dispatcher.notify_verification_complete(job_id).await?;
        metrics::record_verification_attempt("verified");

        let (accepted, rejected): (Vec<_>, Vec<_>) = results.into_iter().partition(|r| r.verified);
        Ok(VerificationOutcome::Verified {
            accepted: accepted.into_iter().map(|r| r.node_id).collect(),
            rejected: rejected.into_iter().map(|r| r.node_id).collect(),
        })
    }

    async fn fail(&self, job_id: &str, error: RequesterError) -> RequesterError {
        tracing::warn!(job_id, "Verification failed: {}", error);
        metrics::record_verification_attempt("error");
        if let Err(e) = self.dispatcher.notify_job_error(job_id, &error).await {
            tracing::error!(job_id, "Failed to report job error: {}", e);
        }
        error
    }
}
