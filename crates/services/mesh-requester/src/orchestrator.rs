//! Routes inbound job events to bid arbitration or verification.

use mesh_types::{BidDecision, Job, JobEvent, JobEventKind, Verifier, VerifierKind};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::arbitrator::BidArbitrator;
use crate::dispatcher::NotificationDispatcher;
use crate::error::{RequesterError, Result};
use crate::gate::{CompletionGate, VerificationOutcome};
use crate::ledger::EventLedger;
use crate::locks::JobLocks;
use crate::publisher::EventPublisher;

/// Decisions made for a batch of bids, plus the first notification failure.
///
/// Decisions are returned even when some notifications failed.
#[derive(Debug)]
pub struct BidBatch {
    pub decisions: Vec<BidDecision>,
    pub error: Option<RequesterError>,
}

impl BidBatch {
    pub fn into_result(self) -> Result<Vec<BidDecision>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.decisions),
        }
    }
}

pub struct JobOrchestrator {
    node_id: String,
    ledger: Arc<dyn EventLedger>,
    dispatcher: Arc<NotificationDispatcher>,
    arbitrator: BidArbitrator,
    gate: CompletionGate,
    bid_locks: JobLocks,
    verifiers: HashMap<VerifierKind, Arc<dyn Verifier>>,
}

impl JobOrchestrator {
    pub fn new(node_id: impl Into<String>, ledger: Arc<dyn EventLedger>, publisher: Arc<dyn EventPublisher>) -> Self {
        let node_id = node_id.into();
        let dispatcher = Arc::new(NotificationDispatcher::new(node_id.clone(), ledger.clone(), publisher));
        Self {
            gate: CompletionGate::new(ledger.clone(), dispatcher.clone()),
            node_id,
            ledger,
            dispatcher,
            arbitrator: BidArbitrator::new(),
            bid_locks: JobLocks::new("bid"),
            verifiers: HashMap::new(),
        }
    }

    pub fn with_arbitrator(mut self, arbitrator: BidArbitrator) -> Self {
        self.arbitrator = arbitrator;
        self
    }

    /// Registers a verifier for the kind it reports, replacing any earlier one.
    pub fn with_verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifiers.insert(verifier.kind(), verifier);
        self
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Handles one inbound event. Events this node emitted itself and events
    /// of jobs owned by other requesters are ignored.
    pub async fn handle_event(&self, event: &JobEvent) -> Result<()> {
        if event.source_node_id == self.node_id {
            return Ok(());
        }
        match event.kind {
            JobEventKind::Bid => {
                if !self.owns(&event.job_id).await? {
                    return Ok(());
                }
                self.handle_bids(&event.job_id, std::slice::from_ref(event))
                    .await?
                    .into_result()
                    .map(|_| ())
            }
            JobEventKind::ResultsProposed | JobEventKind::Error => {
                if !self.owns(&event.job_id).await? {
                    return Ok(());
                }
                self.attempt_verification(&event.job_id).await.map(|_| ())
            }
            _ => {
                tracing::trace!(job_id = %event.job_id, kind = %event.kind, "Ignoring job event");
                Ok(())
            }
        }
    }

    /// Arbitrates a batch of bids for one job under the job's bid lock and
    /// notifies every decision.
    pub async fn handle_bids(&self, job_id: &str, bids: &[JobEvent]) -> Result<BidBatch> {
        let _guard = self.bid_locks.lock(job_id).await;
        let job = self.ledger.get_job(job_id).await?;
        let local = self.ledger.get_local_events(job_id).await?;

        let decisions = self.arbitrator.decide_batch(&job, &local, bids);
        let error = self.dispatcher.notify_bids(job_id, &decisions).await.err();
        Ok(BidBatch { decisions, error })
    }

    /// Verifies the job if it is complete and has not been verified yet.
    pub async fn attempt_verification(&self, job_id: &str) -> Result<VerificationOutcome> {
        let job = self.ledger.get_job(job_id).await?;
        let verifier = match self.verifier_for(&job).await {
            Ok(verifier) => verifier,
            Err(e) => {
                tracing::error!(job_id, "Cannot verify job: {}", e);
                if let Err(notify_err) = self.dispatcher.notify_job_error(job_id, &e).await {
                    tracing::error!(job_id, "Failed to report job error: {}", notify_err);
                }
                return Err(e);
            }
        };
        self.gate.attempt_verification(job_id, verifier.as_ref()).await
    }

    /// The registered verifier for the job's spec, if it is installed.
    pub async fn verifier_for(&self, job: &Job) -> Result<Arc<dyn Verifier>> {
        let kind = job.spec.verifier;
        let verifier = self
            .verifiers
            .get(&kind)
            .cloned()
            .ok_or(RequesterError::NoVerifier(kind))?;
        if !verifier.is_installed().await? {
            return Err(RequesterError::VerifierNotInstalled(kind));
        }
        Ok(verifier)
    }

    /// Consumes events until the channel closes, one task per event.
    pub fn spawn(self: Arc<Self>, mut events: broadcast::Receiver<JobEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let orchestrator = self.clone();
                        tokio::spawn(async move {
                            match orchestrator.handle_event(&event).await {
                                Ok(()) => {}
                                // already reported to the network as a job error
                                Err(e) if e.is_verification_failure() => {
                                    tracing::warn!(job_id = %event.job_id, "Job could not be verified: {}", e);
                                }
                                Err(e) => tracing::error!(
                                    job_id = %event.job_id,
                                    kind = %event.kind,
                                    source = %event.source_node_id,
                                    "Failed to handle job event: {}",
                                    e
                                ),
                            }
                        });
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event loop fell behind, events were dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Job event stream closed, stopping event loop");
                        break;
                    }
                }
            }
        })
    }

    async fn owns(&self, job_id: &str) -> Result<bool> {
        let job = self.ledger.get_job(job_id).await?;
        if job.owner_node_id != self.node_id {
            tracing::debug!(job_id, owner = %job.owner_node_id, "Job owned by another requester");
            return Ok(false);
        }
        Ok(true)
    }
}
