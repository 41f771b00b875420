#![allow(dead_code)]

use async_trait::async_trait;
use mesh_requester::{EventLedger, EventPublisher, InMemoryLedger, JobOrchestrator, LoopbackPublisher, PublishError};
use mesh_types::{Deal, Job, JobEvent, JobEventKind, JobSpec, VerifierKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const REQUESTER: &str = "requester";
pub const JOB: &str = "job-1";

/// Ledger and loopback publisher shared by a test.
pub struct Harness {
    pub ledger: Arc<InMemoryLedger>,
    pub publisher: Arc<LoopbackPublisher>,
}

impl Harness {
    pub fn new() -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let publisher = Arc::new(LoopbackPublisher::new(ledger.clone(), 64));
        Self { ledger, publisher }
    }

    pub fn orchestrator(&self) -> JobOrchestrator {
        JobOrchestrator::new(REQUESTER, self.ledger.clone(), self.publisher.clone())
    }

    pub async fn create_job(&self, verifier: VerifierKind, deal: Deal) {
        let spec = JobSpec {
            verifier,
            ..JobSpec::default()
        };
        self.ledger
            .append(JobEvent::created(JOB, REQUESTER, spec, deal))
            .await
            .unwrap();
    }

    /// Appends an event as if a compute node had published it.
    pub async fn record(&self, event: &JobEvent) {
        self.ledger.append(event.clone()).await.unwrap();
    }

    /// Records a bid from `node` and the requester's acceptance of it.
    pub async fn assign(&self, node: &str) {
        self.record(&JobEvent::bid(JOB, node, 0)).await;
        self.record(&JobEvent::new(JOB, JobEventKind::BidAccepted, REQUESTER).with_target(node))
            .await;
    }

    pub async fn complete(&self, node: &str, result_pointer: &str) -> JobEvent {
        let event = JobEvent::results_proposed(JOB, node, 0, result_pointer);
        self.record(&event).await;
        event
    }

    pub async fn job(&self) -> Job {
        self.ledger.get_job(JOB).await.unwrap()
    }

    pub async fn events_of(&self, kind: JobEventKind) -> Vec<JobEvent> {
        self.ledger
            .events(JOB)
            .await
            .into_iter()
            .filter(|e| e.kind == kind)
            .collect()
    }
}

pub fn deal(concurrency: usize) -> Deal {
    Deal {
        concurrency,
        ..Deal::default()
    }
}

/// Delegates to an inner publisher, failing the n-th call (1-based).
pub struct FailingPublisher {
    pub inner: Arc<LoopbackPublisher>,
    pub fail_on: usize,
    pub calls: AtomicUsize,
}

impl FailingPublisher {
    pub fn new(inner: Arc<LoopbackPublisher>, fail_on: usize) -> Self {
        Self {
            inner,
            fail_on,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(&self, event: JobEvent) -> Result<(), PublishError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(PublishError::Failed {
                job_id: event.job_id,
                kind: event.kind.to_string(),
                reason: format!("call {} dropped", call),
            });
        }
        self.inner.publish(event).await
    }
}
