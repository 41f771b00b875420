use async_trait::async_trait;
use mesh_types::{event, fold, Job, JobEvent, JobLocalEvent, LocalEventKind};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::LedgerError;

/// Read access to job state plus the requester's private bookkeeping.
#[async_trait]
pub trait EventLedger: Send + Sync {
    /// Current state of a job, folded from its global event history.
    async fn get_job(&self, job_id: &str) -> Result<Job, LedgerError>;

    /// Local events recorded for a job, in the order they were added.
    async fn get_local_events(&self, job_id: &str) -> Result<Vec<JobLocalEvent>, LedgerError>;

    async fn add_local_event(&self, event: JobLocalEvent) -> Result<(), LedgerError>;

    async fn has_local_event(&self, job_id: &str, kind: LocalEventKind) -> Result<bool, LedgerError> {
        Ok(self
            .get_local_events(job_id)
            .await?
            .iter()
            .any(|e| e.kind == kind))
    }
}

// In-memory, event sourced implementation
#[derive(Default)]
pub struct InMemoryLedger {
    events: Arc<RwLock<HashMap<String, Vec<JobEvent>>>>,
    local_events: Arc<RwLock<HashMap<String, Vec<JobLocalEvent>>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a global event and returns the job state after it.
    ///
    /// An event that cannot be applied to the job (unknown job, second
    /// `Created`, missing target) is refused and the stream is left as it was.
    pub async fn append(&self, event: JobEvent) -> Result<Job, LedgerError> {
        let mut events_guard = self.events.write().await;
        let job = match events_guard.get(&event.job_id) {
            Some(history) => {
                let mut job = fold(history)?;
                event::apply(&mut job, &event)?;
                job
            }
            None if event.kind == mesh_types::JobEventKind::Created => event::create(&event)?,
            None => return Err(LedgerError::JobNotFound(event.job_id.clone())),
        };
        tracing::debug!(job_id = %event.job_id, kind = %event.kind, source = %event.source_node_id, "Appended job event");
        events_guard.entry(event.job_id.clone()).or_default().push(event);
        Ok(job)
    }

    /// Full global history of a job.
    pub async fn events(&self, job_id: &str) -> Vec<JobEvent> {
        let events_guard = self.events.read().await;
        events_guard.get(job_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl EventLedger for InMemoryLedger {
    async fn get_job(&self, job_id: &str) -> Result<Job, LedgerError> {
        let events_guard = self.events.read().await;
        let history = events_guard
            .get(job_id)
            .ok_or_else(|| LedgerError::JobNotFound(job_id.to_string()))?;
        Ok(fold(history)?)
    }

    async fn get_local_events(&self, job_id: &str) -> Result<Vec<JobLocalEvent>, LedgerError> {
        let local_guard = self.local_events.read().await;
        Ok(local_guard.get(job_id).cloned().unwrap_or_default())
    }

    async fn add_local_event(&self, event: JobLocalEvent) -> Result<(), LedgerError> {
        let mut local_guard = self.local_events.write().await;
        tracing::trace!(job_id = %event.job_id, kind = %event.kind, "Recorded local event");
        local_guard.entry(event.job_id.clone()).or_default().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_types::{Deal, JobEventKind, JobSpec};

    #[tokio::test]
    async fn append_folds_and_refuses_bad_events() {
        let ledger = InMemoryLedger::new();
        assert!(matches!(
            ledger.append(JobEvent::bid("job-1", "node-a", 0)).await,
            Err(LedgerError::JobNotFound(_))
        ));

        ledger
            .append(JobEvent::created("job-1", "requester", JobSpec::default(), Deal::default()))
            .await
            .unwrap();
        let job = ledger.append(JobEvent::bid("job-1", "node-a", 0)).await.unwrap();
        assert!(job.node_state("node-a").is_some());

        let orphan = JobEvent::new("job-1", JobEventKind::BidAccepted, "requester");
        assert!(matches!(ledger.append(orphan).await, Err(LedgerError::InvalidEvent(_))));
        assert_eq!(ledger.events("job-1").await.len(), 2);
        assert_eq!(ledger.get_job("job-1").await.unwrap(), job);
    }

    #[tokio::test]
    async fn local_events_are_per_job() {
        let ledger = InMemoryLedger::new();
        ledger
            .add_local_event(JobLocalEvent::new(LocalEventKind::Verified, "job-1"))
            .await
            .unwrap();
        assert!(ledger.has_local_event("job-1", LocalEventKind::Verified).await.unwrap());
        assert!(!ledger.has_local_event("job-2", LocalEventKind::Verified).await.unwrap());
        assert!(!ledger.has_local_event("job-1", LocalEventKind::BidAccepted).await.unwrap());
    }
}
