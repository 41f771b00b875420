use async_trait::async_trait;
use mesh_types::JobEvent;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::PublishError;
use crate::ledger::InMemoryLedger;

/// Outbound side of the job event stream.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes one event. Failures are returned as-is; nothing is retried.
    async fn publish(&self, event: JobEvent) -> Result<(), PublishError>;
}

/// Publisher that writes straight into an [`InMemoryLedger`] and fans every
/// accepted event out to local subscribers.
pub struct LoopbackPublisher {
    ledger: Arc<InMemoryLedger>,
    sender: broadcast::Sender<JobEvent>,
}

impl LoopbackPublisher {
    pub fn new(ledger: Arc<InMemoryLedger>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { ledger, sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    pub fn ledger(&self) -> &Arc<InMemoryLedger> {
        &self.ledger
    }
}

#[async_trait]
impl EventPublisher for LoopbackPublisher {
    async fn publish(&self, event: JobEvent) -> Result<(), PublishError> {
        self.ledger.append(event.clone()).await?;
        if self.sender.send(event).is_err() {
            tracing::debug!("No active subscribers for job events");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_types::{Deal, JobSpec};

    #[tokio::test]
    async fn published_events_reach_ledger_and_subscribers() {
        let ledger = Arc::new(InMemoryLedger::new());
        let publisher = LoopbackPublisher::new(ledger.clone(), 8);
        let mut rx = publisher.subscribe();

        let created = JobEvent::created("job-1", "requester", JobSpec::default(), Deal::default());
        publisher.publish(created.clone()).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), created);
        assert_eq!(ledger.events("job-1").await, vec![created]);
    }

    #[tokio::test]
    async fn refused_events_are_not_broadcast() {
        let ledger = Arc::new(InMemoryLedger::new());
        let publisher = LoopbackPublisher::new(ledger, 8);
        let mut rx = publisher.subscribe();

        let err = publisher.publish(JobEvent::bid("missing", "node-a", 0)).await.unwrap_err();
        assert!(matches!(err, PublishError::Ledger(_)));
        assert!(rx.try_recv().is_err());
    }
}
