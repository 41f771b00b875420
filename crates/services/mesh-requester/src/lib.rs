//! Requester side of the compute mesh: arbitrates bids for the jobs this
//! node owns and verifies the results compute nodes hand back.

pub mod arbitrator;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod locks;
pub mod metrics;
pub mod orchestrator;
pub mod publisher;
pub mod telemetry;
pub mod verifiers;

pub use arbitrator::BidArbitrator;
pub use config::RequesterConfig;
pub use dispatcher::NotificationDispatcher;
pub use error::{LedgerError, PublishError, RequesterError};
pub use gate::{CompletionGate, VerificationOutcome};
pub use ledger::{EventLedger, InMemoryLedger};
pub use locks::{JobLockGuard, JobLocks};
pub use orchestrator::{BidBatch, JobOrchestrator};
pub use publisher::{EventPublisher, LoopbackPublisher};
pub use verifiers::{DeterministicVerifier, DirectoryTraceSource, NoopVerifier, TraceConsensusVerifier, TraceSource};

use std::sync::Arc;
use trace_consensus::TraceConsensus;

/// Orchestrator wired to the given ledger and publisher with every built-in
/// verifier registered.
pub fn build_orchestrator(
    config: &RequesterConfig,
    ledger: Arc<dyn EventLedger>,
    publisher: Arc<dyn EventPublisher>,
) -> JobOrchestrator {
    let traces = Arc::new(DirectoryTraceSource::new(config.trace_dir.clone()));
    JobOrchestrator::new(config.node_id.clone(), ledger, publisher)
        .with_verifier(Arc::new(NoopVerifier))
        .with_verifier(Arc::new(DeterministicVerifier))
        .with_verifier(Arc::new(TraceConsensusVerifier::new(
            traces,
            TraceConsensus::new(config.waypoints),
            config.default_tolerance,
        )))
}
