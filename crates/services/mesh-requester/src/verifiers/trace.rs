use async_trait::async_trait;
use mesh_types::{Job, NodeState, VerificationResult, Verifier, VerifierError, VerifierKind};
use std::path::PathBuf;
use std::sync::Arc;
use trace_consensus::{ConsensusError, TraceConsensus, TraceSet};

use super::{assigned_states, is_failed, result_id};
use crate::metrics;

/// Where resource-usage traces of finished executions come from.
#[async_trait]
pub trait TraceSource: Send + Sync {
    /// Raw trace text recorded by `node_id` while running `job_id`.
    async fn read_trace(&self, job_id: &str, node_id: &str) -> Result<String, VerifierError>;

    async fn is_available(&self) -> bool {
        true
    }
}

/// Traces laid out as `<root>/<job id>/<node id>.trace`.
#[derive(Debug, Clone)]
pub struct DirectoryTraceSource {
    root: PathBuf,
}

impl DirectoryTraceSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn trace_path(&self, job_id: &str, node_id: &str) -> PathBuf {
        self.root.join(job_id).join(format!("{}.trace", node_id))
    }
}

#[async_trait]
impl TraceSource for DirectoryTraceSource {
    async fn read_trace(&self, job_id: &str, node_id: &str) -> Result<String, VerifierError> {
        let path = self.trace_path(job_id, node_id);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| VerifierError::ResultUnavailable {
                job_id: job_id.to_string(),
                reason: format!("{}: {}", path.display(), e),
            })
    }

    async fn is_available(&self) -> bool {
        tokio::fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }
}

/// Accepts the majority cluster of resource-usage traces.
pub struct TraceConsensusVerifier {
    source: Arc<dyn TraceSource>,
    consensus: TraceConsensus,
    default_tolerance: f64,
}

impl TraceConsensusVerifier {
    pub fn new(source: Arc<dyn TraceSource>, consensus: TraceConsensus, default_tolerance: f64) -> Self {
        Self {
            source,
            consensus,
            default_tolerance,
        }
    }

    /// The deal's tolerance when it sets one, the node default otherwise.
    fn tolerance(&self, job: &Job) -> f64 {
        job.deal.tolerance.unwrap_or(self.default_tolerance)
    }
}

#[async_trait]
impl Verifier for TraceConsensusVerifier {
    fn kind(&self) -> VerifierKind {
        VerifierKind::TraceConsensus
    }

    async fn is_installed(&self) -> Result<bool, VerifierError> {
        Ok(self.source.is_available().await)
    }

    async fn verify_job(&self, job: &Job) -> Result<Vec<VerificationResult>, VerifierError> {
        let mut traces = TraceSet::new();
        for node in job.completed_nodes() {
            let text = self.source.read_trace(&job.id, node).await?;
            let kept = traces.add_trace(node, &text);
            tracing::debug!(job_id = %job.id, node_id = %node, samples = kept, "Loaded trace");
        }

        let tolerance = self.tolerance(job);
        tracing::debug!(job_id = %job.id, results = traces.len(), tolerance, "Clustering traces");
        metrics::record_trace_clustering();
        let partition = self.consensus.partition(&traces, tolerance).map_err(|e| match e {
            ConsensusError::NoData => VerifierError::NoData(job.id.clone()),
            ConsensusError::NoMajority(size) => {
                tracing::warn!(job_id = %job.id, cluster_size = size, "Trace clusters are the same size");
                VerifierError::NoMajority(job.id.clone())
            }
            other => VerifierError::Failed {
                job_id: job.id.clone(),
                reason: other.to_string(),
            },
        })?;
        tracing::info!(
            job_id = %job.id,
            accepted = ?partition.accepted,
            rejected = ?partition.rejected,
            tolerance,
            "Trace consensus reached"
        );

        Ok(assigned_states(job)
            .filter(|(_, s)| s.state == NodeState::Complete || is_failed(s))
            .map(|(node, s)| {
                let verified = s.state == NodeState::Complete && partition.accepted.contains(node.as_str());
                VerificationResult::new(job.id.as_str(), node.as_str(), result_id(node, s), s.shard_index, verified)
            })
            .collect())
    }
}
