use async_trait::async_trait;

use crate::decision::VerificationResult;
use crate::error::VerifierError;
use crate::job::{Job, VerifierKind};

/// A pluggable verification strategy, selected by the tag on the job spec.
#[async_trait]
pub trait Verifier: Send + Sync {
    fn kind(&self) -> VerifierKind;

    /// Whether the verifier's external dependencies are present.
    async fn is_installed(&self) -> Result<bool, VerifierError> {
        Ok(true)
    }

    /// Whether enough results have arrived to start verifying.
    async fn is_execution_complete(&self, job: &Job) -> Result<bool, VerifierError> {
        Ok(job.is_execution_complete())
    }

    /// Decides which results to accept. Must not have side effects: the
    /// requester may call it again after a failed attempt.
    async fn verify_job(&self, job: &Job) -> Result<Vec<VerificationResult>, VerifierError>;
}
