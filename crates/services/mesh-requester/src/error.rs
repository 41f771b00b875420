use mesh_types::{JobError, VerifierError, VerifierKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Rejected event: {0}")]
    InvalidEvent(#[from] JobError),
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Failed to publish {kind} for job {job_id}: {reason}")]
    Failed {
        job_id: String,
        kind: String,
        reason: String,
    },

    #[error("Publisher ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

#[derive(Error, Debug)]
pub enum RequesterError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Verifier error: {0}")]
    Verifier(#[from] VerifierError),

    #[error("No matching verifier found on this node: {0}")]
    NoVerifier(VerifierKind),

    #[error("Verifier is not installed: {0}")]
    VerifierNotInstalled(VerifierKind),
}

impl RequesterError {
    /// Errors that come from choosing or running the verifier, as opposed to
    /// failing to deliver a notification. These are reported to the network
    /// as a job level error event.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            RequesterError::Verifier(_) | RequesterError::NoVerifier(_) | RequesterError::VerifierNotInstalled(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RequesterError>;
