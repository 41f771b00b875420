use thiserror::Error;

use crate::event::JobEventKind;

/// Errors raised while folding events into a job.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobError {
    #[error("Cannot fold an empty event history")]
    EmptyHistory,

    #[error("First event of job {job_id} must be Created, got {kind}")]
    NotCreated { job_id: String, kind: JobEventKind },

    #[error("Job {0} was already created")]
    AlreadyCreated(String),

    #[error("Event for job {actual} applied to job {expected}")]
    WrongJob { expected: String, actual: String },

    #[error("{0} event is missing its target node")]
    MissingTarget(JobEventKind),
}

/// Errors a verifier can report. All of them abort the verification
/// attempt and leave the job unverified so a later attempt can retry.
#[derive(Error, Debug)]
pub enum VerifierError {
    #[error("Could not read results for job {job_id}: {reason}")]
    ResultUnavailable { job_id: String, reason: String },

    #[error("No data to verify job {0}")]
    NoData(String),

    #[error("No majority among the results of job {0}")]
    NoMajority(String),

    #[error("Verification of job {job_id} failed: {reason}")]
    Failed { job_id: String, reason: String },
}
