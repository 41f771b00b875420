//! Data model shared by the mesh requester: jobs, deals, the job event
//! stream and the verifier seam.

pub mod decision;
pub mod error;
pub mod event;
pub mod job;
pub mod verifier;

pub use decision::{BidDecision, VerificationResult, REASON_ALREADY_ASSIGNED, REASON_OVERSUBSCRIBED};
pub use error::{JobError, VerifierError};
pub use event::{fold, JobEvent, JobEventKind, JobLocalEvent, LocalEventKind};
pub use job::{Deal, Job, JobSpec, NodeId, NodeState, PerNodeJobState, VerifierKind};
pub use verifier::Verifier;
