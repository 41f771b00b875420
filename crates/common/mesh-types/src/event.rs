//! Job events and the fold that turns an event stream into a [`Job`].
//!
//! The global event stream is append-only and is the only source of truth
//! for job state. Local events never leave the requester; they record what
//! the requester has already decided so that handlers stay idempotent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::decision::VerificationResult;
use crate::error::JobError;
use crate::job::{Deal, Job, JobSpec, NodeId, NodeState, PerNodeJobState};

/// Kinds of event exchanged between requester and compute nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum JobEventKind {
    Created,
    Bid,
    BidAccepted,
    BidRejected,
    ResultsProposed,
    Error,
    ResultsAccepted,
    ResultsRejected,
    DealUpdated,
}

/// An immutable fact about a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobEvent {
    pub job_id: String,

    pub kind: JobEventKind,

    /// The node that emitted this event.
    pub source_node_id: NodeId,

    /// The node this event is about, e.g. the bidder for `BidAccepted`.
    /// `None` for job level events.
    pub target_node_id: Option<NodeId>,

    pub shard_index: usize,

    /// Human readable status, set on rejections and errors.
    #[serde(default)]
    pub status: String,

    /// Only set on `Created` events.
    pub spec: Option<JobSpec>,

    /// Set on `Created` and `DealUpdated` events.
    pub deal: Option<Deal>,

    /// Pointer to the stored output, set on `ResultsProposed`.
    pub result_pointer: Option<String>,

    /// Set on `ResultsAccepted` and `ResultsRejected`.
    pub verification: Option<VerificationResult>,

    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(job_id: impl Into<String>, kind: JobEventKind, source_node_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            kind,
            source_node_id: source_node_id.into(),
            target_node_id: None,
            shard_index: 0,
            status: String::new(),
            spec: None,
            deal: None,
            result_pointer: None,
            verification: None,
            timestamp: Utc::now(),
        }
    }

    pub fn created(job_id: impl Into<String>, requester: impl Into<String>, spec: JobSpec, deal: Deal) -> Self {
        let mut event = Self::new(job_id, JobEventKind::Created, requester);
        event.spec = Some(spec);
        event.deal = Some(deal);
        event
    }

    pub fn bid(job_id: impl Into<String>, bidder: impl Into<String>, shard_index: usize) -> Self {
        Self::new(job_id, JobEventKind::Bid, bidder).with_shard(shard_index)
    }

    pub fn results_proposed(
        job_id: impl Into<String>,
        node: impl Into<String>,
        shard_index: usize,
        result_pointer: impl Into<String>,
    ) -> Self {
        let mut event = Self::new(job_id, JobEventKind::ResultsProposed, node).with_shard(shard_index);
        event.result_pointer = Some(result_pointer.into());
        event
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_node_id = Some(target.into());
        self
    }

    pub fn with_shard(mut self, shard_index: usize) -> Self {
        self.shard_index = shard_index;
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// The node whose per-node state this event changes.
    fn subject(&self) -> Result<&NodeId, JobError> {
        match self.kind {
            JobEventKind::Bid | JobEventKind::ResultsProposed | JobEventKind::Error => {
                Ok(&self.source_node_id)
            }
            _ => self
                .target_node_id
                .as_ref()
                .ok_or(JobError::MissingTarget(self.kind)),
        }
    }
}

/// Requester-private bookkeeping events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum LocalEventKind {
    BidAccepted,
    BidRejected,
    ResultsAccepted,
    ResultsRejected,
    /// Idempotency marker: the job has been verified.
    Verified,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobLocalEvent {
    pub kind: LocalEventKind,
    pub job_id: String,
    pub shard_index: usize,
    pub target_node_id: Option<NodeId>,
}

impl JobLocalEvent {
    pub fn new(kind: LocalEventKind, job_id: impl Into<String>) -> Self {
        Self {
            kind,
            job_id: job_id.into(),
            shard_index: 0,
            target_node_id: None,
        }
    }

    pub fn for_node(mut self, node_id: impl Into<String>, shard_index: usize) -> Self {
        self.target_node_id = Some(node_id.into());
        self.shard_index = shard_index;
        self
    }
}

/// Rebuilds a job from its full event history.
///
/// The first event must be `Created`.
pub fn fold<'a, I>(events: I) -> Result<Job, JobError>
where
    I: IntoIterator<Item = &'a JobEvent>,
{
    let mut iter = events.into_iter();
    let first = iter.next().ok_or(JobError::EmptyHistory)?;
    let mut job = create(first)?;
    for event in iter {
        apply(&mut job, event)?;
    }
    Ok(job)
}

/// Builds the initial job from a `Created` event.
pub fn create(event: &JobEvent) -> Result<Job, JobError> {
    if event.kind != JobEventKind::Created {
        return Err(JobError::NotCreated {
            job_id: event.job_id.clone(),
            kind: event.kind,
        });
    }
    let mut job = Job::new(
        event.job_id.clone(),
        event.source_node_id.clone(),
        event.spec.clone().unwrap_or_default(),
        event.deal.clone().unwrap_or_default(),
    );
    job.created_at = event.timestamp;
    Ok(job)
}

/// Applies one event to a job. Pure: the result depends only on the inputs.
pub fn apply(job: &mut Job, event: &JobEvent) -> Result<(), JobError> {
    if event.job_id != job.id {
        return Err(JobError::WrongJob {
            expected: job.id.clone(),
            actual: event.job_id.clone(),
        });
    }

    match event.kind {
        JobEventKind::Created => {
            return Err(JobError::AlreadyCreated(job.id.clone()));
        }
        JobEventKind::DealUpdated => {
            if let Some(deal) = &event.deal {
                let assigned = std::mem::take(&mut job.deal.assigned_nodes);
                job.deal = Deal {
                    assigned_nodes: assigned,
                    ..deal.clone()
                };
            }
            return Ok(());
        }
        JobEventKind::Error if event.target_node_id.is_none() && event.source_node_id == job.owner_node_id => {
            job.error = Some(event.status.clone());
            return Ok(());
        }
        _ => {}
    }

    let node = event.subject()?.clone();
    // a repeated bid and its rejection leave an assigned node's progress alone
    if matches!(event.kind, JobEventKind::Bid | JobEventKind::BidRejected) && job.deal.is_assigned(&node) {
        return Ok(());
    }
    let entry = job
        .state
        .entry(node.clone())
        .or_insert_with(|| PerNodeJobState::new(NodeState::Bidding, event.shard_index));
    entry.shard_index = event.shard_index;
    if !event.status.is_empty() {
        entry.status = event.status.clone();
    }

    match event.kind {
        JobEventKind::Bid => entry.state = NodeState::Bidding,
        JobEventKind::BidAccepted => {
            entry.state = NodeState::Running;
            if !job.deal.is_assigned(&node) {
                job.deal.assigned_nodes.push(node);
            }
        }
        JobEventKind::BidRejected => entry.state = NodeState::BidRejected,
        JobEventKind::ResultsProposed => {
            entry.state = NodeState::Complete;
            entry.result_pointer = event.result_pointer.clone();
        }
        JobEventKind::Error => entry.state = NodeState::Error,
        JobEventKind::ResultsAccepted => entry.verified = Some(true),
        JobEventKind::ResultsRejected => entry.verified = Some(false),
        JobEventKind::Created | JobEventKind::DealUpdated => {}
    }
    Ok(())
}
