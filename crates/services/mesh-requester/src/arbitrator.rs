//! Bid arbitration against a job's concurrency target.

use mesh_types::{
    BidDecision, Job, JobEvent, JobLocalEvent, LocalEventKind, NodeId, NodeState, REASON_ALREADY_ASSIGNED,
    REASON_OVERSUBSCRIBED,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::sync::Mutex;

use crate::metrics;

/// Decides which bids a job accepts.
///
/// Stateless apart from the random source used when a `min_bids` gate
/// releases several held bids at once. Callers serialize decisions per job.
pub struct BidArbitrator {
    rng: Mutex<StdRng>,
}

impl Default for BidArbitrator {
    fn default() -> Self {
        Self::new()
    }
}

impl BidArbitrator {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic selection order, for tests and replays.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Decisions triggered by one bid.
    ///
    /// `local` are the requester's own bookkeeping events for the job; bids
    /// it accepted count as assignments even before the network has seen
    /// them. Returns no decision while a `min_bids` gate is still collecting
    /// bids, and possibly several when the gate opens.
    pub fn decide(&self, job: &Job, local: &[JobLocalEvent], bid: &JobEvent) -> Vec<BidDecision> {
        let bidder = &bid.source_node_id;
        let assigned = assigned_nodes(job, local);
        let concurrency = job.deal.concurrency;

        if assigned.contains(bidder) {
            tracing::info!(job_id = %job.id, node_id = %bidder, "Rejecting duplicate bid");
            return vec![reject(bidder, bid.shard_index, REASON_ALREADY_ASSIGNED)];
        }
        if assigned.len() >= concurrency {
            tracing::info!(
                job_id = %job.id,
                node_id = %bidder,
                assigned = assigned.len(),
                concurrency,
                "Rejecting bid, job is oversubscribed"
            );
            return vec![reject(bidder, bid.shard_index, REASON_OVERSUBSCRIBED)];
        }

        let min_bids = job.deal.min_bids;
        if min_bids == 0 {
            tracing::info!(job_id = %job.id, node_id = %bidder, shard = bid.shard_index, "Accepting bid");
            return vec![accept(bidder, bid.shard_index)];
        }

        let mut bidders: BTreeSet<&NodeId> = job.state.keys().collect();
        bidders.insert(bidder);
        if bidders.len() <= min_bids {
            tracing::debug!(job_id = %job.id, bids = bidders.len(), min_bids, "Holding bid until enough bids arrive");
            return Vec::new();
        }

        let decided: BTreeSet<&NodeId> = local
            .iter()
            .filter(|e| matches!(e.kind, LocalEventKind::BidAccepted | LocalEventKind::BidRejected))
            .filter_map(|e| e.target_node_id.as_ref())
            .collect();
        let mut candidates: Vec<(NodeId, usize)> = job
            .state
            .iter()
            .filter(|(node, s)| s.state == NodeState::Bidding && !decided.contains(node) && !assigned.contains(*node))
            .map(|(node, s)| (node.clone(), s.shard_index))
            .collect();
        if !candidates.iter().any(|(node, _)| node == bidder) {
            candidates.push((bidder.clone(), bid.shard_index));
        }

        {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            candidates.shuffle(&mut *rng);
        }
        let open = concurrency - assigned.len();
        tracing::info!(
            job_id = %job.id,
            candidates = candidates.len(),
            open,
            "Enough bids received, selecting nodes"
        );
        candidates
            .into_iter()
            .enumerate()
            .map(|(i, (node, shard))| {
                if i < open {
                    accept(&node, shard)
                } else {
                    reject(&node, shard, REASON_OVERSUBSCRIBED)
                }
            })
            .collect()
    }

    /// Decides a batch of bids for one job in order. Each decision is visible
    /// to the ones after it, so the batch never exceeds the concurrency cap.
    pub fn decide_batch(&self, job: &Job, local: &[JobLocalEvent], bids: &[JobEvent]) -> Vec<BidDecision> {
        let mut seen: Vec<JobLocalEvent> = local.to_vec();
        let mut decisions = Vec::new();
        for bid in bids {
            for decision in self.decide(job, &seen, bid) {
                let kind = if decision.accepted {
                    LocalEventKind::BidAccepted
                } else {
                    LocalEventKind::BidRejected
                };
                seen.push(
                    JobLocalEvent::new(kind, job.id.clone())
                        .for_node(decision.target_node_id.clone(), decision.shard_index),
                );
                decisions.push(decision);
            }
        }
        decisions
    }
}

/// Nodes holding an assignment: the folded deal plus bids this requester
/// has already accepted locally.
fn assigned_nodes<'a>(job: &'a Job, local: &'a [JobLocalEvent]) -> BTreeSet<&'a NodeId> {
    let mut assigned: BTreeSet<&NodeId> = job.deal.assigned_nodes.iter().collect();
    assigned.extend(
        local
            .iter()
            .filter(|e| e.kind == LocalEventKind::BidAccepted)
            .filter_map(|e| e.target_node_id.as_ref()),
    );
    assigned
}

fn accept(node: &str, shard: usize) -> BidDecision {
    metrics::record_bid_decision("accepted");
    BidDecision::accept(node, shard)
}

fn reject(node: &str, shard: usize, reason: &str) -> BidDecision {
    metrics::record_bid_decision(if reason == REASON_OVERSUBSCRIBED {
        "oversubscribed"
    } else {
        "already_assigned"
    });
    BidDecision::reject(node, shard, reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_types::{fold, Deal, JobEventKind, JobSpec};

    fn job_with(deal: Deal, history: &[JobEvent]) -> Job {
        let mut events = vec![JobEvent::created("job-1", "requester", JobSpec::default(), deal)];
        events.extend_from_slice(history);
        fold(&events).unwrap()
    }

    fn deal(concurrency: usize, min_bids: usize) -> Deal {
        Deal {
            concurrency,
            min_bids,
            ..Deal::default()
        }
    }

    #[test]
    fn accepts_until_full_then_oversubscribed() {
        let arbitrator = BidArbitrator::with_seed(7);
        let bids: Vec<JobEvent> = ["a", "b", "c", "d"].iter().map(|n| JobEvent::bid("job-1", *n, 0)).collect();
        let job = job_with(deal(3, 0), &bids);

        let decisions = arbitrator.decide_batch(&job, &[], &bids);
        assert_eq!(decisions.len(), 4);
        assert!(decisions[..3].iter().all(|d| d.accepted));
        assert_eq!(decisions[3], BidDecision::reject("d", 0, REASON_OVERSUBSCRIBED));
    }

    #[test]
    fn assigned_node_is_rejected_as_duplicate() {
        let arbitrator = BidArbitrator::new();
        let accepted = JobEvent::new("job-1", JobEventKind::BidAccepted, "requester").with_target("a");
        let job = job_with(deal(1, 0), &[JobEvent::bid("job-1", "a", 0), accepted]);

        // duplicate wins over oversubscribed
        let decisions = arbitrator.decide(&job, &[], &JobEvent::bid("job-1", "a", 0));
        assert_eq!(decisions, vec![BidDecision::reject("a", 0, REASON_ALREADY_ASSIGNED)]);
    }

    #[test]
    fn local_acceptances_count_as_assignments() {
        let arbitrator = BidArbitrator::new();
        let job = job_with(deal(1, 0), &[JobEvent::bid("job-1", "a", 0), JobEvent::bid("job-1", "b", 0)]);
        let local = vec![JobLocalEvent::new(LocalEventKind::BidAccepted, "job-1").for_node("a", 0)];

        let decisions = arbitrator.decide(&job, &local, &JobEvent::bid("job-1", "b", 0));
        assert_eq!(decisions, vec![BidDecision::reject("b", 0, REASON_OVERSUBSCRIBED)]);
    }

    #[test]
    fn min_bids_holds_then_releases_everyone() {
        let arbitrator = BidArbitrator::with_seed(42);
        let first = [JobEvent::bid("job-1", "a", 0), JobEvent::bid("job-1", "b", 0)];
        let job = job_with(deal(2, 2), &first);
        assert!(arbitrator.decide_batch(&job, &[], &first).is_empty());

        let third = JobEvent::bid("job-1", "c", 0);
        let mut all = first.to_vec();
        all.push(third.clone());
        let job = job_with(deal(2, 2), &all);
        let decisions = arbitrator.decide(&job, &[], &third);

        assert_eq!(decisions.len(), 3);
        assert_eq!(decisions.iter().filter(|d| d.accepted).count(), 2);
        let rejected: Vec<_> = decisions.iter().filter(|d| !d.accepted).collect();
        assert_eq!(rejected[0].reason, REASON_OVERSUBSCRIBED);
    }

    #[test]
    fn same_seed_selects_same_nodes() {
        let bids: Vec<JobEvent> = ["a", "b", "c", "d", "e"].iter().map(|n| JobEvent::bid("job-1", *n, 0)).collect();
        let job = job_with(deal(2, 4), &bids);
        let last = bids.last().unwrap();
        let first_run = BidArbitrator::with_seed(1).decide(&job, &[], last);
        let second_run = BidArbitrator::with_seed(1).decide(&job, &[], last);
        assert_eq!(first_run, second_run);
    }
}
