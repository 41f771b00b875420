use async_trait::async_trait;
use mesh_types::{Job, NodeState, VerificationResult, Verifier, VerifierError, VerifierKind};
use std::collections::BTreeMap;

use super::{assigned_states, is_failed, result_id};

/// Accepts the results that agree byte for byte, judged by their result
/// pointer (a content address).
///
/// The largest group of identical pointers wins if it is strictly larger
/// than every other group and has at least `deal.confidence` members.
/// Otherwise every result is rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeterministicVerifier;

#[async_trait]
impl Verifier for DeterministicVerifier {
    fn kind(&self) -> VerifierKind {
        VerifierKind::Deterministic
    }

    async fn verify_job(&self, job: &Job) -> Result<Vec<VerificationResult>, VerifierError> {
        let mut groups: BTreeMap<String, usize> = BTreeMap::new();
        for (node, state) in assigned_states(job).filter(|(_, s)| s.state == NodeState::Complete) {
            *groups.entry(result_id(node, state)).or_default() += 1;
        }

        let mut sizes: Vec<(&String, usize)> = groups.iter().map(|(id, n)| (id, *n)).collect();
        sizes.sort_by(|a, b| b.1.cmp(&a.1));
        let required = job.deal.confidence.max(1);
        let winner = match sizes.as_slice() {
            [(id, n), rest @ ..] if *n >= required && rest.first().map_or(true, |(_, m)| m < n) => Some((*id).clone()),
            _ => None,
        };
        match &winner {
            Some(id) => tracing::info!(job_id = %job.id, result_id = %id, "Deterministic verifier found a winning result"),
            None => tracing::warn!(job_id = %job.id, groups = ?groups, required, "No result reached the required agreement"),
        }

        Ok(assigned_states(job)
            .filter(|(_, s)| s.state == NodeState::Complete || is_failed(s))
            .map(|(node, s)| {
                let id = result_id(node, s);
                let verified = s.state == NodeState::Complete && winner.as_ref() == Some(&id);
                VerificationResult::new(job.id.as_str(), node.as_str(), id, s.shard_index, verified)
            })
            .collect())
    }
}
