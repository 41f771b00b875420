//! One-dimensional 2-means and the accept/reject partition built on it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ConsensusError, Result};

const MAX_ITERATIONS: usize = 100;

/// Result of 2-means over scalar scores.
#[derive(Debug, Clone, PartialEq)]
pub struct TwoMeans {
    pub centers: [f64; 2],
    pub members: [Vec<String>; 2],
}

impl TwoMeans {
    pub fn center_distance(&self) -> f64 {
        (self.centers[0] - self.centers[1]).abs()
    }
}

/// Lloyd's algorithm with k = 2, seeded with the smallest and largest score.
///
/// Points equidistant from both centers go to the first cluster. An empty
/// cluster keeps its previous center.
pub fn two_means(points: &BTreeMap<String, f64>) -> TwoMeans {
    let (min, max) = points
        .values()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let mut centers = [min, max];
    let mut assignment: Vec<usize> = vec![usize::MAX; points.len()];

    for iteration in 0..MAX_ITERATIONS {
        let next: Vec<usize> = points
            .values()
            .map(|v| {
                if (v - centers[0]).abs() <= (v - centers[1]).abs() {
                    0
                } else {
                    1
                }
            })
            .collect();
        if next == assignment {
            tracing::trace!(iteration, "2-means converged");
            break;
        }
        assignment = next;

        for (cluster, center) in centers.iter_mut().enumerate() {
            let (sum, count) = points
                .values()
                .zip(&assignment)
                .filter(|(_, a)| **a == cluster)
                .fold((0.0, 0usize), |(s, c), (v, _)| (s + v, c + 1));
            if count > 0 {
                *center = sum / count as f64;
            }
        }
    }

    let mut members: [Vec<String>; 2] = [Vec::new(), Vec::new()];
    for (id, cluster) in points.keys().zip(&assignment) {
        members[*cluster].push(id.clone());
    }
    TwoMeans { centers, members }
}

/// Result ids split into the accepted majority and the rejected rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub accepted: BTreeSet<String>,
    pub rejected: BTreeSet<String>,
}

/// Partitions results by their primary-metric score.
///
/// If the two cluster centers are closer than `tolerance` every result is
/// accepted. Otherwise the larger cluster is accepted and the smaller one
/// rejected; equal sized clusters fail with [`ConsensusError::NoMajority`].
pub fn partition_scores(scores: &BTreeMap<String, f64>, tolerance: f64) -> Result<Partition> {
    if scores.is_empty() {
        return Err(ConsensusError::NoData);
    }

    let clusters = two_means(scores);
    let distance = clusters.center_distance();
    tracing::debug!(
        centers = ?clusters.centers,
        sizes = ?[clusters.members[0].len(), clusters.members[1].len()],
        distance,
        tolerance,
        "Clustered trace scores"
    );

    if distance < tolerance {
        return Ok(Partition {
            accepted: scores.keys().cloned().collect(),
            rejected: BTreeSet::new(),
        });
    }

    let [first, second] = clusters.members;
    let (accepted, rejected) = match first.len().cmp(&second.len()) {
        std::cmp::Ordering::Greater => (first, second),
        std::cmp::Ordering::Less => (second, first),
        std::cmp::Ordering::Equal => return Err(ConsensusError::NoMajority(first.len())),
    };
    Ok(Partition {
        accepted: accepted.into_iter().collect(),
        rejected: rejected.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(values: &[f64]) -> BTreeMap<String, f64> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("r{}", i), *v))
            .collect()
    }

    fn ids(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn close_centers_accept_everything() {
        let partition = partition_scores(&scores(&[0.0, 0.01, -0.01]), 1.0).unwrap();
        assert_eq!(partition.accepted, ids(&["r0", "r1", "r2"]));
        assert!(partition.rejected.is_empty());
    }

    #[test]
    fn majority_cluster_is_accepted() {
        let partition = partition_scores(&scores(&[0.0, 0.0, 0.0, 5.0, 5.0]), 0.1).unwrap();
        assert_eq!(partition.accepted, ids(&["r0", "r1", "r2"]));
        assert_eq!(partition.rejected, ids(&["r3", "r4"]));
    }

    #[test]
    fn majority_may_be_the_high_cluster() {
        let partition = partition_scores(&scores(&[-4.0, 1.0, 1.1, 0.9]), 0.1).unwrap();
        assert_eq!(partition.accepted, ids(&["r1", "r2", "r3"]));
        assert_eq!(partition.rejected, ids(&["r0"]));
    }

    #[test]
    fn equal_clusters_have_no_majority() {
        let err = partition_scores(&scores(&[0.0, 0.0, 5.0, 5.0]), 0.1).unwrap_err();
        assert!(matches!(err, ConsensusError::NoMajority(2)));
    }

    #[test]
    fn empty_scores_are_no_data() {
        let err = partition_scores(&BTreeMap::new(), 0.1).unwrap_err();
        assert!(matches!(err, ConsensusError::NoData));
    }

    #[test]
    fn identical_scores_with_zero_tolerance_accept_all() {
        let partition = partition_scores(&scores(&[2.0, 2.0, 2.0]), 0.0).unwrap();
        assert_eq!(partition.accepted.len(), 3);
        assert!(partition.rejected.is_empty());
    }

    #[test]
    fn single_result_is_accepted() {
        let partition = partition_scores(&scores(&[3.0]), 0.0).unwrap();
        assert_eq!(partition.accepted, ids(&["r0"]));
    }

    #[test]
    fn two_means_moves_centers_to_cluster_means() {
        let clusters = two_means(&scores(&[0.0, 1.0, 10.0, 11.0]));
        assert_eq!(clusters.centers, [0.5, 10.5]);
        assert_eq!(clusters.members[0], vec!["r0".to_string(), "r1".to_string()]);
    }
}
