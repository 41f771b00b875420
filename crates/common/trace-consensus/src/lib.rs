//! Decides which of several independently computed results to trust when
//! no deterministic check exists.
//!
//! Every node that runs a job records a resource-usage trace. Honest runs of
//! the same workload look alike; a node that skipped or faked the work does
//! not. Traces are aligned on common waypoints, each result gets a score for
//! how far its real-memory curve sits from the average, and 2-means splits
//! the scores into a majority (accepted) and a minority (rejected).

pub mod cluster;
pub mod error;
pub mod score;
pub mod trace;

use std::collections::BTreeMap;
use std::path::Path;

pub use cluster::{partition_scores, two_means, Partition, TwoMeans};
pub use error::{ConsensusError, Result};
pub use score::{score, waypoints, ClusterScore, ScoreTable, DEFAULT_WAYPOINTS};
pub use trace::{Metric, TraceSample, TraceSet};

/// Trace clustering with a configurable number of waypoints.
#[derive(Debug, Clone, Copy)]
pub struct TraceConsensus {
    waypoints: usize,
}

impl Default for TraceConsensus {
    fn default() -> Self {
        Self {
            waypoints: DEFAULT_WAYPOINTS,
        }
    }
}

impl TraceConsensus {
    pub fn new(waypoints: usize) -> Self {
        Self {
            waypoints: waypoints.max(1),
        }
    }

    pub fn waypoints(&self) -> usize {
        self.waypoints
    }

    /// Scores of every result on every metric, for diagnostics.
    pub fn scores(&self, traces: &TraceSet) -> ScoreTable {
        score(traces, self.waypoints)
    }

    /// Splits the results of `traces` into accepted and rejected ids.
    pub fn partition(&self, traces: &TraceSet, tolerance: f64) -> Result<Partition> {
        if traces.is_empty() {
            return Err(ConsensusError::NoData);
        }
        let table = self.scores(traces);
        let primary: BTreeMap<String, f64> = table.column(Metric::PRIMARY);
        partition_scores(&primary, tolerance)
    }

    /// Reads `(result id, trace file)` pairs from disk and partitions them.
    pub fn partition_files<P: AsRef<Path>>(&self, traces: &[(String, P)], tolerance: f64) -> Result<Partition> {
        let set = TraceSet::from_files(traces)?;
        self.partition(&set, tolerance)
    }
}
