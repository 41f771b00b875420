//! Aligns traces of different length and sampling rate on common waypoints
//! and scores each result by how far it sits from the average.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::trace::{Metric, TraceSample, TraceSet};

pub const DEFAULT_WAYPOINTS: usize = 10;

/// `count` evenly spaced markers from zero up to `max_elapsed * count / (count + 1)`.
///
/// The last marker stays short of `max_elapsed` so that the shortest running
/// result still has a sample beyond it.
pub fn waypoints(max_elapsed: f64, count: usize) -> Vec<f64> {
    if count == 0 {
        return Vec::new();
    }
    let last = max_elapsed * count as f64 / (count as f64 + 1.0);
    if count == 1 {
        return vec![0.0];
    }
    let step = last / (count as f64 - 1.0);
    (0..count).map(|i| step * i as f64).collect()
}

/// For each waypoint, the first sample whose elapsed time is past it.
///
/// `samples` must be in time order. A sparse trace can supply the same
/// sample for several waypoints; waypoints past the end of the trace get
/// `None`.
pub fn samples_at_waypoints<'a>(samples: &'a [TraceSample], waypoints: &[f64]) -> Vec<Option<&'a TraceSample>> {
    let mut picked = vec![None; waypoints.len()];
    let mut next = 0;
    for sample in samples {
        while next < waypoints.len() && sample.elapsed > waypoints[next] {
            picked[next] = Some(sample);
            next += 1;
        }
        if next == waypoints.len() {
            break;
        }
    }
    picked
}

/// Signed mean deviation of one result from the cross-result average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterScore {
    pub result_id: String,
    pub metric: Metric,
    pub score: f64,
}

/// Scores of every result on every metric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreTable {
    pub waypoints: Vec<f64>,
    scores: BTreeMap<String, BTreeMap<Metric, f64>>,
}

impl ScoreTable {
    pub fn get(&self, result_id: &str, metric: Metric) -> Option<f64> {
        self.scores.get(result_id).and_then(|m| m.get(&metric)).copied()
    }

    /// Scores of one metric keyed by result id.
    pub fn column(&self, metric: Metric) -> BTreeMap<String, f64> {
        self.scores
            .iter()
            .filter_map(|(id, m)| m.get(&metric).map(|s| (id.clone(), *s)))
            .collect()
    }

    pub fn to_vec(&self) -> Vec<ClusterScore> {
        self.scores
            .iter()
            .flat_map(|(id, m)| {
                m.iter().map(move |(metric, score)| ClusterScore {
                    result_id: id.clone(),
                    metric: *metric,
                    score: *score,
                })
            })
            .collect()
    }
}

/// Computes the per-result, per-metric scores of a trace set.
pub fn score(traces: &TraceSet, waypoint_count: usize) -> ScoreTable {
    let Some(max_elapsed) = traces.max_elapsed() else {
        return ScoreTable::default();
    };
    let marks = waypoints(max_elapsed, waypoint_count);

    let aligned: BTreeMap<&String, Vec<Option<&TraceSample>>> = traces
        .iter()
        .map(|(id, samples)| (id, samples_at_waypoints(samples, &marks)))
        .collect();

    let mut scores: BTreeMap<String, BTreeMap<Metric, f64>> = BTreeMap::new();
    for metric in Metric::ALL {
        let averages: Vec<Option<f64>> = (0..marks.len())
            .map(|k| {
                let values: Vec<f64> = aligned
                    .values()
                    .filter_map(|row| row[k].map(|s| metric.value(s)))
                    .collect();
                mean(&values)
            })
            .collect();

        for (id, row) in &aligned {
            let deviations: Vec<f64> = row
                .iter()
                .zip(&averages)
                .filter_map(|(sample, avg)| match (sample, avg) {
                    (Some(s), Some(a)) => Some(metric.value(s) - a),
                    _ => None,
                })
                .collect();
            let score = mean(&deviations).unwrap_or(0.0);
            scores.entry((*id).clone()).or_default().insert(metric, score);
        }
    }

    for (id, by_metric) in &scores {
        tracing::debug!(result_id = %id, scores = ?by_metric, "Trace scores");
    }

    ScoreTable { waypoints: marks, scores }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(elapsed: f64, real: f64) -> TraceSample {
        TraceSample {
            elapsed,
            cpu: 1.0,
            real_memory: real,
            virtual_memory: 10.0,
        }
    }

    #[test]
    fn waypoints_stop_short_of_the_end() {
        let marks = waypoints(11.0, 10);
        assert_eq!(marks.len(), 10);
        assert_eq!(marks[0], 0.0);
        assert!((marks[9] - 10.0).abs() < 1e-9);
        assert!((marks[1] - 10.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_waypoint_counts() {
        assert!(waypoints(5.0, 0).is_empty());
        assert_eq!(waypoints(5.0, 1), vec![0.0]);
    }

    #[test]
    fn sparse_samples_cover_several_waypoints() {
        let samples = [sample(0.5, 1.0), sample(3.0, 2.0)];
        let picked = samples_at_waypoints(&samples, &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(picked[0].unwrap().real_memory, 1.0);
        assert_eq!(picked[1].unwrap().real_memory, 2.0);
        assert_eq!(picked[2].unwrap().real_memory, 2.0);
        // nothing is strictly past 3.0
        assert!(picked[3].is_none());
    }

    #[test]
    fn outlier_scores_away_from_the_rest() {
        let mut set = TraceSet::new();
        for id in ["a", "b", "c"] {
            for t in 0..=10 {
                set.push(id, sample(t as f64, 100.0));
            }
        }
        for t in 0..=10 {
            set.push("d", sample(t as f64, 200.0));
        }
        let table = score(&set, DEFAULT_WAYPOINTS);
        assert!((table.get("a", Metric::RealMemory).unwrap() + 25.0).abs() < 1e-9);
        assert!((table.get("d", Metric::RealMemory).unwrap() - 75.0).abs() < 1e-9);
        assert_eq!(table.get("a", Metric::Cpu), Some(0.0));
        assert_eq!(table.column(Metric::RealMemory).len(), 4);
        assert_eq!(table.to_vec().len(), 12);
    }

    #[test]
    fn empty_set_has_no_scores() {
        let table = score(&TraceSet::new(), DEFAULT_WAYPOINTS);
        assert!(table.column(Metric::RealMemory).is_empty());
    }
}
