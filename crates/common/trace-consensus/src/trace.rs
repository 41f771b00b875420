use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{ConsensusError, Result};

/// Resource-usage columns recorded in every trace row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Metric {
    Cpu,
    RealMemory,
    VirtualMemory,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Cpu, Metric::RealMemory, Metric::VirtualMemory];

    /// Real memory is the column results are clustered on; the other two are
    /// scored for diagnostics only.
    pub const PRIMARY: Metric = Metric::RealMemory;

    pub fn value(self, sample: &TraceSample) -> f64 {
        match self {
            Metric::Cpu => sample.cpu,
            Metric::RealMemory => sample.real_memory,
            Metric::VirtualMemory => sample.virtual_memory,
        }
    }
}

/// One row of a resource-usage trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceSample {
    pub elapsed: f64,
    pub cpu: f64,
    pub real_memory: f64,
    pub virtual_memory: f64,
}

impl TraceSample {
    /// Parses `elapsed cpu real virtual`. Returns `None` for any other shape
    /// and for non-finite values such as `nan` or `inf`.
    pub fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 4 {
            return None;
        }
        let mut values = [0.0f64; 4];
        for (slot, field) in values.iter_mut().zip(&fields) {
            let value: f64 = field.parse().ok()?;
            if !value.is_finite() {
                return None;
            }
            *slot = value;
        }
        Some(Self {
            elapsed: values[0],
            cpu: values[1],
            real_memory: values[2],
            virtual_memory: values[3],
        })
    }
}

/// Samples of every result taking part in one consensus round, grouped by
/// result id and kept in time order.
#[derive(Debug, Clone, Default)]
pub struct TraceSet {
    samples: BTreeMap<String, Vec<TraceSample>>,
}

impl TraceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads every `(result id, path)` pair from disk.
    pub fn from_files<P: AsRef<Path>>(traces: &[(String, P)]) -> Result<Self> {
        let mut set = Self::new();
        for (result_id, path) in traces {
            let path = path.as_ref();
            let text = fs::read_to_string(path).map_err(|source| ConsensusError::Io {
                path: path.display().to_string(),
                source,
            })?;
            set.add_trace(result_id, &text);
        }
        Ok(set)
    }

    /// Parses one trace file. The first line is a header and is ignored;
    /// malformed rows are skipped. Returns the number of samples kept.
    pub fn add_trace(&mut self, result_id: &str, text: &str) -> usize {
        let mut parsed = Vec::new();
        for (line_no, line) in text.lines().enumerate().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            match TraceSample::parse(line) {
                Some(sample) => parsed.push(sample),
                None => tracing::warn!(
                    result_id,
                    row = line_no + 1,
                    "Skipping malformed trace row: {:?}",
                    line
                ),
            }
        }
        let kept = parsed.len();
        if kept == 0 {
            tracing::warn!(result_id, "Trace has no usable samples");
            return 0;
        }
        let samples = self.samples.entry(result_id.to_string()).or_default();
        samples.extend(parsed);
        samples.sort_by(|a, b| a.elapsed.total_cmp(&b.elapsed));
        kept
    }

    pub fn push(&mut self, result_id: &str, sample: TraceSample) {
        let samples = self.samples.entry(result_id.to_string()).or_default();
        samples.push(sample);
        samples.sort_by(|a, b| a.elapsed.total_cmp(&b.elapsed));
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn samples(&self, result_id: &str) -> Option<&[TraceSample]> {
        self.samples.get(result_id).map(Vec::as_slice)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &Vec<TraceSample>)> {
        self.samples.iter()
    }

    /// Largest elapsed time over every sample of every result.
    pub fn max_elapsed(&self) -> Option<f64> {
        self.samples
            .values()
            .flat_map(|s| s.iter().map(|x| x.elapsed))
            .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |m| m.max(t))))
    }
}
