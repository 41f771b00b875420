use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use trace_consensus::{ConsensusError, TraceConsensus};

const HEADER: &str = "# Elapsed time   CPU (%)     Real (MB)   Virtual (MB)";

/// Writes a trace sampled every `step` seconds for `duration` seconds with a
/// constant real-memory reading.
fn write_trace(dir: &TempDir, name: &str, duration: f64, step: f64, real: f64) -> Result<PathBuf> {
    let mut text = String::from(HEADER);
    text.push('\n');
    let mut t = 0.0;
    while t <= duration {
        text.push_str(&format!("{:.3} {:.1} {:.1} {:.1}\n", t, 50.0, real, real * 4.0));
        t += step;
    }
    let path = dir.path().join(format!("{}.trace", name));
    fs::write(&path, text)?;
    Ok(path)
}

#[test]
fn outlier_trace_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let traces = vec![
        ("node-a".to_string(), write_trace(&dir, "a", 10.0, 0.5, 100.0)?),
        ("node-b".to_string(), write_trace(&dir, "b", 10.0, 0.25, 101.0)?),
        // shorter run, coarser sampling, same footprint
        ("node-c".to_string(), write_trace(&dir, "c", 9.5, 1.0, 99.0)?),
        ("node-d".to_string(), write_trace(&dir, "d", 10.0, 0.5, 400.0)?),
    ];

    let partition = TraceConsensus::default().partition_files(&traces, 5.0)?;

    assert_eq!(partition.accepted.len(), 3);
    assert!(partition.accepted.contains("node-a"));
    assert!(partition.accepted.contains("node-b"));
    assert!(partition.accepted.contains("node-c"));
    assert_eq!(partition.rejected.into_iter().collect::<Vec<_>>(), vec!["node-d".to_string()]);
    Ok(())
}

#[test]
fn non_finite_row_does_not_hide_an_outlier() -> Result<()> {
    let dir = TempDir::new()?;
    let cheater = write_trace(&dir, "d", 10.0, 0.5, 300.0)?;
    let mut text = fs::read_to_string(&cheater)?;
    text.push_str("5 50 nan 600\n");
    text.push_str("6 inf 300 1200\n");
    fs::write(&cheater, text)?;

    let traces = vec![
        ("node-a".to_string(), write_trace(&dir, "a", 10.0, 0.5, 100.0)?),
        ("node-b".to_string(), write_trace(&dir, "b", 10.0, 0.5, 100.0)?),
        ("node-c".to_string(), write_trace(&dir, "c", 10.0, 0.5, 100.0)?),
        ("node-d".to_string(), cheater),
    ];

    let partition = TraceConsensus::default().partition_files(&traces, 5.0)?;

    assert_eq!(partition.accepted.len(), 3);
    assert_eq!(partition.rejected.into_iter().collect::<Vec<_>>(), vec!["node-d".to_string()]);
    Ok(())
}

#[test]
fn similar_traces_are_all_accepted() -> Result<()> {
    let dir = TempDir::new()?;
    let traces = vec![
        ("node-a".to_string(), write_trace(&dir, "a", 10.0, 0.5, 100.0)?),
        ("node-b".to_string(), write_trace(&dir, "b", 10.0, 0.5, 100.5)?),
    ];

    let partition = TraceConsensus::default().partition_files(&traces, 5.0)?;

    assert_eq!(partition.accepted.len(), 2);
    assert!(partition.rejected.is_empty());
    Ok(())
}

#[test]
fn header_only_traces_are_no_data() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("empty.trace");
    fs::write(&path, format!("{}\n", HEADER))?;

    let err = TraceConsensus::default()
        .partition_files(&[("node-a".to_string(), path)], 1.0)
        .unwrap_err();
    assert!(matches!(err, ConsensusError::NoData));

    let none: Vec<(String, PathBuf)> = Vec::new();
    let err = TraceConsensus::default().partition_files(&none, 1.0).unwrap_err();
    assert!(matches!(err, ConsensusError::NoData));
    Ok(())
}

#[test]
fn missing_trace_file_is_an_io_error() {
    let traces = vec![("node-a".to_string(), PathBuf::from("/nonexistent/trace/file"))];
    let err = TraceConsensus::default().partition_files(&traces, 1.0).unwrap_err();
    assert!(matches!(err, ConsensusError::Io { .. }));
}
