use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration for a requester node.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RequesterConfig {
    /// Identity of this node on the job event stream.
    pub node_id: String,

    /// Root directory holding `<job id>/<node id>.trace` files.
    pub trace_dir: PathBuf,

    /// Number of waypoints traces are aligned on.
    pub waypoints: usize,

    /// Cluster tolerance used when a deal does not set its own.
    pub default_tolerance: f64,

    /// Log filter (e.g. "info", "mesh_requester=debug"). `RUST_LOG` wins.
    pub log_level: Option<String>,

    /// Capacity of the in-process event channel.
    pub event_buffer: usize,
}

impl Default for RequesterConfig {
    fn default() -> Self {
        Self {
            node_id: "requester".to_string(),
            trace_dir: PathBuf::from("traces"),
            waypoints: trace_consensus::DEFAULT_WAYPOINTS,
            default_tolerance: 0.0,
            log_level: None,
            event_buffer: 256,
        }
    }
}

impl RequesterConfig {
    /// Loads defaults, then the optional TOML file, then `REQUESTER_*`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings = builder
            .add_source(Environment::with_prefix("REQUESTER"))
            .build()
            .with_context(|| format!("Failed to read configuration from {:?}", path))?;
        let config: RequesterConfig = settings
            .try_deserialize()
            .context("Failed to parse requester configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "node_id = \"requester-7\"\nwaypoints = 20\ndefault_tolerance = 2.5").unwrap();

        let config = RequesterConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.node_id, "requester-7");
        assert_eq!(config.waypoints, 20);
        assert_eq!(config.default_tolerance, 2.5);
        assert_eq!(config.event_buffer, 256);
        assert_eq!(config.trace_dir, PathBuf::from("traces"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(RequesterConfig::load(Some(Path::new("/nonexistent/requester.toml"))).is_err());
    }
}
