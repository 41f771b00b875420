use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsensusError {
    /// Nothing to cluster: no result produced a single usable sample.
    #[error("No trace data to compare")]
    NoData,

    /// The two clusters have the same number of members.
    #[error("No majority: {0} results on each side")]
    NoMajority(usize),

    #[error("Failed to read trace {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
