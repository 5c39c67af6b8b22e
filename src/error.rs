//! Error kinds surfaced by the integrity engine
//!
//! Per-file read failures are deliberately absent here: those are recorded
//! as sentinel digests (see [`crate::hash`]) so a single unreadable file
//! never aborts a scan.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FimError>;

#[derive(Debug, Error)]
pub enum FimError {
    /// Scanning or monitoring was requested but no baseline has been persisted.
    #[error("baseline not found at {}; create a baseline first", path.display())]
    MissingBaseline { path: PathBuf },

    /// The baseline document could not be written.
    #[error("failed to persist baseline to {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The baseline document exists but is not a valid snapshot.
    #[error("baseline at {} is corrupt: {source}", path.display())]
    CorruptBaseline {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The baseline document could not be read (other than "does not exist").
    #[error("failed to read baseline {}: {source}", path.display())]
    BaselineRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid exclusion pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// The target directory itself is missing or unreadable.
    #[error("cannot scan {}: {source}", path.display())]
    ScanRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a monitor is already running for baseline {}", baseline.display())]
    MonitorAlreadyRunning { baseline: PathBuf },

    /// Unexpected failure inside the monitor loop; the loop has stopped.
    #[error("monitor loop failed: {0}")]
    LoopFailure(String),
}

impl FimError {
    /// True for the precondition failure "no baseline present".
    pub fn is_missing_baseline(&self) -> bool {
        matches!(self, FimError::MissingBaseline { .. })
    }
}
