//! Fatal error taxonomy for the cleaning run.
//!
//! Only conditions that abort the whole run live here. Per-value problems
//! (missing timestamp, unparseable number, out-of-range value) are corrected
//! in place and only show up as counters in [`crate::CleaningStats`].

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a cleaning run before any output is persisted.
#[derive(Debug, Error)]
pub enum CleanError {
    /// Raw file missing, unreadable, or not parseable as CSV
    #[error("cannot read raw sensor data from {}: {source}", .path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Header row has no `timestamp` column
    #[error("raw sensor data in {} has no timestamp column", .path.display())]
    MissingTimestampColumn { path: PathBuf },

    /// A present timestamp could not be parsed
    #[error("unparseable timestamp {value:?} on line {line}")]
    UnparseableTimestamp { line: u64, value: String },

    /// Normalized output could not be written
    #[error("cannot write normalized data to {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CleanError {
    pub(crate) fn persist(path: impl Into<PathBuf>, source: impl Into<std::io::Error>) -> Self {
        CleanError::Persist {
            path: path.into(),
            source: source.into(),
        }
    }
}
