//! Profiler error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by the profiler.
#[derive(Error, Debug)]
pub enum ProfilerError {
    /// The trace file could not be created, or the exporter thread not spawned.
    #[error(transparent)]
    Core(#[from] workline_core::Error),

    /// Writing the trace file failed.
    #[error("Failed to write trace {}: {source}", path.display())]
    Export {
        /// Trace file being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The ring buffer stayed full for the whole push timeout.
    #[error("Profile queue full, dropped entry {name}")]
    QueueFull {
        /// Name of the entry that was not recorded.
        name: String,
    },

    /// The exporter thread exited early, usually on a write error; the
    /// entry could not be queued. [`Profiler::shutdown`](crate::Profiler::shutdown)
    /// reports the cause.
    #[error("Profiler exporter is not running, dropped entry {name}")]
    ExporterStopped {
        /// Name of the entry that was not recorded.
        name: String,
    },

    /// The profiler was shut down.
    #[error("Profiler is stopped")]
    Stopped,

    /// The exporter thread panicked; the trace file is incomplete.
    #[error("Profiler exporter thread panicked")]
    ExporterPanicked,
}

impl ProfilerError {
    pub(crate) fn export(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Export {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias using [`ProfilerError`].
pub type Result<T> = std::result::Result<T, ProfilerError>;
