//! Error types for recoverable failures.

use std::path::PathBuf;

use thiserror::Error;

/// Workspace-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// A file could not be opened, read, written or positioned.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File the operation targeted.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A seek target that cannot be represented.
    #[error("Invalid seek: {0}")]
    InvalidSeek(String),

    /// A dedicated thread could not be spawned.
    #[error("Failed to spawn thread {name}: {source}")]
    Spawn {
        /// Name given to the thread.
        name: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
