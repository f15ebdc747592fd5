//! Error taxonomy for the indexing pipeline.
//!
//! Corrupt index files are deliberately absent: they are recovered by the
//! store and surfaced as [`crate::store::LoadOutcome::Recovered`].

use std::path::PathBuf;

use repo_index_core::EmptyArgument;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Debug, Error)]
pub enum IndexError {
    /// Missing or invalid roots and settings. Aborts the affected repository.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Empty or invalid required argument.
    #[error("invalid argument: {0}")]
    Validation(#[from] EmptyArgument),

    /// A file could not be read for hashing.
    #[error("failed to read {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to persist {path}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize index: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid glob pattern '{pattern}'")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("failed to walk {root}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// The indexing or deletion collaborator failed.
    #[error("{operation} failed for {path}")]
    Delegate {
        operation: &'static str,
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// Cooperative cancellation. Not a failure; never logged as an error.
    #[error("operation cancelled")]
    Cancelled,
}

impl IndexError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, IndexError::Cancelled)
    }
}

/// True when `err` (or anything in its chain) is a cancellation.
pub fn is_cancellation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<IndexError>()
            .is_some_and(IndexError::is_cancelled)
    })
}
