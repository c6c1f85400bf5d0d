//! Error types for the local directory backend.

use std::path::PathBuf;
use thiserror::Error;

/// Errors specific to local store operations.
#[derive(Error, Debug)]
pub enum LocalStoreError {
    /// The store root is missing or not a directory
    #[error("store root {path} is not a directory")]
    NotADirectory { path: PathBuf },

    /// A project, repo or branch name that cannot be a single path component
    #[error("invalid name '{name}'")]
    InvalidName { name: String },

    /// The branch changed after its commit id was handed out
    #[error("commit {commit} is no longer the head of {branch} (now {current})")]
    CommitMoved {
        branch: String,
        commit: String,
        current: String,
    },

    /// Filesystem access failed
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LocalStoreError {
    /// Wrap an I/O error with the path that produced it
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LocalStoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if this error means the snapshot went stale
    pub fn is_stale(&self) -> bool {
        matches!(self, LocalStoreError::CommitMoved { .. })
    }
}
