//! Error types for index backup and restore.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for backup/restore operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing, exporting or restoring an index.
#[derive(Error, Debug)]
pub enum Error {
    /// Credentials were rejected by the search service.
    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    /// The index (or resource) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The index already exists on the target service.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The service rejected a schema or document as malformed.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Network or service-level failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// One or more export batches failed and left no staging file.
    #[error("Export incomplete: {failed_batches} batch(es) failed, up to {missing_documents} document(s) not staged")]
    PartialExportGap {
        /// Number of failed batches.
        failed_batches: usize,
        /// Upper bound of documents missing from staging.
        missing_documents: u64,
    },

    /// Source and target document counts differ after restore.
    #[error("Document count mismatch: source has {source_count}, target has {target_count}")]
    CountMismatch {
        /// Source index document count.
        source_count: u64,
        /// Target index document count.
        target_count: u64,
    },

    /// Invalid run configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A staging file could not be read or written.
    #[error("Staging file '{}': {message}", path.display())]
    Staging {
        /// File involved.
        path: PathBuf,
        /// Underlying failure.
        message: String,
    },

    /// Uploading a staging file failed; the run stops here.
    #[error("Import of '{}' failed: {source}", path.display())]
    Import {
        /// File being uploaded.
        path: PathBuf,
        /// Service error.
        #[source]
        source: Box<Error>,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Builds a staging error for `path`.
    pub fn staging(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::Staging {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Returns true for the "index does not exist" condition.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
