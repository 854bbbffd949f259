//! ============================================================================
//! Error Types - Provider and storage failures
//! ============================================================================
//! Provider failures are recoverable: the session degrades and keeps running.
//! Storage corruption is fatal unless the caller opts into recovery.
//! ============================================================================

use std::path::PathBuf;

/// Failure of an external embedding or generation provider
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider returned an empty response")]
    EmptyResponse,

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

/// Failure reading or writing the durable memory file
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Memory store at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize memories: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means the file exists but cannot be understood
    pub fn is_corrupt(&self) -> bool {
        matches!(self, StoreError::Corrupt { .. })
    }
}

/// A vector was rejected because its length disagrees with the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Dimension mismatch: index holds {expected}-d vectors, got {found}")]
pub struct DimensionMismatch {
    pub expected: usize,
    pub found: usize,
}
