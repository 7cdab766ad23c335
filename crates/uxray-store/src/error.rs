//! Error types for the artifact store
//!
//! Read-side corruption is not an error for callers of the cache manager;
//! it is logged and treated as a miss. These errors cover writes, listing
//! and explicit reads through [`crate::ArtifactStore`].

use std::path::PathBuf;
use uxray_artifact::KeyError;

/// Errors during store and cache operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// IO error reading or writing an artifact file
    #[error("io error at {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File exists but does not hold valid JSON
    #[error("corrupt artifact at {path}: {reason}")]
    Corrupt {
        /// Offending file
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// Payload could not be encoded
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    /// Invalid artifact key
    #[error("invalid key: {0}")]
    Key(#[from] KeyError),

    /// Fast-lookup cache rejected an operation
    #[error("cache error: {0}")]
    Cache(String),
}

impl StoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create corruption error for path
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Check if retrying the operation may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
            ),
            Self::Corrupt { .. } | Self::Encode(_) | Self::Key(_) | Self::Cache(_) => false,
        }
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display_names_path() {
        let err = StoreError::io_error(
            "/records/ui-report/1/2/ui_report.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("ui_report.json"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn interrupted_io_is_retryable() {
        let err = StoreError::io_error("/tmp", std::io::Error::from(std::io::ErrorKind::Interrupted));
        assert!(err.is_retryable());
    }

    #[test]
    fn key_error_converts() {
        let err: StoreError = KeyError::EmptySegment.into();
        assert!(matches!(err, StoreError::Key(_)));
    }
}
