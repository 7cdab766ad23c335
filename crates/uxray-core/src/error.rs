//! Error types for the UX-Ray pipeline
//!
//! Provides error handling for:
//! - Black-box backends (generative text, page metrics, chart rendering)
//! - Evidence loading
//! - Extraction and correlation failures
//! - Persistence and validation
//!
//! Item-level problems (one malformed spec line, one corrupt file) are
//! recovered where they happen and never reach this taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use uxray_artifact::KeyError;
use uxray_findings::{CorrelationError, ExtractError};
use uxray_store::StoreError;

/// Errors raised by an external black box
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Service unreachable or failing
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Call exceeded its deadline
    #[error("backend timed out after {secs}s")]
    Timeout {
        /// Deadline in seconds
        secs: u64,
    },

    /// Service answered with nothing usable
    #[error("backend returned an empty response")]
    EmptyResponse,

    /// Service refused the request
    #[error("backend rejected request: {0}")]
    Rejected(String),
}

impl BackendError {
    /// Create unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }
}

/// Errors while loading raw evidence
#[derive(Debug, thiserror::Error)]
pub enum EvidenceError {
    /// IO error reading evidence
    #[error("io error reading {path}: {source}")]
    Io {
        /// Evidence file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File exceeds the configured limit
    #[error("evidence too large: {path} is {size} bytes (max: {max})")]
    TooLarge {
        /// Evidence file
        path: PathBuf,
        /// Actual size
        size: u64,
        /// Configured limit
        max: u64,
    },

    /// JSON evidence does not parse
    #[error("invalid JSON evidence in {path}: {reason}")]
    InvalidJson {
        /// Evidence file
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// Evidence is not UTF-8 text
    #[error("evidence {0} is not valid UTF-8")]
    NotText(PathBuf),
}

impl EvidenceError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Pipeline stage an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Loading raw evidence or page snapshots
    Evidence,
    /// Finding extraction
    Extraction,
    /// Chart synthesis and correlation
    Synthesis,
    /// Writing artifacts
    Persistence,
    /// Report computation
    Report,
    /// Chart rendering
    Render,
    /// Input and configuration validation
    Validation,
}

impl Stage {
    /// Stable lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Evidence => "evidence",
            Self::Extraction => "extraction",
            Self::Synthesis => "synthesis",
            Self::Persistence => "persistence",
            Self::Report => "report",
            Self::Render => "render",
            Self::Validation => "validation",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main pipeline error type
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A black box failed while serving a stage
    #[error("{stage} backend unavailable: {source}")]
    UpstreamUnavailable {
        /// Stage that made the call
        stage: Stage,
        /// Backend failure
        #[source]
        source: BackendError,
    },

    /// Synthesizer output broke the line protocol
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] CorrelationError),

    /// Critique held no findings; synthesis was not attempted
    #[error("empty extraction: {0}")]
    EmptyExtraction(#[from] ExtractError),

    /// Evidence could not be loaded
    #[error("evidence error: {0}")]
    Evidence(#[from] EvidenceError),

    /// Artifact could not be persisted
    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),

    /// Identifier or artifact key is invalid
    #[error("invalid key: {0}")]
    InvalidKey(#[from] KeyError),

    /// Request or stored payload failed validation
    #[error("validation failed: {0}")]
    Validation(String),

    /// Configuration is invalid
    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Create upstream error for a stage
    pub fn upstream(stage: Stage, source: BackendError) -> Self {
        Self::UpstreamUnavailable { stage, source }
    }

    /// Create validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stage the error belongs to
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::UpstreamUnavailable { stage, .. } => *stage,
            Self::ProtocolViolation(_) => Stage::Synthesis,
            Self::EmptyExtraction(_) => Stage::Extraction,
            Self::Evidence(_) => Stage::Evidence,
            Self::Persistence(_) => Stage::Persistence,
            Self::InvalidKey(_) | Self::Validation(_) | Self::Config(_) => Stage::Validation,
        }
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UpstreamUnavailable { source, .. } => source.is_retryable(),
            Self::Persistence(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Raw backend response, when the failure concerns one
    #[must_use]
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::ProtocolViolation(e) => Some(e.raw_response()),
            _ => None,
        }
    }

    /// Structured, serializable summary for callers
    #[must_use]
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            stage: self.stage(),
            message: self.to_string(),
            raw_response: self.raw_response().map(str::to_string),
            retryable: self.is_retryable(),
        }
    }
}

/// Serializable error summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Failing stage
    pub stage: Stage,
    /// Human-readable message
    pub message: String,
    /// Raw backend text for protocol violations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    /// Whether a retry may succeed
    pub retryable: bool,
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
