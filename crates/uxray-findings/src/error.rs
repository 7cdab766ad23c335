//! Error types for extraction and correlation
//!
//! Item-level problems (one malformed spec line) never surface here; they
//! are dropped and logged. These errors are batch-fatal.

/// Errors while extracting findings from critique text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    /// Critique contained no numbered finding with a non-empty body
    #[error("no structured findings detected")]
    NoFindings,
}

/// Errors while correlating spec lines with findings
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorrelationError {
    /// Response has no sentinel-prefixed line at all
    #[error("response contains no sentinel-prefixed lines")]
    NoSentinelLines {
        /// Raw backend response
        raw: String,
    },

    /// Sentinel lines exist but none produced a pair
    #[error("none of {sentinel_lines} sentinel lines produced a valid chart spec")]
    NothingParsed {
        /// Number of sentinel-prefixed lines seen
        sentinel_lines: usize,
        /// Raw backend response
        raw: String,
    },

    /// Index-echoing policy: line count differs from finding count
    #[error("expected {expected} spec lines (one per finding), got {actual}")]
    LengthMismatch {
        /// Number of findings
        expected: usize,
        /// Number of sentinel-prefixed lines
        actual: usize,
        /// Raw backend response
        raw: String,
    },

    /// Index-echoing policy: an error token names a different finding than its slot
    #[error("spec line {slot} echoes finding {echoed}")]
    IndexMismatch {
        /// 1-based line slot
        slot: usize,
        /// Finding index named by the error token
        echoed: usize,
        /// Raw backend response
        raw: String,
    },
}

impl CorrelationError {
    /// Raw backend response, kept for diagnostics
    #[must_use]
    pub fn raw_response(&self) -> &str {
        match self {
            Self::NoSentinelLines { raw }
            | Self::NothingParsed { raw, .. }
            | Self::LengthMismatch { raw, .. }
            | Self::IndexMismatch { raw, .. } => raw,
        }
    }
}
