//! Spec validation and correlation
//!
//! The synthesizer's response is free text in which every line that
//! matters starts with the sentinel `$`. Each sentinel line carries either
//! a JSON chart configuration or an error token:
//!
//! ```text
//! $ {"type":"bar","data":{...}}
//! $ERROR: finding 2 – insufficient data
//! ```
//!
//! Lines are validated one at a time. Any parseable JSON value is kept; a
//! line that fails to parse is dropped and logged, and only an empty
//! result fails the batch. Whether a payload is a usable chart config is
//! decided by the renderer.

use crate::error::CorrelationError;
use crate::extract::Finding;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Marks a line as carrying a spec or an error token
pub const SENTINEL: char = '$';

static ERROR_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^ERROR:\s*(?:finding\s+#?(\d+))?\s*[-–—:]?\s*(.*)$").expect("static regex")
});

/// A parsed chart description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationSpec {
    /// Chart configuration as returned by the backend
    pub payload: Value,
    /// Finding this spec was derived from
    pub source_finding_index: Option<usize>,
}

/// A finding paired with its chart spec
pub type SpecPair = (Finding, VisualizationSpec);

/// One classified sentinel line
#[derive(Debug, Clone, PartialEq)]
pub enum SpecLine {
    /// Parsed chart configuration
    Payload(Value),
    /// Backend declined to chart a finding
    Error {
        /// Finding index echoed by the token, if any
        finding: Option<usize>,
        /// Reason given by the backend
        reason: String,
    },
    /// Candidate that is not valid JSON
    Malformed {
        /// Candidate text after the sentinel
        candidate: String,
        /// Parser message
        reason: String,
    },
}

impl SpecLine {
    /// Classify the text that follows a sentinel
    #[must_use]
    pub fn classify(candidate: &str) -> Self {
        let candidate = candidate.trim();
        if let Some(caps) = ERROR_TOKEN.captures(candidate) {
            return Self::Error {
                finding: caps.get(1).and_then(|m| m.as_str().parse().ok()),
                reason: caps.get(2).map_or("", |m| m.as_str()).trim().to_string(),
            };
        }
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) => Self::Payload(value),
            Err(e) => Self::Malformed {
                candidate: candidate.to_string(),
                reason: e.to_string(),
            },
        }
    }
}

/// Classify every sentinel-prefixed line of a response, in order
#[must_use]
pub fn parse_response(raw: &str) -> Vec<SpecLine> {
    raw.lines()
        .filter_map(|line| line.trim_start().strip_prefix(SENTINEL))
        .map(SpecLine::classify)
        .collect()
}

/// How surviving spec lines are matched to findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorrelationPolicy {
    /// Drop invalid lines, then zip survivors with findings in order.
    /// A dropped line shifts every later pairing by one.
    Positional,
    /// Every sentinel line owns the finding at its position. Dropped lines
    /// leave a gap instead of shifting. The line count must equal the
    /// finding count and error tokens must echo their own finding.
    #[default]
    IndexEchoing,
}

/// Correlate with the positional policy
///
/// Returns `min(M, N)` pairs, where `M` is the number of valid spec lines
/// and `N` the number of findings.
///
/// # Errors
/// - [`CorrelationError::NoSentinelLines`] if the response has no `$` lines
/// - [`CorrelationError::NothingParsed`] if no pair survives
pub fn correlate(findings: &[Finding], raw: &str) -> Result<Vec<SpecPair>, CorrelationError> {
    correlate_with(CorrelationPolicy::Positional, findings, raw)
}

/// Correlate with an explicit policy
///
/// # Errors
/// See [`correlate`]; the index-echoing policy additionally returns
/// [`CorrelationError::LengthMismatch`] and [`CorrelationError::IndexMismatch`].
pub fn correlate_with(
    policy: CorrelationPolicy,
    findings: &[Finding],
    raw: &str,
) -> Result<Vec<SpecPair>, CorrelationError> {
    let lines = parse_response(raw);
    if lines.is_empty() {
        return Err(CorrelationError::NoSentinelLines {
            raw: raw.to_string(),
        });
    }

    let pairs = match policy {
        CorrelationPolicy::Positional => positional(findings, &lines),
        CorrelationPolicy::IndexEchoing => index_echoing(findings, &lines, raw)?,
    };

    if pairs.is_empty() {
        return Err(CorrelationError::NothingParsed {
            sentinel_lines: lines.len(),
            raw: raw.to_string(),
        });
    }

    tracing::debug!(
        ?policy,
        findings = findings.len(),
        sentinel_lines = lines.len(),
        pairs = pairs.len(),
        "correlated chart specs"
    );
    Ok(pairs)
}

fn pair(finding: &Finding, payload: &Value) -> SpecPair {
    (
        finding.clone(),
        VisualizationSpec {
            payload: payload.clone(),
            source_finding_index: Some(finding.index),
        },
    )
}

fn log_dropped(position: usize, line: &SpecLine) {
    match line {
        SpecLine::Payload(_) => {}
        SpecLine::Error { finding, reason } => {
            tracing::warn!(line = position, ?finding, %reason, "backend declined finding");
        }
        SpecLine::Malformed { candidate, reason } => {
            tracing::warn!(line = position, %candidate, %reason, "dropping malformed spec line");
        }
    }
}

fn positional(findings: &[Finding], lines: &[SpecLine]) -> Vec<SpecPair> {
    let survivors = lines.iter().enumerate().filter_map(|(pos, line)| match line {
        SpecLine::Payload(value) => Some(value),
        other => {
            log_dropped(pos + 1, other);
            None
        }
    });

    findings
        .iter()
        .zip(survivors)
        .map(|(finding, payload)| pair(finding, payload))
        .collect()
}

fn index_echoing(
    findings: &[Finding],
    lines: &[SpecLine],
    raw: &str,
) -> Result<Vec<SpecPair>, CorrelationError> {
    if lines.len() != findings.len() {
        return Err(CorrelationError::LengthMismatch {
            expected: findings.len(),
            actual: lines.len(),
            raw: raw.to_string(),
        });
    }

    let mut pairs = Vec::with_capacity(findings.len());
    for (slot, (finding, line)) in findings.iter().zip(lines).enumerate() {
        match line {
            SpecLine::Payload(value) => pairs.push(pair(finding, value)),
            SpecLine::Error {
                finding: Some(echoed),
                ..
            } if *echoed != finding.index => {
                return Err(CorrelationError::IndexMismatch {
                    slot: slot + 1,
                    echoed: *echoed,
                    raw: raw.to_string(),
                });
            }
            other => log_dropped(slot + 1, other),
        }
    }
    Ok(pairs)
}
