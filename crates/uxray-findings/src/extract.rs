//! Finding extraction
//!
//! Turns a critique blob into an ordered list of [`Finding`]s. The scan is
//! line oriented:
//!
//! - blank lines and header labels (`findings:`) are skipped
//! - `<n>. <text>` opens a finding, closing the previous one
//! - any other line continues the open finding, folded with one space
//! - annotation spans (`## … ##`) are excluded wherever they appear
//!
//! Annotation spans are tracked with explicit open/close state. A line
//! starting with the marker opens a span; if it also ends with the marker
//! the span is closed on the same line, otherwise it stays open until a
//! line ending with the marker. A numbered line always ends an open span
//! and is scanned as a finding, so an unclosed opener (a markdown heading
//! such as `## Overview`) never hides later findings.

use crate::error::ExtractError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static NUMBERED_OPENER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\.(?:\s+(.*))?$").expect("static regex"));

/// Default annotation marker
pub const ANNOTATION_MARKER: &str = "##";

/// Default header label skipped during the scan
pub const FINDINGS_HEADER: &str = "findings:";

/// One discrete observation from a critique
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// 1-based ordinal; correlation order
    pub index: usize,
    /// Folded body, annotation spans removed
    pub text: String,
}

/// Extraction options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorOptions {
    /// Lines equal to one of these (case-insensitive, trimmed) are skipped
    pub header_labels: Vec<String>,
    /// Annotation span delimiter
    pub annotation_marker: String,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            header_labels: vec![FINDINGS_HEADER.to_string()],
            annotation_marker: ANNOTATION_MARKER.to_string(),
        }
    }
}

/// Stateless finding extractor
#[derive(Debug, Clone, Default)]
pub struct FindingExtractor {
    options: ExtractorOptions,
}

impl FindingExtractor {
    /// Create extractor with custom options
    #[inline]
    #[must_use]
    pub fn new(options: ExtractorOptions) -> Self {
        Self { options }
    }

    /// Extract findings in source order
    ///
    /// # Errors
    /// Returns [`ExtractError::NoFindings`] when nothing numbered with a
    /// non-empty body is found. Callers must not proceed to synthesis.
    pub fn extract(&self, critique: &str) -> Result<Vec<Finding>, ExtractError> {
        let marker = self.options.annotation_marker.as_str();

        let mut findings = Vec::new();
        let mut open: Option<String> = None;
        let mut in_span = false;

        for line in critique.lines().map(str::trim) {
            if line.is_empty() || self.is_header(line) {
                continue;
            }

            if in_span {
                if NUMBERED_OPENER.is_match(line) {
                    tracing::trace!(line, "numbered line ends unclosed annotation span");
                    in_span = false;
                } else {
                    in_span = !line.ends_with(marker);
                    continue;
                }
            } else if !marker.is_empty() && line.starts_with(marker) {
                in_span = !closes_on_same_line(line, marker);
                continue;
            }

            let body = strip_inline_annotations(line, marker);

            if let Some(caps) = NUMBERED_OPENER.captures(&body) {
                if let Some(done) = open.take() {
                    push_finding(&mut findings, &done);
                }
                open = Some(caps.get(2).map_or("", |m| m.as_str()).to_string());
            } else if let Some(current) = open.as_mut() {
                current.push(' ');
                current.push_str(&body);
            } else {
                tracing::trace!(line = %body, "skipping preamble line");
            }
        }

        if let Some(done) = open.take() {
            push_finding(&mut findings, &done);
        }

        if findings.is_empty() {
            return Err(ExtractError::NoFindings);
        }
        tracing::debug!(count = findings.len(), "extracted findings");
        Ok(findings)
    }

    fn is_header(&self, line: &str) -> bool {
        self.options
            .header_labels
            .iter()
            .any(|label| line.eq_ignore_ascii_case(label.trim()))
    }
}

/// Extract findings with default options
///
/// # Errors
/// See [`FindingExtractor::extract`]
pub fn extract(critique: &str) -> Result<Vec<Finding>, ExtractError> {
    FindingExtractor::default().extract(critique)
}

fn closes_on_same_line(line: &str, marker: &str) -> bool {
    line.len() >= marker.len() * 2 && line[marker.len()..].ends_with(marker)
}

/// Cut every paired `marker … marker` span out of a body line
fn strip_inline_annotations(line: &str, marker: &str) -> String {
    if marker.is_empty() {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(start) = rest.find(marker) {
        let after = &rest[start + marker.len()..];
        match after.find(marker) {
            Some(end) => {
                out.push_str(&rest[..start]);
                out.push(' ');
                rest = &after[end + marker.len()..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

fn push_finding(findings: &mut Vec<Finding>, raw: &str) {
    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        tracing::debug!("discarding numbered finding with empty body");
        return;
    }
    findings.push(Finding {
        index: findings.len() + 1,
        text,
    });
}
