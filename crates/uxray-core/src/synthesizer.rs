//! Visualization Synthesizer
//!
//! One backend call per batch: the extracted findings, renumbered `1..N`
//! with annotation spans already removed, and the raw evidence go in; a
//! `$`-prefixed line per finding comes out. Validation and correlation of
//! that text happen in `uxray_findings`.

use crate::backend::{prompts, GenerativeBackend, PayloadPart};
use crate::error::{PipelineError, PipelineResult, Stage};
use crate::evidence::RawEvidence;
use std::sync::Arc;
use uxray_findings::Finding;

/// Asks the generative backend for one chart config per finding
#[derive(Clone)]
pub struct VisualizationSynthesizer {
    backend: Arc<dyn GenerativeBackend>,
}

impl VisualizationSynthesizer {
    /// Create synthesizer over a backend
    #[must_use]
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }

    /// Build the user payload for a synthesis call
    ///
    /// Findings are listed under the ordinals correlation will use.
    #[must_use]
    pub fn payload(findings: &[Finding], evidence: &RawEvidence) -> Vec<PayloadPart> {
        let listed = findings
            .iter()
            .map(|f| format!("{}. {}", f.index, f.text))
            .collect::<Vec<_>>()
            .join("\n");
        vec![
            PayloadPart::text(prompts::CHART_PROMPT),
            PayloadPart::text(format!("Findings:\n{listed}")),
            evidence.to_payload_part(),
        ]
    }

    /// Return the backend's raw response
    ///
    /// # Errors
    /// Returns [`PipelineError::UpstreamUnavailable`] if the backend fails.
    pub async fn synthesize(&self, findings: &[Finding], evidence: &RawEvidence) -> PipelineResult<String> {
        let payload = Self::payload(findings, evidence);
        let raw = self
            .backend
            .invoke(prompts::CHART_SYSTEM, &payload)
            .await
            .map_err(|e| PipelineError::upstream(Stage::Synthesis, e))?;
        tracing::debug!(bytes = raw.len(), lines = raw.lines().count(), "synthesizer responded");
        Ok(raw)
    }
}

impl std::fmt::Debug for VisualizationSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualizationSynthesizer").finish_non_exhaustive()
    }
}
