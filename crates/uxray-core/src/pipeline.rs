//! Chart pipeline
//!
//! ```text
//! raw evidence ─▶ behaviour report (cached) ─▶ extract ─▶ synthesize
//!                                                             │
//!        [StoredChart] ◀── put chart-spec ◀── correlate ◀─────┘
//! ```
//!
//! An empty extraction stops the run before the synthesizer is called. A
//! successful run replaces the subject's chart set: specs whose slug is not
//! in the new batch are removed.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::evidence::RawEvidence;
use crate::reports::ReportService;
use crate::synthesizer::VisualizationSynthesizer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use uxray_artifact::{ArtifactKey, SubjectId, TenantId};
use uxray_findings::{correlate_with, FindingExtractor};
use uxray_store::ArtifactCacheManager;

/// A chart spec as persisted or listed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChart {
    /// File stem under the subject's chart directory
    pub slug: String,
    /// Finding the chart was derived from; unknown for listed charts
    pub finding_index: Option<usize>,
    /// Chart configuration
    pub payload: Value,
    /// File location
    pub path: PathBuf,
}

/// End-to-end chart generation for an upload
#[derive(Debug, Clone)]
pub struct ChartPipeline {
    config: PipelineConfig,
    reports: ReportService,
    synthesizer: VisualizationSynthesizer,
    extractor: FindingExtractor,
}

impl ChartPipeline {
    /// Create pipeline
    #[must_use]
    pub fn new(config: PipelineConfig, reports: ReportService, synthesizer: VisualizationSynthesizer) -> Self {
        let extractor = FindingExtractor::new(config.extractor_options());
        Self {
            config,
            reports,
            synthesizer,
            extractor,
        }
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Cache manager shared with the report service
    #[inline]
    #[must_use]
    pub fn manager(&self) -> &Arc<ArtifactCacheManager> {
        self.reports.manager()
    }

    /// Critique the evidence, then synthesize and persist one chart per finding
    ///
    /// # Errors
    /// - [`PipelineError::UpstreamUnavailable`] if the critique or synthesis call fails
    /// - [`PipelineError::EmptyExtraction`] if the critique has no findings
    /// - [`PipelineError::ProtocolViolation`] if no chart spec survives correlation
    /// - [`PipelineError::Persistence`] if a chart cannot be written
    pub async fn generate(
        &self,
        tenant: &TenantId,
        upload: &SubjectId,
        evidence: &RawEvidence,
    ) -> PipelineResult<Vec<StoredChart>> {
        let report = self.reports.behavior_report(tenant, upload, evidence).await?;
        let critique = report
            .payload()
            .get("report")
            .and_then(Value::as_str)
            .ok_or_else(|| PipelineError::validation("behaviour report has no `report` text"))?;

        self.generate_from_critique(tenant, upload, critique, evidence).await
    }

    /// Synthesize and persist charts for an existing critique
    ///
    /// # Errors
    /// See [`ChartPipeline::generate`].
    pub async fn generate_from_critique(
        &self,
        tenant: &TenantId,
        upload: &SubjectId,
        critique: &str,
        evidence: &RawEvidence,
    ) -> PipelineResult<Vec<StoredChart>> {
        let findings = self.extractor.extract(critique)?;
        tracing::info!(
            tenant = %tenant,
            subject = %upload,
            findings = findings.len(),
            "synthesizing charts"
        );

        let raw = self.synthesizer.synthesize(&findings, evidence).await?;
        let pairs = correlate_with(self.config.correlation, &findings, &raw)?;

        let mut stored = Vec::with_capacity(pairs.len());
        for (finding, spec) in pairs {
            let slug = self.config.chart_naming.name(&finding);
            let key = ArtifactKey::chart_spec(tenant.clone(), upload.clone(), slug.clone())?;
            let artifact = self.manager().put(key, spec.payload).await?;
            stored.push(StoredChart {
                slug,
                finding_index: Some(finding.index),
                path: artifact.path().to_path_buf(),
                payload: artifact.into_payload(),
            });
        }

        let keep: Vec<String> = stored.iter().map(|c| c.slug.clone()).collect();
        self.manager().retain_chart_specs(tenant, upload, &keep).await?;

        tracing::info!(
            tenant = %tenant,
            subject = %upload,
            charts = stored.len(),
            dropped = findings.len() - stored.len(),
            "persisted charts"
        );
        Ok(stored)
    }

    /// Existing charts for an upload, generating them when there are none
    ///
    /// # Errors
    /// See [`ChartPipeline::generate`]; listing errors surface as
    /// [`PipelineError::Persistence`].
    pub async fn charts(
        &self,
        tenant: &TenantId,
        upload: &SubjectId,
        evidence: &RawEvidence,
    ) -> PipelineResult<Vec<StoredChart>> {
        let listed = self.manager().list_chart_specs(tenant, upload).await?;
        if listed.is_empty() {
            return self.generate(tenant, upload, evidence).await;
        }

        tracing::debug!(tenant = %tenant, subject = %upload, charts = listed.len(), "serving listed charts");
        listed
            .into_iter()
            .map(|chart| -> PipelineResult<StoredChart> {
                let key = ArtifactKey::chart_spec(tenant.clone(), upload.clone(), chart.slug.clone())?;
                Ok(StoredChart {
                    path: self.manager().store().path_for(&key),
                    slug: chart.slug,
                    finding_index: None,
                    payload: chart.payload,
                })
            })
            .collect()
    }
}
