//! Report services
//!
//! Every report is a cached artifact: the first request computes and
//! persists it, later requests are served from the fast-lookup cache or
//! disk until the subject's evidence changes.

use crate::backend::{prompts, GenerativeBackend, PayloadPart};
use crate::error::{BackendError, PipelineError, PipelineResult, Stage};
use crate::evidence::{PageSnapshot, RawEvidence};
use crate::metrics::{MetricsLookup, WebMetricsRequest};
use serde_json::{json, Value};
use std::sync::Arc;
use uxray_artifact::{Artifact, ArtifactKey, ArtifactKind, SubjectId, TenantId};
use uxray_store::ArtifactCacheManager;

/// Computes and caches UI, behaviour, formulation and web-metrics reports
#[derive(Clone)]
pub struct ReportService {
    backend: Arc<dyn GenerativeBackend>,
    manager: Arc<ArtifactCacheManager>,
    metrics: Option<MetricsLookup>,
}

impl ReportService {
    /// Create service without a metrics source
    #[must_use]
    pub fn new(backend: Arc<dyn GenerativeBackend>, manager: Arc<ArtifactCacheManager>) -> Self {
        Self {
            backend,
            manager,
            metrics: None,
        }
    }

    /// With page-speed metrics lookup
    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsLookup) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Cache manager in use
    #[inline]
    #[must_use]
    pub fn manager(&self) -> &Arc<ArtifactCacheManager> {
        &self.manager
    }

    /// UI report: structure and styling analyses run concurrently
    ///
    /// # Errors
    /// - [`PipelineError::Validation`] if the snapshot has no usable part
    /// - [`PipelineError::UpstreamUnavailable`] if either analysis fails
    pub async fn ui_report(
        &self,
        tenant: &TenantId,
        page: &SubjectId,
        snapshot: &PageSnapshot,
    ) -> PipelineResult<Artifact> {
        let key = ArtifactKey::singleton(tenant.clone(), page.clone(), ArtifactKind::UiReport)?;

        self.manager
            .get_or_compute(key, || async {
                if snapshot.is_empty() {
                    return Err(PipelineError::validation(
                        "page snapshot has no HTML, CSS or screenshot",
                    ));
                }
                let structure_payload = snapshot.payload(prompts::STRUCTURE_PROMPT);
                let styling_payload = snapshot.payload(prompts::STYLING_PROMPT);

                let (structure, styling) = tokio::try_join!(
                    self.ask(prompts::STRUCTURE_SYSTEM, &structure_payload),
                    self.ask(prompts::STYLING_SYSTEM, &styling_payload),
                )?;
                Ok(json!({
                    "structure_report": structure,
                    "styling_report": styling,
                }))
            })
            .await
    }

    /// Behaviour report: critique of an upload's raw evidence
    ///
    /// # Errors
    /// Returns [`PipelineError::UpstreamUnavailable`] if the backend fails.
    pub async fn behavior_report(
        &self,
        tenant: &TenantId,
        upload: &SubjectId,
        evidence: &RawEvidence,
    ) -> PipelineResult<Artifact> {
        let key = ArtifactKey::singleton(tenant.clone(), upload.clone(), ArtifactKind::BehaviorReport)?;

        self.manager
            .get_or_compute(key, || async {
                let payload = [PayloadPart::text(prompts::BEHAVIOR_PROMPT), evidence.to_payload_part()];
                let report = self.ask(prompts::BEHAVIOR_SYSTEM, &payload).await?;
                Ok::<_, PipelineError>(json!({ "report": report }))
            })
            .await
    }

    /// Formulation: actionable recommendations from an evaluation document
    ///
    /// # Errors
    /// Returns [`PipelineError::UpstreamUnavailable`] if the backend fails.
    pub async fn formulation(
        &self,
        tenant: &TenantId,
        page: &SubjectId,
        evaluation: &Value,
    ) -> PipelineResult<Artifact> {
        let key = ArtifactKey::singleton(tenant.clone(), page.clone(), ArtifactKind::Formulation)?;

        self.manager
            .get_or_compute(key, || async {
                let payload = [
                    PayloadPart::text(prompts::FORMULATOR_PROMPT),
                    PayloadPart::text(evaluation.to_string()),
                ];
                let formulation = self.ask(prompts::FORMULATOR_SYSTEM, &payload).await?;
                Ok::<_, PipelineError>(json!({ "formulation": formulation }))
            })
            .await
    }

    /// Web-metrics report for an explicitly named URL
    ///
    /// # Errors
    /// - [`PipelineError::Validation`] for a blank url/label or no metrics source
    /// - [`PipelineError::UpstreamUnavailable`] if the metrics service fails
    pub async fn web_metrics(
        &self,
        tenant: &TenantId,
        page: &SubjectId,
        request: &WebMetricsRequest,
    ) -> PipelineResult<Artifact> {
        request.validate()?;
        let metrics = self
            .metrics
            .as_ref()
            .ok_or_else(|| PipelineError::validation("no metrics source configured"))?;
        let key = ArtifactKey::singleton(tenant.clone(), page.clone(), ArtifactKind::WebMetricsReport)?;

        self.manager
            .get_or_compute(key, || async {
                let map = metrics.get(&request.url).await?;
                Ok::<_, PipelineError>(json!({ (request.payload_key()): map }))
            })
            .await
    }

    async fn ask(&self, system: &str, payload: &[PayloadPart]) -> PipelineResult<String> {
        let text = self
            .backend
            .invoke(system, payload)
            .await
            .map_err(|e| PipelineError::upstream(Stage::Report, e))?;
        if text.trim().is_empty() {
            return Err(PipelineError::upstream(Stage::Report, BackendError::EmptyResponse));
        }
        Ok(text)
    }
}

impl std::fmt::Debug for ReportService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportService")
            .field("manager", &self.manager)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}
