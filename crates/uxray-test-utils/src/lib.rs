//! Testing utilities for UX-Ray workspace
//!
//! Shared test doubles, fixtures, and setup helpers.

#![allow(missing_docs)]

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use uxray_artifact::{SubjectId, TenantId};
use uxray_core::{
    BackendError, ChartPipeline, ChartRenderer, GenerativeBackend, MetricMap, MetricsSource,
    PayloadPart, PipelineConfig, ReportService, VisualizationSynthesizer,
};
use uxray_store::ArtifactCacheManager;

pub const CHECKOUT_CRITIQUE: &str = "findings:\n1. Drop-off at checkout. Users abandon after step 2.\n   ## internal note ##\n2. Slow page load on mobile.\n";

pub const CHECKOUT_CHARTS: &str = "$ {\"type\":\"bar\"}\n$ERROR: finding 2 – insufficient data\n";

pub const CHECKOUT_EVIDENCE: &str = "step,users\nproduct,1000\ncart,420\ncheckout,120\n";

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub system: String,
    pub payload: Vec<PayloadPart>,
}

/// Backend answering from a script keyed by system prompt; counts calls
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    responses: Mutex<HashMap<String, Result<String, BackendError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `system` with `response`
    pub fn respond(self, system: &str, response: impl Into<String>) -> Self {
        self.responses
            .lock()
            .insert(system.to_string(), Ok(response.into()));
        self
    }

    /// Fail calls for `system`
    pub fn fail(self, system: &str, error: BackendError) -> Self {
        self.responses.lock().insert(system.to_string(), Err(error));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Calls made with `system`
    pub fn calls_for(&self, system: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.system == system).count()
    }
}

#[async_trait::async_trait]
impl GenerativeBackend for ScriptedBackend {
    async fn invoke(&self, system: &str, payload: &[PayloadPart]) -> Result<String, BackendError> {
        self.calls.lock().push(RecordedCall {
            system: system.to_string(),
            payload: payload.to_vec(),
        });
        self.responses
            .lock()
            .get(system)
            .cloned()
            .unwrap_or_else(|| Err(BackendError::Rejected(format!("no scripted response for: {system}"))))
    }
}

/// Metrics source returning a fixed map; counts fetches
#[derive(Debug, Default)]
pub struct StaticMetrics {
    metrics: MetricMap,
    fetches: Mutex<Vec<String>>,
}

impl StaticMetrics {
    pub fn new(metrics: MetricMap) -> Self {
        Self {
            metrics,
            fetches: Mutex::new(Vec::new()),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().len()
    }
}

#[async_trait::async_trait]
impl MetricsSource for StaticMetrics {
    async fn fetch(&self, url: &str) -> Result<MetricMap, BackendError> {
        self.fetches.lock().push(url.to_string());
        Ok(self.metrics.clone())
    }
}

/// Renderer that records configs and returns a fixed image
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    rendered: Mutex<Vec<Value>>,
}

impl RecordingRenderer {
    pub fn rendered(&self) -> Vec<Value> {
        self.rendered.lock().clone()
    }
}

#[async_trait::async_trait]
impl ChartRenderer for RecordingRenderer {
    async fn render(&self, config: &Value) -> Result<Vec<u8>, BackendError> {
        self.rendered.lock().push(config.clone());
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }
}

pub fn tenant() -> TenantId {
    TenantId::new("17").unwrap()
}

pub fn subject(id: &str) -> SubjectId {
    SubjectId::new(id).unwrap()
}

/// Cache manager over a fresh temp directory; keep the `TempDir` alive
pub fn temp_manager() -> (TempDir, Arc<ArtifactCacheManager>) {
    let dir = TempDir::new().unwrap();
    let manager = Arc::new(ArtifactCacheManager::new(dir.path(), 1_000));
    (dir, manager)
}

/// Pipeline wired to `backend` over `manager`
pub fn setup_pipeline(
    config: PipelineConfig,
    backend: Arc<ScriptedBackend>,
    manager: Arc<ArtifactCacheManager>,
) -> ChartPipeline {
    let reports = ReportService::new(backend.clone(), manager);
    ChartPipeline::new(config, reports, VisualizationSynthesizer::new(backend))
}
