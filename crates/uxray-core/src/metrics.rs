//! Page-speed metrics lookup
//!
//! The metrics service is a black box (url in, metric map out). Results are
//! kept in a per-URL TTL cache so repeated reports inside the window do not
//! call the service again.

use crate::error::{BackendError, PipelineError, PipelineResult, Stage};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Metric name to display value, e.g. `"Speed Index" -> "3.1 s"`
pub type MetricMap = BTreeMap<String, String>;

/// Default metrics cache lifetime (one hour)
pub const DEFAULT_METRICS_TTL: Duration = Duration::from_secs(3600);

/// Page-speed metrics service
#[async_trait::async_trait]
pub trait MetricsSource: Send + Sync {
    /// Fetch display metrics for `url`
    ///
    /// # Errors
    /// Returns [`BackendError`] when the service fails.
    async fn fetch(&self, url: &str) -> Result<MetricMap, BackendError>;
}

/// Request for a web-metrics report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebMetricsRequest {
    /// Page to measure
    pub url: String,
    /// Label used in the payload key (`"<label> metrics"`)
    pub label: String,
}

impl WebMetricsRequest {
    /// Create request
    pub fn new(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
        }
    }

    /// Reject blank fields
    ///
    /// # Errors
    /// Returns [`PipelineError::Validation`] naming the missing field.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.url.trim().is_empty() {
            return Err(PipelineError::validation("web metrics request is missing `url`"));
        }
        if self.label.trim().is_empty() {
            return Err(PipelineError::validation("web metrics request is missing `label`"));
        }
        Ok(())
    }

    /// Payload key for the metric map
    #[must_use]
    pub fn payload_key(&self) -> String {
        format!("{} metrics", self.label.trim())
    }
}

/// TTL-cached access to a [`MetricsSource`]
#[derive(Clone)]
pub struct MetricsLookup {
    source: Arc<dyn MetricsSource>,
    cache: Cache<String, MetricMap>,
}

impl MetricsLookup {
    /// Wrap a source with a TTL cache
    #[must_use]
    pub fn new(source: Arc<dyn MetricsSource>, ttl: Duration) -> Self {
        Self {
            source,
            cache: Cache::builder().max_capacity(1_000).time_to_live(ttl).build(),
        }
    }

    /// Metrics for `url`, from cache when fresh
    ///
    /// # Errors
    /// Returns [`PipelineError::UpstreamUnavailable`] if the source fails.
    pub async fn get(&self, url: &str) -> PipelineResult<MetricMap> {
        let url = url.trim();
        if let Some(hit) = self.cache.get(url).await {
            tracing::debug!(%url, "metrics cache hit");
            return Ok(hit);
        }

        let metrics = self
            .source
            .fetch(url)
            .await
            .map_err(|e| PipelineError::upstream(Stage::Report, e))?;
        self.cache.insert(url.to_string(), metrics.clone()).await;
        Ok(metrics)
    }
}

impl std::fmt::Debug for MetricsLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsLookup")
            .field("entries", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}
