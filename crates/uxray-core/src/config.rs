//! Pipeline configuration
//!
//! Loaded from TOML; every field has a default so a partial file works.
//!
//! ```toml
//! store_root = "/var/lib/uxray/records"
//! summary_cache_capacity = 10000
//! metrics_ttl_secs = 3600
//! correlation = "index-echoing"
//! chart_naming = "indexed"
//! header_labels = ["findings:", "observations:"]
//! ```

use crate::error::{PipelineError, PipelineResult};
use crate::metrics::{MetricsLookup, MetricsSource, DEFAULT_METRICS_TTL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uxray_findings::{ChartNaming, CorrelationPolicy, ExtractorOptions, FINDINGS_HEADER};
use uxray_store::ArtifactCacheManager;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of the artifact store
    pub store_root: PathBuf,
    /// Fast-lookup cache capacity (entries)
    pub summary_cache_capacity: u64,
    /// Web-metrics cache lifetime in seconds
    pub metrics_ttl_secs: u64,
    /// Largest evidence file accepted (bytes)
    pub max_evidence_bytes: u64,
    /// How spec lines are matched to findings
    pub correlation: CorrelationPolicy,
    /// How chart specs are named on disk
    pub chart_naming: ChartNaming,
    /// Header lines skipped by the extractor
    pub header_labels: Vec<String>,
}

impl PipelineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text and validate
    ///
    /// # Errors
    /// Returns [`PipelineError::Config`] on syntax or validation failure.
    pub fn from_toml_str(text: &str) -> PipelineResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// Returns [`PipelineError::Config`] if the file is unreadable or invalid.
    pub async fn load(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PipelineError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Reject zero capacities and empty roots
    ///
    /// # Errors
    /// Returns [`PipelineError::Config`] naming the offending field.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.store_root.as_os_str().is_empty() {
            return Err(PipelineError::Config("store_root must not be empty".into()));
        }
        if self.summary_cache_capacity == 0 {
            return Err(PipelineError::Config("summary_cache_capacity must be positive".into()));
        }
        if self.metrics_ttl_secs == 0 {
            return Err(PipelineError::Config("metrics_ttl_secs must be positive".into()));
        }
        if self.max_evidence_bytes == 0 {
            return Err(PipelineError::Config("max_evidence_bytes must be positive".into()));
        }
        Ok(())
    }

    /// With store root
    #[inline]
    #[must_use]
    pub fn with_store_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.store_root = root.into();
        self
    }

    /// With fast-lookup cache capacity
    #[inline]
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.summary_cache_capacity = capacity;
        self
    }

    /// With correlation policy
    #[inline]
    #[must_use]
    pub fn with_correlation(mut self, policy: CorrelationPolicy) -> Self {
        self.correlation = policy;
        self
    }

    /// With chart naming scheme
    #[inline]
    #[must_use]
    pub fn with_chart_naming(mut self, naming: ChartNaming) -> Self {
        self.chart_naming = naming;
        self
    }

    /// With extractor header labels
    #[inline]
    #[must_use]
    pub fn with_header_labels(mut self, labels: Vec<String>) -> Self {
        self.header_labels = labels;
        self
    }

    /// Metrics cache lifetime
    #[inline]
    #[must_use]
    pub fn metrics_ttl(&self) -> Duration {
        Duration::from_secs(self.metrics_ttl_secs)
    }

    /// Web-metrics lookup over `source`, cached for `metrics_ttl_secs`
    #[must_use]
    pub fn metrics_lookup(&self, source: Arc<dyn MetricsSource>) -> MetricsLookup {
        MetricsLookup::new(source, self.metrics_ttl())
    }

    /// Extractor options derived from this config
    #[must_use]
    pub fn extractor_options(&self) -> ExtractorOptions {
        ExtractorOptions {
            header_labels: self.header_labels.clone(),
            ..ExtractorOptions::default()
        }
    }

    /// Build a cache manager over the configured store
    #[must_use]
    pub fn build_manager(&self) -> ArtifactCacheManager {
        ArtifactCacheManager::new(&self.store_root, self.summary_cache_capacity)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from("Records"),
            summary_cache_capacity: 10_000,
            metrics_ttl_secs: DEFAULT_METRICS_TTL.as_secs(),
            max_evidence_bytes: 10 * 1024 * 1024, // 10MB
            correlation: CorrelationPolicy::IndexEchoing,
            chart_naming: ChartNaming::Slug,
            header_labels: vec![FINDINGS_HEADER.to_string()],
        }
    }
}
