//! UX-Ray Core - derived-artifact pipeline
//!
//! Turns scraped pages and uploaded analytics into cached reports and
//! charts:
//! - Computes UI, behaviour, formulation and web-metrics reports once and reuses them
//! - Parses critique findings and synthesizes one chart config per finding
//! - Validates, correlates and persists chart specs under stable names
//! - Invalidates derived artifacts when evidence changes
//!
//! External services (generative backend, metrics, chart renderer) are
//! traits; nothing here talks to the network.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use uxray_core::prelude::*;
//!
//! let config = PipelineConfig::load("uxray.toml").await?;
//! let manager = Arc::new(config.build_manager());
//! let reports = ReportService::new(backend.clone(), manager);
//! let pipeline = ChartPipeline::new(config, reports, VisualizationSynthesizer::new(backend));
//!
//! let evidence = RawEvidence::load("sessions.csv", pipeline.config().max_evidence_bytes).await?;
//! let charts = pipeline.charts(&tenant, &upload, &evidence).await?;
//! ```

#![warn(unreachable_pub)]

pub mod backend;
pub mod config;
pub mod error;
pub mod evidence;
pub mod metrics;
pub mod pipeline;
pub mod render;
pub mod reports;
pub mod synthesizer;

pub use backend::{prompts, GenerativeBackend, PayloadPart};
pub use config::PipelineConfig;
pub use error::{BackendError, ErrorReport, EvidenceError, PipelineError, PipelineResult, Stage};
pub use evidence::{EvidenceEvent, EvidenceFormat, EvidenceTracker, PageSnapshot, RawEvidence, SubStep};
pub use metrics::{MetricMap, MetricsLookup, MetricsSource, WebMetricsRequest, DEFAULT_METRICS_TTL};
pub use pipeline::{ChartPipeline, StoredChart};
pub use render::{render_chart, ChartRenderer};
pub use reports::ReportService;
pub use synthesizer::VisualizationSynthesizer;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with UX-Ray Core
    pub use crate::{
        ChartPipeline, EvidenceEvent, EvidenceTracker, GenerativeBackend, PageSnapshot,
        PipelineConfig, PipelineError, RawEvidence, ReportService, StoredChart,
        VisualizationSynthesizer,
    };
    pub use uxray_artifact::{SubjectId, TenantId};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::backend::MockGenerativeBackend;
    use std::sync::Arc;
    use tempfile::TempDir;
    use uxray_artifact::{SubjectId, TenantId};

    #[tokio::test]
    async fn evidence_change_forces_new_critique() {
        let dir = TempDir::new().unwrap();
        let mut mock = MockGenerativeBackend::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_invoke()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok("findings:\n1. Old finding.".into()));
        mock.expect_invoke()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok("findings:\n1. New finding.".into()));

        let config = PipelineConfig::new().with_store_root(dir.path());
        let manager = Arc::new(config.build_manager());
        let reports = ReportService::new(Arc::new(mock), Arc::clone(&manager));
        let tracker = EvidenceTracker::new(Arc::clone(&manager));
        let tenant = TenantId::new("1").unwrap();
        let upload = SubjectId::new("u1").unwrap();
        let evidence = RawEvidence::csv("a,b");

        let before = reports.behavior_report(&tenant, &upload, &evidence).await.unwrap();
        let cached = reports.behavior_report(&tenant, &upload, &evidence).await.unwrap();
        tracker.record(&EvidenceEvent::Updated(upload.clone())).unwrap();
        let after = reports.behavior_report(&tenant, &upload, &evidence).await.unwrap();

        assert_eq!(before, cached);
        assert_eq!(after.payload()["report"], "findings:\n1. New finding.");
        assert_eq!(after.path(), before.path());
    }
}
