//! End-to-end chart pipeline behaviour.
//!
//! Guarantees exercised here:
//! - Critique findings are extracted without annotation spans.
//! - Spec lines are correlated to findings; errored findings are dropped,
//!   never substituted.
//! - Derived artifacts are computed once per key until evidence changes.
//! - An empty critique stops the run before the synthesizer is called.

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use uxray_core::prelude::*;
use uxray_core::{prompts, render_chart, MetricMap, Stage, WebMetricsRequest};
use uxray_findings::extract;
use uxray_test_utils::{
    setup_pipeline, subject, temp_manager, tenant, RecordingRenderer, ScriptedBackend,
    StaticMetrics, CHECKOUT_CHARTS, CHECKOUT_CRITIQUE, CHECKOUT_EVIDENCE,
};

fn checkout_backend() -> Arc<ScriptedBackend> {
    Arc::new(
        ScriptedBackend::new()
            .respond(prompts::BEHAVIOR_SYSTEM, CHECKOUT_CRITIQUE)
            .respond(prompts::CHART_SYSTEM, CHECKOUT_CHARTS),
    )
}

/// Annotation lines never leak into finding bodies.
#[test]
fn critique_yields_two_clean_findings() {
    let findings = extract(CHECKOUT_CRITIQUE).unwrap();
    let texts: Vec<_> = findings.iter().map(|f| f.text.as_str()).collect();

    assert_eq!(
        texts,
        vec!["Drop-off at checkout. Users abandon after step 2.", "Slow page load on mobile."]
    );
}

/// An errored spec line drops its finding instead of shifting the next spec onto it.
#[tokio::test]
async fn errored_finding_is_dropped() {
    let (dir, manager) = temp_manager();
    let backend = checkout_backend();
    let pipeline = setup_pipeline(
        PipelineConfig::new().with_store_root(dir.path()),
        Arc::clone(&backend),
        manager,
    );

    let charts = pipeline
        .generate(&tenant(), &subject("upload-5"), &RawEvidence::csv(CHECKOUT_EVIDENCE))
        .await
        .unwrap();

    assert_eq!(charts.len(), 1);
    assert_eq!(charts[0].finding_index, Some(1));
    assert_eq!(charts[0].payload, json!({"type": "bar"}));
}

/// Repeated requests for the same report reuse the stored artifact.
#[tokio::test]
async fn repeated_report_requests_compute_once() {
    let (_dir, manager) = temp_manager();
    let backend = checkout_backend();
    let reports = ReportService::new(backend.clone(), manager);
    let upload = subject("upload-5");
    let evidence = RawEvidence::csv(CHECKOUT_EVIDENCE);

    let first = reports.behavior_report(&tenant(), &upload, &evidence).await.unwrap();
    let second = reports.behavior_report(&tenant(), &upload, &evidence).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(backend.calls_for(prompts::BEHAVIOR_SYSTEM), 1);
}

/// Stored reports survive a restart of the cache layer.
#[tokio::test]
async fn stored_report_survives_restart() {
    let (dir, manager) = temp_manager();
    let backend = checkout_backend();
    let upload = subject("upload-5");
    let evidence = RawEvidence::csv(CHECKOUT_EVIDENCE);

    ReportService::new(backend.clone(), manager)
        .behavior_report(&tenant(), &upload, &evidence)
        .await
        .unwrap();

    let restarted = Arc::new(uxray_store::ArtifactCacheManager::new(dir.path(), 16));
    let report = ReportService::new(backend.clone(), restarted)
        .behavior_report(&tenant(), &upload, &evidence)
        .await
        .unwrap();

    assert_eq!(report.payload()["report"], CHECKOUT_CRITIQUE);
    assert_eq!(backend.calls_for(prompts::BEHAVIOR_SYSTEM), 1);
}

/// A critique without findings never reaches the synthesizer.
#[tokio::test]
async fn empty_critique_skips_synthesis() {
    let (dir, manager) = temp_manager();
    let backend = Arc::new(
        ScriptedBackend::new()
            .respond(prompts::BEHAVIOR_SYSTEM, "")
            .respond(prompts::CHART_SYSTEM, CHECKOUT_CHARTS),
    );
    let pipeline = setup_pipeline(
        PipelineConfig::new().with_store_root(dir.path()),
        Arc::clone(&backend),
        manager,
    );

    let err = pipeline
        .generate_from_critique(&tenant(), &subject("upload-5"), "", &RawEvidence::csv("x"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::EmptyExtraction(_)));
    assert_eq!(err.stage(), Stage::Extraction);
    assert_eq!(backend.calls_for(prompts::CHART_SYSTEM), 0);
}

/// Evidence updates make the next request recompute.
#[tokio::test]
async fn evidence_update_invalidates_charts() {
    let (dir, manager) = temp_manager();
    let backend = checkout_backend();
    let pipeline = setup_pipeline(
        PipelineConfig::new().with_store_root(dir.path()),
        Arc::clone(&backend),
        Arc::clone(&manager),
    );
    let tracker = EvidenceTracker::new(manager);
    let upload = subject("upload-5");
    let evidence = RawEvidence::csv(CHECKOUT_EVIDENCE);

    pipeline.charts(&tenant(), &upload, &evidence).await.unwrap();
    pipeline.charts(&tenant(), &upload, &evidence).await.unwrap();
    assert_eq!(backend.calls_for(prompts::CHART_SYSTEM), 1);

    tracker.record(&EvidenceEvent::Updated(upload.clone())).unwrap();
    let charts = pipeline.charts(&tenant(), &upload, &evidence).await.unwrap();

    assert_eq!(charts.len(), 1);
    assert_eq!(backend.calls_for(prompts::BEHAVIOR_SYSTEM), 2);
    assert_eq!(backend.calls_for(prompts::CHART_SYSTEM), 2);
}

/// Upstream failures name the failing stage and are retryable.
#[tokio::test]
async fn backend_outage_is_reported_by_stage() {
    let (dir, manager) = temp_manager();
    let backend = Arc::new(
        ScriptedBackend::new()
            .respond(prompts::BEHAVIOR_SYSTEM, CHECKOUT_CRITIQUE)
            .fail(prompts::CHART_SYSTEM, uxray_core::BackendError::unavailable("503")),
    );
    let pipeline = setup_pipeline(
        PipelineConfig::new().with_store_root(dir.path()),
        backend,
        manager,
    );

    let report = pipeline
        .generate(&tenant(), &subject("upload-5"), &RawEvidence::csv("x"))
        .await
        .unwrap_err()
        .report();

    assert_eq!(report.stage, Stage::Synthesis);
    assert!(report.retryable);
}

/// Web metrics are fetched once per page and labelled by the request.
#[tokio::test]
async fn web_metrics_fetch_once() {
    let (_dir, manager) = temp_manager();
    let source = Arc::new(StaticMetrics::new(MetricMap::from([(
        "Largest Contentful Paint".to_string(),
        "2.4 s".to_string(),
    )])));
    let reports = ReportService::new(checkout_backend(), manager)
        .with_metrics(PipelineConfig::new().metrics_lookup(source.clone()));
    let request = WebMetricsRequest::new("https://shop.test", "Shop");

    let first = reports.web_metrics(&tenant(), &subject("page-1"), &request).await.unwrap();
    reports.web_metrics(&tenant(), &subject("page-1"), &request).await.unwrap();

    assert_eq!(first.payload(), &json!({"Shop metrics": {"Largest Contentful Paint": "2.4 s"}}));
    assert_eq!(source.fetch_count(), 1);
}

/// Stored chart specs are valid renderer input.
#[tokio::test]
async fn stored_charts_render() {
    let (dir, manager) = temp_manager();
    let pipeline = setup_pipeline(
        PipelineConfig::new().with_store_root(dir.path()),
        checkout_backend(),
        manager,
    );
    let renderer = RecordingRenderer::default();

    let charts = pipeline
        .generate(&tenant(), &subject("upload-5"), &RawEvidence::csv(CHECKOUT_EVIDENCE))
        .await
        .unwrap();
    let text = std::fs::read_to_string(&charts[0].path).unwrap();
    let image = render_chart(&renderer, &text).await.unwrap();

    assert!(image.starts_with(b"\x89PNG"));
    assert_eq!(renderer.rendered(), vec![json!({"type": "bar"})]);
}

/// Non-object specs are persisted but refused by the renderer.
#[tokio::test]
async fn array_spec_is_stored_but_not_rendered() {
    let (dir, manager) = temp_manager();
    let backend = Arc::new(
        ScriptedBackend::new()
            .respond(prompts::BEHAVIOR_SYSTEM, "findings:\n1. Checkout drop-off.")
            .respond(prompts::CHART_SYSTEM, "$ [120, 420, 1000]"),
    );
    let pipeline = setup_pipeline(
        PipelineConfig::new().with_store_root(dir.path()),
        backend,
        manager,
    );
    let renderer = RecordingRenderer::default();

    let charts = pipeline
        .generate(&tenant(), &subject("upload-5"), &RawEvidence::csv(CHECKOUT_EVIDENCE))
        .await
        .unwrap();
    assert_eq!(charts.len(), 1);
    assert_eq!(charts[0].payload, json!([120, 420, 1000]));

    let text = std::fs::read_to_string(&charts[0].path).unwrap();
    let err = render_chart(&renderer, &text).await.unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
    assert!(renderer.rendered().is_empty());
}

/// The synthesizer payload lists the extracted findings, not the raw critique.
#[tokio::test]
async fn synthesizer_receives_clean_findings() {
    let (dir, manager) = temp_manager();
    let backend = checkout_backend();
    let pipeline = setup_pipeline(
        PipelineConfig::new().with_store_root(dir.path()),
        Arc::clone(&backend),
        manager,
    );

    pipeline
        .generate(&tenant(), &subject("upload-5"), &RawEvidence::csv(CHECKOUT_EVIDENCE))
        .await
        .unwrap();

    let call = backend
        .calls()
        .into_iter()
        .find(|c| c.system == prompts::CHART_SYSTEM)
        .unwrap();
    assert_eq!(
        call.payload[1].as_text(),
        Some("Findings:\n1. Drop-off at checkout. Users abandon after step 2.\n2. Slow page load on mobile.")
    );
}
