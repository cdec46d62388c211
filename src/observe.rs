//! Observer implementations plus the Prometheus recorder and its HTTP router.

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::error::{PipelineError, Stage};
use crate::pipeline::types::{Observer, RunReport};

/// Observer that does nothing. Default for a freshly built pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Emits a breadcrumb per stage boundary through `tracing`, and stage item
/// counts through `metrics`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn stage_started(&self, source: &str, stage: Stage) {
        tracing::debug!(target: "pipeline", source, stage = stage.as_str(), "stage started");
    }

    fn stage_finished(&self, source: &str, stage: Stage, items: usize) {
        tracing::info!(target: "pipeline", source, stage = stage.as_str(), items, "stage finished");
        histogram!("pipeline_stage_items", "stage" => stage.as_str()).record(items as f64);
    }

    fn capture(&self, source: &str, err: &PipelineError) {
        if err.is_fatal() {
            tracing::error!(target: "pipeline", source, kind = err.label(), error = ?err, "captured");
        } else {
            tracing::warn!(target: "pipeline", source, kind = err.label(), error = ?err, "captured");
        }
    }

    fn run_finished(&self, source: &str, report: &RunReport) {
        tracing::info!(
            target: "pipeline",
            source,
            status = ?report.status,
            published = report.published,
            skipped = report.skipped_suspicious + report.skipped_empty_meta,
            "run finished"
        );
    }
}

/// One-time metric descriptions so series show up on /metrics with help text.
pub fn describe_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Pipeline runs by source and outcome.");
        describe_counter!("pipeline_published_total", "Items published to the channel.");
        describe_counter!("pipeline_skipped_total", "Items held back by publish filters.");
        describe_counter!("pipeline_failures_total", "Failed runs by error kind.");
        describe_histogram!("pipeline_run_ms", "Run duration in milliseconds.");
        describe_histogram!("pipeline_stage_items", "Items leaving each stage.");
        describe_gauge!("pipeline_last_run_ts", "Unix ts when a pipeline run last ended.");
        describe_counter!("ingest_events_total", "Items parsed from providers.");
        describe_counter!("ingest_provider_errors_total", "Provider fetch/parse errors.");
        describe_histogram!("ingest_parse_ms", "Provider parse time in milliseconds.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already installed.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_metrics();
        Ok(Self { handle })
    }

    /// Router exposing `/metrics` (Prometheus text format) and `/health`.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new()
            .route(
                "/metrics",
                get(move || {
                    let h = handle.clone();
                    async move { h.render() }
                }),
            )
            .route("/health", get(|| async { "ok" }))
    }
}
