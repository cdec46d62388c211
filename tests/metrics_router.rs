// tests/metrics_router.rs
// One test per binary: the Prometheus recorder is process-global.
mod common;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use chrono::Duration as ChronoDuration;
use common::*;
use fin_thread::config::PipelineConfig;
use fin_thread::observe::{Metrics, TracingObserver};
use fin_thread::pipeline::Pipeline;
use std::sync::Arc;
use tower::ServiceExt;

#[tokio::test]
async fn metrics_endpoint_exposes_pipeline_series() {
    let metrics = Metrics::init().expect("recorder installs once per process");

    let cfg = PipelineConfig::builder()
        .lookback(ChronoDuration::minutes(5))
        .compose(true)
        .persist(true)
        .dedupe(true)
        .build()
        .unwrap();
    let p = Pipeline::new(
        "reuters",
        cfg,
        FixedSource::new(abc()),
        ScriptedEnricher::echo(),
        RecordingArchive::new(),
        RecordingPublisher::failing_at(Some(3)),
    )
    .with_observer(Arc::new(TracingObserver));
    let _ = p.run().await.unwrap_err();

    let app = metrics.router();
    let resp = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "pipeline_runs_total",
        "outcome=\"failed\"",
        "pipeline_published_total 2",
        "pipeline_failures_total{kind=\"publish_failed\"} 1",
        "pipeline_run_ms",
        "pipeline_stage_items",
        "pipeline_last_run_ts",
    ] {
        assert!(text.contains(needle), "missing {needle} in:\n{text}");
    }

    let health = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}
