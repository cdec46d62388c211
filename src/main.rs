//! fin-thread binary entrypoint.
//! Loads config, wires one pipeline per job and runs them on their intervals
//! until Ctrl-C.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fin_thread::bootstrap::Runtime;
use fin_thread::config::AppConfig;
use fin_thread::observe::Metrics;
use fin_thread::scheduler;

/// `RUST_LOG` drives the filter; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fin_thread=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

async fn serve_metrics(metrics: &Metrics) -> Result<()> {
    let Ok(addr) = std::env::var("METRICS_ADDR") else {
        return Ok(());
    };
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("METRICS_ADDR {addr:?} is not a socket address"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding metrics listener on {addr}"))?;
    let router = metrics.router();
    tracing::info!(%addr, "serving /metrics and /health");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "metrics server stopped");
        }
    });
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let metrics = Metrics::init()?;
    serve_metrics(&metrics).await?;

    let cfg = AppConfig::load_default()?;
    let runtime = Runtime::from_config(cfg).await?;
    if runtime.jobs.is_empty() {
        tracing::warn!("no jobs configured; nothing to schedule");
        return Ok(());
    }

    let (tx, rx) = watch::channel(false);
    let handles = scheduler::spawn_all(runtime.jobs, rx);

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    tracing::info!("shutdown requested");
    let _ = tx.send(true);

    for h in handles {
        if let Err(e) = h.await {
            tracing::error!(error = %e, "job task panicked");
        }
    }
    Ok(())
}
