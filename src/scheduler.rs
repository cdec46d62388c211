// src/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::pipeline::Pipeline;

/// A pipeline plus how often and for how long it runs.
#[derive(Clone)]
pub struct Job {
    pub pipeline: Arc<Pipeline>,
    pub interval: Duration,
    pub timeout: Duration,
}

/// Spawn one task per job. Each tick runs the job's pipeline once, bounded by
/// its timeout; flipping `shutdown` to `true` stops the loop and cancels an
/// in-flight run.
pub fn spawn_job(job: Job, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stop = shutdown.clone();
        let mut ticker = tokio::time::interval(job.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = async { let _ = stop.wait_for(|v| *v).await; } => break,
            }

            let mut cancel = shutdown.clone();
            let cancelled = async move {
                let _ = cancel.wait_for(|v| *v).await;
            };
            match job.pipeline.run_until(job.timeout, cancelled).await {
                Ok(report) => tracing::debug!(
                    target: "pipeline",
                    source = job.pipeline.name(),
                    status = ?report.status,
                    "scheduled run done"
                ),
                // Already logged and captured by the pipeline; the next tick supersedes it.
                Err(e) => tracing::debug!(target: "pipeline", source = job.pipeline.name(), error = %e, "scheduled run failed"),
            }

            if *shutdown.borrow() {
                break;
            }
        }
        tracing::info!(target: "pipeline", source = job.pipeline.name(), "job stopped");
    })
}

pub fn spawn_all(jobs: Vec<Job>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
    jobs.into_iter()
        .map(|job| spawn_job(job, shutdown.clone()))
        .collect()
}
