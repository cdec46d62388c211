// src/pipeline/mod.rs
//! Pipeline controller: runs fetch → dedupe → compose → persist → publish →
//! update for one source, skipping stages per configuration and stopping at
//! the first fatal error.

pub mod carrier;
pub mod stages;
pub mod types;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use metrics::{counter, gauge, histogram};
use tracing::Instrument;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Stage};
use crate::observe::NoopObserver;
use carrier::RunData;
use types::{Archive, Enricher, Observer, Publisher, RunReport, RunStatus, Source};

pub struct Pipeline {
    name: String,
    config: PipelineConfig,
    source: Arc<dyn Source>,
    enricher: Arc<dyn Enricher>,
    archive: Arc<dyn Archive>,
    publisher: Arc<dyn Publisher>,
    observer: Arc<dyn Observer>,
}

impl Pipeline {
    /// Collaborators for stages the config disables are kept but never called.
    pub fn new(
        name: impl Into<String>,
        config: PipelineConfig,
        source: Arc<dyn Source>,
        enricher: Arc<dyn Enricher>,
        archive: Arc<dyn Archive>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            source,
            enricher,
            archive,
            publisher,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// One run with no time bound.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let span = tracing::info_span!("pipeline_run", source = %self.name);
        let started = Instant::now();

        let result = self.run_stages().instrument(span).await;

        let ms = started.elapsed().as_secs_f64() * 1_000.0;
        histogram!("pipeline_run_ms").record(ms);
        gauge!("pipeline_last_run_ts").set(Utc::now().timestamp() as f64);

        match &result {
            Ok(report) => {
                let outcome = if report.is_noop() { "noop" } else { "completed" };
                counter!("pipeline_runs_total", "source" => self.name.clone(), "outcome" => outcome)
                    .increment(1);
                self.observer.run_finished(&self.name, report);
            }
            Err(err) => self.fail(err),
        }
        result
    }

    /// One run bounded by `budget`. In-flight collaborator calls are dropped on expiry.
    pub async fn run_with_timeout(&self, budget: Duration) -> Result<RunReport, PipelineError> {
        self.run_until(budget, std::future::pending()).await
    }

    /// One run bounded by `budget` that also ends as soon as `cancel` resolves.
    ///
    /// Effects already committed by the archive or publisher are not undone.
    pub async fn run_until<C>(&self, budget: Duration, cancel: C) -> Result<RunReport, PipelineError>
    where
        C: Future<Output = ()>,
    {
        let aborted = tokio::select! {
            res = tokio::time::timeout(budget, self.run()) => match res {
                Ok(done) => return done,
                Err(_) => PipelineError::TimedOut(budget),
            },
            _ = cancel => PipelineError::Cancelled,
        };
        self.fail(&aborted);
        Err(aborted)
    }

    fn fail(&self, err: &PipelineError) {
        tracing::warn!(
            target: "pipeline",
            source = %self.name,
            stage = err.stage().map(|s| s.as_str()).unwrap_or("run"),
            kind = err.label(),
            error = %err,
            "run failed"
        );
        counter!("pipeline_runs_total", "source" => self.name.clone(), "outcome" => "failed")
            .increment(1);
        counter!("pipeline_failures_total", "kind" => err.label()).increment(1);
        self.observer.capture(&self.name, err);
    }

    fn noop(&self, mut report: RunReport, after: Stage) -> RunReport {
        tracing::info!(target: "pipeline", source = %self.name, after = after.as_str(), "nothing to do");
        report.status = RunStatus::NoOp { after };
        report
    }

    async fn run_stages(&self) -> Result<RunReport, PipelineError> {
        let cfg = &self.config;
        let mut report = RunReport::new();

        // Fetch: errors are recoverable, partial results are kept.
        self.observer.stage_started(&self.name, Stage::Fetch);
        let cutoff = cfg.fetch_cutoff().resolve(Utc::now());
        let fetched = stages::fetch(self.source.as_ref(), cutoff).await;
        if let Some(e) = fetched.error {
            let err = PipelineError::FetchFailed(e);
            tracing::warn!(target: "pipeline", source = %self.name, error = %err, "fetch reported an error, continuing");
            report.fetch_error = Some(err.to_string());
            self.observer.capture(&self.name, &err);
        }
        report.fetched = fetched.items.len();
        self.observer
            .stage_finished(&self.name, Stage::Fetch, report.fetched);
        if fetched.items.is_empty() {
            return Ok(self.noop(report, Stage::Fetch));
        }

        let mut data = RunData::new(fetched.items);

        if cfg.enable_dedupe() && cfg.enable_persistence() {
            self.observer.stage_started(&self.name, Stage::Dedupe);
            data.items = stages::dedupe(self.archive.as_ref(), data.items).await?;
            self.observer
                .stage_finished(&self.name, Stage::Dedupe, data.items.len());
            if data.items.is_empty() {
                return Ok(self.noop(report, Stage::Dedupe));
            }
        }
        report.fresh = data.items.len();

        if cfg.enable_composition() {
            self.observer.stage_started(&self.name, Stage::Compose);
            data.composed = stages::compose(self.enricher.as_ref(), &data.items).await?;
            report.composed = data.composed.len();
            self.observer
                .stage_finished(&self.name, Stage::Compose, report.composed);
        }

        // Records are built even without persistence so publish has something to walk.
        data.records =
            stages::build_records(&data.items, &data.composed, self.publisher.channel_id())?;

        if cfg.enable_persistence() {
            self.observer.stage_started(&self.name, Stage::Persist);
            report.persisted = stages::persist(self.archive.as_ref(), &data.records).await?;
            self.observer
                .stage_finished(&self.name, Stage::Persist, report.persisted);
        }

        if !data.records.is_empty() {
            self.observer.stage_started(&self.name, Stage::Publish);
            let tally =
                stages::publish(self.publisher.as_ref(), cfg, &mut data.records).await?;
            report.published = tally.published;
            report.skipped_suspicious = tally.skipped_suspicious;
            report.skipped_empty_meta = tally.skipped_empty_meta;
            self.observer
                .stage_finished(&self.name, Stage::Publish, report.published);
        }

        if cfg.enable_persistence() {
            self.observer.stage_started(&self.name, Stage::Update);
            report.updated = stages::update(self.archive.as_ref(), &data.records).await?;
            self.observer
                .stage_finished(&self.name, Stage::Update, report.updated);
        }

        tracing::info!(
            target: "pipeline",
            source = %self.name,
            fetched = report.fetched,
            fresh = report.fresh,
            composed = report.composed,
            persisted = report.persisted,
            published = report.published,
            "run completed"
        );
        Ok(report)
    }
}
