// src/bootstrap.rs
//! Wires collaborators from [`AppConfig`] into scheduled jobs.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::archive::{FileArchive, MemoryArchive};
use crate::compose::{DisabledComposer, OpenAiComposer};
use crate::config::{AppConfig, ChannelKind, JobConfig};
use crate::ingest::providers::RssProvider;
use crate::ingest::types::NewsProvider;
use crate::ingest::Journalist;
use crate::notify::{DiscordPublisher, StdoutPublisher, TelegramPublisher};
use crate::observe::TracingObserver;
use crate::pipeline::types::{Archive, Enricher, Publisher};
use crate::pipeline::Pipeline;
use crate::scheduler::Job;

pub struct Runtime {
    pub cfg: AppConfig,
    pub jobs: Vec<Job>,
}

impl Runtime {
    /// Resolve secrets, build shared collaborators once and one pipeline per job.
    pub async fn from_config(mut cfg: AppConfig) -> Result<Self> {
        cfg.validate()?;
        cfg.resolve_secrets()?;

        let publisher = build_publisher(&cfg);
        let archive = build_archive(&cfg).await?;
        let enricher = build_enricher(&cfg)?;

        // Safe diagnostics: kinds and counts only
        info!(
            channel = ?cfg.channel.kind,
            channel_id = %publisher.channel_id(),
            composer = cfg.needs_composer(),
            archive = ?cfg.archive.path,
            jobs = cfg.jobs.len(),
            "runtime configured"
        );

        let timeout = Duration::from_secs(cfg.run_timeout_secs);
        let mut jobs = Vec::with_capacity(cfg.jobs.len());
        for jc in &cfg.jobs {
            let source = build_journalist(&cfg, jc)?;
            let pipeline = Pipeline::new(
                jc.name.clone(),
                jc.pipeline_config()?,
                Arc::new(source),
                enricher.clone(),
                archive.clone(),
                publisher.clone(),
            )
            .with_observer(Arc::new(TracingObserver));
            jobs.push(Job {
                pipeline: Arc::new(pipeline),
                interval: Duration::from_secs(jc.interval_secs),
                timeout,
            });
        }

        Ok(Self { cfg, jobs })
    }
}

fn build_publisher(cfg: &AppConfig) -> Arc<dyn Publisher> {
    let ch = &cfg.channel;
    match ch.kind {
        ChannelKind::Telegram => Arc::new(TelegramPublisher::new(&ch.channel_id, &ch.token)),
        ChannelKind::Discord => Arc::new(DiscordPublisher::new(&ch.channel_id, &ch.webhook_url)),
        ChannelKind::Stdout => Arc::new(StdoutPublisher::new(&ch.channel_id)),
    }
}

async fn build_archive(cfg: &AppConfig) -> Result<Arc<dyn Archive>> {
    Ok(match &cfg.archive.path {
        Some(path) => Arc::new(FileArchive::open(path).await?),
        None => Arc::new(MemoryArchive::new()),
    })
}

fn build_enricher(cfg: &AppConfig) -> Result<Arc<dyn Enricher>> {
    if !cfg.needs_composer() {
        return Ok(Arc::new(DisabledComposer));
    }
    let c = &cfg.composer;
    let composer = OpenAiComposer::new(c.api_key.clone())?
        .with_model(c.model.clone())
        .with_endpoint(c.endpoint.clone());
    Ok(Arc::new(composer))
}

/// Provider name is the feed host, falling back to the job name.
fn provider_name(job: &JobConfig, url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| job.name.clone())
}

fn build_journalist(cfg: &AppConfig, job: &JobConfig) -> Result<Journalist> {
    let mut providers: Vec<Box<dyn NewsProvider>> = Vec::with_capacity(job.urls.len());
    for url in &job.urls {
        let p = RssProvider::from_url(provider_name(job, url), url.clone())
            .with_context(|| format!("job {}: provider for {url}", job.name))?;
        providers.push(Box::new(p));
    }
    let filter_keys = if job.apply_filter_keys {
        cfg.filter_keys.clone()
    } else {
        Vec::new()
    };
    Ok(Journalist::new(job.name.clone(), providers)
        .flag_suspicious(cfg.suspicious_keywords.clone())
        .filter_by(filter_keys))
}
