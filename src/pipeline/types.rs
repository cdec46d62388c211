// src/pipeline/types.rs
//! Collaborator contracts consumed by the controller.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{PipelineError, Stage};
use crate::models::{ComposedItem, PersistedRecord, RawItem};

/// What a source hands back: items plus an optional recoverable error.
///
/// A source may fail partially; `items` then holds whatever it managed to get.
#[derive(Debug, Default)]
pub struct Fetched {
    pub items: Vec<RawItem>,
    pub error: Option<anyhow::Error>,
}

impl Fetched {
    pub fn ok(items: Vec<RawItem>) -> Self {
        Self { items, error: None }
    }

    pub fn partial(items: Vec<RawItem>, error: anyhow::Error) -> Self {
        Self {
            items,
            error: Some(error),
        }
    }
}

#[async_trait]
pub trait Source: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_latest(&self, cutoff: DateTime<Utc>) -> Fetched;
}

/// Turns raw items into composed commentary with tickers/markets/hashtags.
///
/// Implementations restrict themselves to items published today and return an
/// empty vec (not an error) when none qualify.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn compose(&self, items: &[RawItem]) -> Result<Vec<ComposedItem>>;
}

/// Durable store of records keyed by hash. No batch or transactional calls.
#[async_trait]
pub trait Archive: Send + Sync {
    /// Subset of `hashes` already stored.
    async fn find_existing_hashes(&self, hashes: &[String]) -> Result<Vec<String>>;
    async fn create(&self, record: &PersistedRecord) -> Result<()>;
    async fn update(&self, record: &PersistedRecord) -> Result<()>;
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Channel the publisher posts to; copied onto every record.
    fn channel_id(&self) -> &str;
    /// Post `text` and return the channel's publication id.
    async fn publish(&self, text: &str) -> Result<String>;
}

/// Spans and breadcrumbs around stage calls. Infallible by signature.
pub trait Observer: Send + Sync {
    fn stage_started(&self, _source: &str, _stage: Stage) {}
    fn stage_finished(&self, _source: &str, _stage: Stage, _items: usize) {}
    fn capture(&self, _source: &str, _err: &PipelineError) {}
    fn run_finished(&self, _source: &str, _report: &RunReport) {}
}

/// How a run that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Nothing left to do after the given stage.
    NoOp { after: Stage },
    Completed,
}

/// Per-run counters returned to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub status: RunStatus,
    pub fetched: usize,
    pub fresh: usize,
    pub composed: usize,
    pub persisted: usize,
    pub published: usize,
    pub skipped_suspicious: usize,
    pub skipped_empty_meta: usize,
    pub updated: usize,
    /// Recoverable fetch error, if the source reported one.
    pub fetch_error: Option<String>,
}

impl RunReport {
    pub(crate) fn new() -> Self {
        Self {
            status: RunStatus::Completed,
            fetched: 0,
            fresh: 0,
            composed: 0,
            persisted: 0,
            published: 0,
            skipped_suspicious: 0,
            skipped_empty_meta: 0,
            updated: 0,
            fetch_error: None,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self.status, RunStatus::NoOp { .. })
    }
}
