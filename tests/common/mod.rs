// tests/common/mod.rs
// Recording collaborator doubles shared by the pipeline tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use fin_thread::archive::MemoryArchive;
use fin_thread::error::{PipelineError, Stage};
use fin_thread::models::{ComposedItem, PersistedRecord, RawItem};
use fin_thread::pipeline::types::{
    Archive, Enricher, Fetched, Observer, Publisher, RunReport, Source,
};

pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, h, m, 0).unwrap()
}

pub fn item(title: &str) -> RawItem {
    RawItem::new(
        "Reuters",
        title,
        format!("{title} details"),
        format!("https://reuters.test/{}", title.to_lowercase().replace(' ', "-")),
        at(9, 0),
    )
}

pub fn abc() -> Vec<RawItem> {
    vec![item("Alpha rallies"), item("Beta slides"), item("Gamma flat")]
}

// ---------- Source ----------

pub struct FixedSource {
    items: Vec<RawItem>,
    error: Option<String>,
    pub cutoffs: Mutex<Vec<DateTime<Utc>>>,
}

impl FixedSource {
    pub fn new(items: Vec<RawItem>) -> Arc<Self> {
        Arc::new(Self {
            items,
            error: None,
            cutoffs: Mutex::new(Vec::new()),
        })
    }

    pub fn partial(items: Vec<RawItem>, error: &str) -> Arc<Self> {
        Arc::new(Self {
            items,
            error: Some(error.to_string()),
            cutoffs: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.cutoffs.lock().len()
    }
}

#[async_trait]
impl Source for FixedSource {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn fetch_latest(&self, cutoff: DateTime<Utc>) -> Fetched {
        self.cutoffs.lock().push(cutoff);
        match &self.error {
            Some(msg) => Fetched::partial(self.items.clone(), anyhow!(msg.clone())),
            None => Fetched::ok(self.items.clone()),
        }
    }
}

/// Never answers within any reasonable budget.
pub struct SlowSource(pub Duration);

#[async_trait]
impl Source for SlowSource {
    fn name(&self) -> &str {
        "slow"
    }

    async fn fetch_latest(&self, _cutoff: DateTime<Utc>) -> Fetched {
        tokio::time::sleep(self.0).await;
        Fetched::ok(vec![item("Too late")])
    }
}

// ---------- Enricher ----------

enum Script {
    /// One composed item per input, each tagged with ticker "TKR".
    Echo,
    Fixed(Vec<ComposedItem>),
    Fail,
}

pub struct ScriptedEnricher {
    script: Script,
    pub batches: Mutex<Vec<Vec<String>>>,
}

impl ScriptedEnricher {
    fn with(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            batches: Mutex::new(Vec::new()),
        })
    }

    pub fn echo() -> Arc<Self> {
        Self::with(Script::Echo)
    }

    pub fn fixed(out: Vec<ComposedItem>) -> Arc<Self> {
        Self::with(Script::Fixed(out))
    }

    pub fn failing() -> Arc<Self> {
        Self::with(Script::Fail)
    }

    pub fn calls(&self) -> usize {
        self.batches.lock().len()
    }
}

pub fn composed(id: &str, tickers: &[&str]) -> ComposedItem {
    ComposedItem {
        id: id.to_string(),
        text: format!("composed {}", &id[..8]),
        tickers: tickers.iter().map(|t| t.to_string()).collect(),
        markets: Vec::new(),
        hashtags: Vec::new(),
    }
}

#[async_trait]
impl Enricher for ScriptedEnricher {
    async fn compose(&self, items: &[RawItem]) -> Result<Vec<ComposedItem>> {
        self.batches
            .lock()
            .push(items.iter().map(|n| n.id.clone()).collect());
        match &self.script {
            Script::Echo => Ok(items.iter().map(|n| composed(&n.id, &["TKR"])).collect()),
            Script::Fixed(out) => Ok(out.clone()),
            Script::Fail => Err(anyhow!("model unavailable")),
        }
    }
}

// ---------- Archive ----------

#[derive(Default)]
pub struct ArchiveFaults {
    pub find: bool,
    /// 1-based index of the create call that fails.
    pub create_at: Option<usize>,
    pub update_at: Option<usize>,
}

pub struct RecordingArchive {
    pub inner: MemoryArchive,
    faults: ArchiveFaults,
    pub finds: Mutex<usize>,
    pub creates: Mutex<Vec<String>>,
    pub updates: Mutex<Vec<PersistedRecord>>,
}

impl RecordingArchive {
    pub fn new() -> Arc<Self> {
        Self::faulty(ArchiveFaults::default())
    }

    pub fn faulty(faults: ArchiveFaults) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryArchive::new(),
            faults,
            finds: Mutex::new(0),
            creates: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        *self.finds.lock() + self.creates.lock().len() + self.updates.lock().len()
    }
}

#[async_trait]
impl Archive for RecordingArchive {
    async fn find_existing_hashes(&self, hashes: &[String]) -> Result<Vec<String>> {
        *self.finds.lock() += 1;
        if self.faults.find {
            return Err(anyhow!("archive offline"));
        }
        self.inner.find_existing_hashes(hashes).await
    }

    async fn create(&self, record: &PersistedRecord) -> Result<()> {
        let n = {
            let mut creates = self.creates.lock();
            creates.push(record.hash.clone());
            creates.len()
        };
        if self.faults.create_at == Some(n) {
            return Err(anyhow!("disk full"));
        }
        self.inner.create(record).await
    }

    async fn update(&self, record: &PersistedRecord) -> Result<()> {
        let n = {
            let mut updates = self.updates.lock();
            updates.push(record.clone());
            updates.len()
        };
        if self.faults.update_at == Some(n) {
            return Err(anyhow!("row locked"));
        }
        self.inner.update(record).await
    }
}

// ---------- Publisher ----------

pub struct RecordingPublisher {
    channel: String,
    fail_at: Option<usize>,
    pub sent: Mutex<Vec<String>>,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Self::failing_at(None)
    }

    pub fn failing_at(n: Option<usize>) -> Arc<Self> {
        Arc::new(Self {
            channel: "@finthread".to_string(),
            fail_at: n,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    fn channel_id(&self) -> &str {
        &self.channel
    }

    async fn publish(&self, text: &str) -> Result<String> {
        let mut sent = self.sent.lock();
        if self.fail_at == Some(sent.len() + 1) {
            return Err(anyhow!("429 too many requests"));
        }
        sent.push(text.to_string());
        Ok(format!("msg-{}", sent.len()))
    }
}

// ---------- Observer ----------

#[derive(Default)]
pub struct RecordingObserver {
    pub started: Mutex<Vec<Stage>>,
    pub captured: Mutex<Vec<&'static str>>,
    pub finished_runs: Mutex<usize>,
}

impl Observer for RecordingObserver {
    fn stage_started(&self, _source: &str, stage: Stage) {
        self.started.lock().push(stage);
    }

    fn capture(&self, _source: &str, err: &PipelineError) {
        self.captured.lock().push(err.label());
    }

    fn run_finished(&self, _source: &str, _report: &RunReport) {
        *self.finished_runs.lock() += 1;
    }
}
