// src/config/pipeline.rs
use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::error::ConfigError;

/// Lower bound on item publish time for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cutoff {
    /// Fixed instant.
    At(DateTime<Utc>),
    /// Relative to the moment the run starts.
    Lookback(ChronoDuration),
}

impl Cutoff {
    pub fn resolve(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Cutoff::At(ts) => *ts,
            Cutoff::Lookback(d) => now - *d,
        }
    }
}

/// Which stages run and with what publish policy. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    fetch_cutoff: Cutoff,
    omit_suspicious: bool,
    omit_empty_meta: bool,
    enable_composition: bool,
    enable_persistence: bool,
    enable_dedupe: bool,
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    pub fn fetch_cutoff(&self) -> Cutoff {
        self.fetch_cutoff
    }

    pub fn omit_suspicious(&self) -> bool {
        self.omit_suspicious
    }

    pub fn omit_empty_meta(&self) -> bool {
        self.omit_empty_meta
    }

    pub fn enable_composition(&self) -> bool {
        self.enable_composition
    }

    pub fn enable_persistence(&self) -> bool {
        self.enable_persistence
    }

    pub fn enable_dedupe(&self) -> bool {
        self.enable_dedupe
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
    fetch_cutoff: Option<Cutoff>,
    omit_suspicious: bool,
    omit_empty_meta: bool,
    enable_composition: bool,
    enable_persistence: bool,
    enable_dedupe: bool,
}

impl PipelineConfigBuilder {
    /// Only items published at or after `ts` are considered.
    pub fn fetch_since(mut self, ts: DateTime<Utc>) -> Self {
        self.fetch_cutoff = Some(Cutoff::At(ts));
        self
    }

    /// Cutoff recomputed at each run start as `now - window`.
    pub fn lookback(mut self, window: ChronoDuration) -> Self {
        self.fetch_cutoff = Some(Cutoff::Lookback(window));
        self
    }

    pub fn omit_suspicious(mut self, on: bool) -> Self {
        self.omit_suspicious = on;
        self
    }

    /// Requires composition.
    pub fn omit_empty_meta(mut self, on: bool) -> Self {
        self.omit_empty_meta = on;
        self
    }

    pub fn compose(mut self, on: bool) -> Self {
        self.enable_composition = on;
        self
    }

    pub fn persist(mut self, on: bool) -> Self {
        self.enable_persistence = on;
        self
    }

    /// Requires persistence.
    pub fn dedupe(mut self, on: bool) -> Self {
        self.enable_dedupe = on;
        self
    }

    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        let fetch_cutoff = self.fetch_cutoff.ok_or(ConfigError::MissingCutoff)?;
        if let Cutoff::Lookback(d) = fetch_cutoff {
            if d < ChronoDuration::zero() {
                return Err(ConfigError::Invalid(format!(
                    "lookback must not be negative (got {}s)",
                    d.num_seconds()
                )));
            }
        }
        if self.enable_dedupe && !self.enable_persistence {
            return Err(ConfigError::DedupeWithoutPersistence);
        }
        if self.omit_empty_meta && !self.enable_composition {
            return Err(ConfigError::EmptyMetaWithoutComposition);
        }
        Ok(PipelineConfig {
            fetch_cutoff,
            omit_suspicious: self.omit_suspicious,
            omit_empty_meta: self.omit_empty_meta,
            enable_composition: self.enable_composition,
            enable_persistence: self.enable_persistence,
            enable_dedupe: self.enable_dedupe,
        })
    }
}
