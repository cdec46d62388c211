// src/config/app.rs
//! Process configuration: channel, composer, archive and per-source jobs.

use anyhow::{anyhow, bail, Context, Result};
use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::pipeline::PipelineConfig;
use crate::error::ConfigError;

pub const ENV_CONFIG_PATH: &str = "FIN_THREAD_CONFIG";
pub const DEFAULT_TOML_PATH: &str = "config/fin_thread.toml";
pub const DEFAULT_JSON_PATH: &str = "config/fin_thread.json";

/// Marker meaning "read this value from the environment".
const FROM_ENV: &str = "ENV";

fn default_suspicious_keywords() -> Vec<String> {
    [
        "sign up",
        "buy now",
        "climate",
        "activists",
        "activism",
        "advice",
        "covid-19",
        "study",
        "humanitarian",
        "award",
        "research",
        "human rights",
        "united nations",
        "adult content",
        "pornography",
        "porn",
        "sexually",
        "gender",
        "sexuality",
        "class action lawsuit",
        "subscribe",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_filter_keys() -> Vec<String> {
    [
        "European Union",
        "United States",
        "United Kingdom",
        "China",
        "Germany",
        "France",
        "Japan",
        "Italy",
        "India",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Wall-clock budget for one run of any job.
    pub run_timeout_secs: u64,
    pub suspicious_keywords: Vec<String>,
    pub filter_keys: Vec<String>,
    pub channel: ChannelConfig,
    pub composer: ComposerConfig,
    pub archive: ArchiveConfig,
    pub jobs: Vec<JobConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            run_timeout_secs: 20,
            suspicious_keywords: default_suspicious_keywords(),
            filter_keys: default_filter_keys(),
            channel: ChannelConfig::default(),
            composer: ComposerConfig::default(),
            archive: ArchiveConfig::default(),
            jobs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Telegram,
    Discord,
    #[default]
    Stdout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub kind: ChannelKind,
    /// "ENV" reads TELEGRAM_CHANNEL_ID.
    pub channel_id: String,
    /// Telegram bot token; "ENV" reads TELEGRAM_BOT_TOKEN.
    pub token: String,
    /// Discord webhook; "ENV" reads DISCORD_WEBHOOK_URL.
    pub webhook_url: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            kind: ChannelKind::Stdout,
            channel_id: "dry-run".to_string(),
            token: FROM_ENV.to_string(),
            webhook_url: FROM_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// "ENV" reads OPENAI_API_KEY.
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            api_key: FROM_ENV.to_string(),
            model: crate::compose::openai::DEFAULT_MODEL.to_string(),
            endpoint: crate::compose::openai::DEFAULT_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// JSON archive file. Unset keeps records in memory for the process lifetime.
    pub path: Option<PathBuf>,
}

fn default_interval_secs() -> u64 {
    60
}
fn default_lookback_secs() -> u64 {
    300
}

/// One scheduled source and the pipeline policy it runs with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    pub urls: Vec<String>,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Cutoff for each run is `now - lookback_secs`.
    #[serde(default = "default_lookback_secs")]
    pub lookback_secs: u64,
    #[serde(default)]
    pub omit_suspicious: bool,
    #[serde(default)]
    pub omit_empty_meta: bool,
    #[serde(default)]
    pub compose: bool,
    #[serde(default)]
    pub persist: bool,
    #[serde(default)]
    pub dedupe: bool,
    /// Drop items mentioning none of the global filter keys.
    #[serde(default)]
    pub apply_filter_keys: bool,
}

impl JobConfig {
    pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        let lookback = i64::try_from(self.lookback_secs)
            .map_err(|_| ConfigError::Invalid(format!("job {}: lookback too large", self.name)))?;
        PipelineConfig::builder()
            .lookback(ChronoDuration::seconds(lookback))
            .omit_suspicious(self.omit_suspicious)
            .omit_empty_meta(self.omit_empty_meta)
            .compose(self.compose)
            .persist(self.persist)
            .dedupe(self.dedupe)
            .build()
    }
}

impl AppConfig {
    /// Structural checks, including every job's pipeline flags.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run_timeout_secs == 0 {
            return Err(ConfigError::Invalid("run_timeout_secs must be > 0".into()));
        }
        let mut names = HashSet::new();
        for job in &self.jobs {
            if job.name.trim().is_empty() {
                return Err(ConfigError::Invalid("job name must not be empty".into()));
            }
            if !names.insert(job.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate job name {}", job.name)));
            }
            if job.urls.is_empty() {
                return Err(ConfigError::Invalid(format!("job {} has no urls", job.name)));
            }
            if job.interval_secs == 0 {
                return Err(ConfigError::Invalid(format!(
                    "job {}: interval_secs must be > 0",
                    job.name
                )));
            }
            job.pipeline_config()?;
        }
        Ok(())
    }

    pub fn needs_composer(&self) -> bool {
        self.jobs.iter().any(|j| j.compose)
    }

    /// Replace "ENV" markers with environment values for the parts in use.
    pub fn resolve_secrets(&mut self) -> Result<()> {
        fn from_env(value: &mut String, var: &str) -> Result<()> {
            if value.trim().eq_ignore_ascii_case(FROM_ENV) {
                *value = std::env::var(var).map_err(|_| anyhow!("Missing {var} env var"))?;
            }
            Ok(())
        }

        match self.channel.kind {
            ChannelKind::Telegram => {
                from_env(&mut self.channel.channel_id, "TELEGRAM_CHANNEL_ID")?;
                from_env(&mut self.channel.token, "TELEGRAM_BOT_TOKEN")?;
            }
            ChannelKind::Discord => {
                from_env(&mut self.channel.webhook_url, "DISCORD_WEBHOOK_URL")?;
            }
            ChannelKind::Stdout => {}
        }
        if self.needs_composer() {
            from_env(&mut self.composer.api_key, "OPENAI_API_KEY")?;
        }
        Ok(())
    }

    /// Load from an explicit path. TOML or JSON, picked by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: AppConfig = match ext.as_str() {
            "toml" => toml::from_str(&content).context("parsing toml config")?,
            "json" => serde_json::from_str(&content).context("parsing json config")?,
            other => bail!("unsupported config format: {other:?}"),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $FIN_THREAD_CONFIG
    /// 2) config/fin_thread.toml
    /// 3) config/fin_thread.json
    /// 4) built-in defaults (no jobs)
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            bail!("{ENV_CONFIG_PATH} points to non-existent path");
        }
        for p in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Ok(Self::default())
    }
}
