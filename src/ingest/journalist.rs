// src/ingest/journalist.rs
use std::collections::HashSet;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;

use crate::ingest::contains_any;
use crate::ingest::types::NewsProvider;
use crate::models::RawItem;
use crate::pipeline::types::{Fetched, Source};

/// Source backed by several providers.
///
/// Providers are polled one after another. A failing provider does not stop
/// the others; its error is folded into the recoverable error of the result.
pub struct Journalist {
    name: String,
    providers: Vec<Box<dyn NewsProvider>>,
    suspicious_keywords: Vec<String>,
    filter_keys: Vec<String>,
}

impl Journalist {
    pub fn new(name: impl Into<String>, providers: Vec<Box<dyn NewsProvider>>) -> Self {
        Self {
            name: name.into(),
            providers,
            suspicious_keywords: Vec::new(),
            filter_keys: Vec::new(),
        }
    }

    /// Items mentioning any of these are flagged suspicious.
    pub fn flag_suspicious(mut self, keywords: Vec<String>) -> Self {
        self.suspicious_keywords = keywords;
        self
    }

    /// Keep only items mentioning at least one key. Empty keeps everything.
    pub fn filter_by(mut self, keys: Vec<String>) -> Self {
        self.filter_keys = keys;
        self
    }

    /// Cutoff, filter keys, suspicious flag and in-batch duplicate removal.
    pub fn prepare(&self, cutoff: DateTime<Utc>, raw: Vec<RawItem>) -> Vec<RawItem> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(raw.len());
        for item in raw {
            if item.published_at < cutoff {
                continue;
            }
            let text = format!("{} {}", item.title, item.description);
            if !self.filter_keys.is_empty() && !contains_any(&text, &self.filter_keys) {
                continue;
            }
            if !seen.insert(item.id.clone()) {
                continue;
            }
            let flagged = item.is_suspicious || contains_any(&text, &self.suspicious_keywords);
            out.push(item.suspicious(flagged));
        }
        out
    }
}

#[async_trait]
impl Source for Journalist {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_latest(&self, cutoff: DateTime<Utc>) -> Fetched {
        let mut raw = Vec::new();
        let mut failures = Vec::new();
        for p in &self.providers {
            match p.fetch_latest().await {
                Ok(mut v) => raw.append(&mut v),
                Err(e) => {
                    tracing::warn!(target: "ingest", error = ?e, provider = p.name(), "provider error");
                    counter!("ingest_provider_errors_total").increment(1);
                    failures.push(format!("{}: {e:#}", p.name()));
                }
            }
        }

        let items = self.prepare(cutoff, raw);
        tracing::debug!(target: "ingest", source = %self.name, kept = items.len(), failed = failures.len(), "journalist fetched");

        if failures.is_empty() {
            Fetched::ok(items)
        } else {
            Fetched::partial(
                items,
                anyhow!(
                    "{} of {} providers failed: {}",
                    failures.len(),
                    self.providers.len(),
                    failures.join("; ")
                ),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn prepare_applies_cutoff_keys_and_flags() {
        let j = Journalist::new("t", vec![])
            .flag_suspicious(vec!["buy now".into()])
            .filter_by(vec!["China".into(), "United States".into()]);

        let old = RawItem::new("P", "China exports", "", "u1", at(1));
        let fresh = RawItem::new("P", "China exports jump", "", "u2", at(10));
        let spam = RawItem::new("P", "United States deal", "Buy now!", "u3", at(10));
        let off_topic = RawItem::new("P", "Local weather", "", "u4", at(10));

        let out = j.prepare(at(5), vec![old, fresh.clone(), spam, off_topic, fresh.clone()]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, fresh.id);
        assert!(!out[0].is_suspicious);
        assert!(out[1].is_suspicious);
    }

    #[test]
    fn item_at_cutoff_is_kept() {
        let j = Journalist::new("t", vec![]);
        let item = RawItem::new("P", "x", "", "u", at(5));
        assert_eq!(j.prepare(at(5), vec![item]).len(), 1);
        let item = RawItem::new("P", "x", "", "u", at(5) - ChronoDuration::seconds(1));
        assert!(j.prepare(at(5), vec![item]).is_empty());
    }
}
