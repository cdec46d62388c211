//! Value records shared between pipeline stages.
//!
//! `RawItem` comes out of a source, `ComposedItem` out of the enricher and
//! `PersistedRecord` is what the archive stores and the publisher marks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Deterministic fingerprint of a news item.
///
/// Only content fields go in, so the same item fetched on two different runs
/// always yields the same id.
pub fn content_id(provider: &str, title: &str, description: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [provider, title, description, url] {
        hasher.update(part.as_bytes());
        // field separator; keeps ("ab","c") and ("a","bc") apart
        hasher.update([0x1f]);
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    pub id: String,
    pub provider_name: String,
    pub title: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    pub url: String,
    pub is_suspicious: bool,
}

impl RawItem {
    /// Build an item and derive its id from the content fields.
    pub fn new(
        provider_name: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        let provider_name = provider_name.into();
        let title = title.into();
        let description = description.into();
        let url = url.into();
        let id = content_id(&provider_name, &title, &description, &url);
        Self {
            id,
            provider_name,
            title,
            description,
            published_at,
            url,
            is_suspicious: false,
        }
    }

    pub fn suspicious(mut self, flag: bool) -> Self {
        self.is_suspicious = flag;
        self
    }
}

/// Tickers, markets and hashtags attached by the enricher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMeta {
    #[serde(default)]
    pub tickers: Vec<String>,
    #[serde(default)]
    pub markets: Vec<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

impl ItemMeta {
    /// True when tickers, markets and hashtags are all empty.
    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty() && self.markets.is_empty() && self.hashtags.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedItem {
    /// Equals the id of the originating `RawItem`.
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub tickers: Vec<String>,
    #[serde(default)]
    pub markets: Vec<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

impl ComposedItem {
    pub fn meta(&self) -> ItemMeta {
        ItemMeta {
            tickers: self.tickers.clone(),
            markets: self.markets.clone(),
            hashtags: self.hashtags.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub hash: String,
    pub channel_id: String,
    pub provider_name: String,
    pub original_title: String,
    pub original_description: String,
    pub original_date: DateTime<Utc>,
    pub url: String,
    pub is_suspicious: bool,
    pub composed_text: Option<String>,
    pub metadata: Option<ItemMeta>,
    pub publication_id: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl PersistedRecord {
    /// Copy the raw fields; enrichment and publication stay empty.
    pub fn from_raw(item: &RawItem, channel_id: &str) -> Self {
        Self {
            hash: item.id.clone(),
            channel_id: channel_id.to_string(),
            provider_name: item.provider_name.clone(),
            original_title: item.title.clone(),
            original_description: item.description.clone(),
            original_date: item.published_at,
            url: item.url.clone(),
            is_suspicious: item.is_suspicious,
            composed_text: None,
            metadata: None,
            publication_id: None,
            published_at: None,
        }
    }

    pub fn attach(&mut self, composed: &ComposedItem) {
        self.composed_text = Some(composed.text.clone());
        self.metadata = Some(composed.meta());
    }

    /// Metadata as stored, or an all-empty value when the item was never composed.
    pub fn meta_or_empty(&self) -> ItemMeta {
        self.metadata.clone().unwrap_or_default()
    }

    pub fn mark_published(&mut self, publication_id: String, at: DateTime<Utc>) {
        self.publication_id = Some(publication_id);
        self.published_at = Some(at);
    }

    pub fn is_published(&self) -> bool {
        self.publication_id.is_some()
    }
}
