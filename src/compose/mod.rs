//! Enrichment: turns raw items into short commentary with tickers, markets
//! and hashtags.

pub mod openai;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{ComposedItem, RawItem};
use crate::pipeline::types::Enricher;

pub use openai::OpenAiComposer;

/// Items published on the same UTC calendar day as `now`.
pub fn published_today(items: &[RawItem], now: DateTime<Utc>) -> Vec<&RawItem> {
    let today = now.date_naive();
    items
        .iter()
        .filter(|n| n.published_at.date_naive() == today)
        .collect()
}

/// Returns nothing; used when composition is turned off.
pub struct DisabledComposer;

#[async_trait]
impl Enricher for DisabledComposer {
    async fn compose(&self, _items: &[RawItem]) -> Result<Vec<ComposedItem>> {
        Ok(Vec::new())
    }
}
