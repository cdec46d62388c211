// src/ingest/types.rs
use anyhow::Result;

use crate::models::RawItem;

/// A single upstream feed. Returns every item it currently lists; cutoff,
/// keyword flagging and filtering happen in the journalist.
#[async_trait::async_trait]
pub trait NewsProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>>;
    fn name(&self) -> &str;
}
