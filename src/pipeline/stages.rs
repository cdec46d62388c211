// src/pipeline/stages.rs
//! The six stage steps. Each one uses a single collaborator and maps its
//! failures onto the matching [`PipelineError`] kind.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use metrics::counter;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::models::{ComposedItem, PersistedRecord, RawItem};
use crate::pipeline::types::{Archive, Enricher, Fetched, Publisher, Source};

pub async fn fetch(source: &dyn Source, cutoff: DateTime<Utc>) -> Fetched {
    source.fetch_latest(cutoff).await
}

/// Drop items whose id is already stored. Order of the survivors is kept.
pub async fn dedupe(
    archive: &dyn Archive,
    items: Vec<RawItem>,
) -> Result<Vec<RawItem>, PipelineError> {
    let hashes: Vec<String> = items.iter().map(|n| n.id.clone()).collect();
    let existing: HashSet<String> = archive
        .find_existing_hashes(&hashes)
        .await
        .map_err(PipelineError::DedupeFailed)?
        .into_iter()
        .collect();

    Ok(items
        .into_iter()
        .filter(|n| !existing.contains(&n.id))
        .collect())
}

/// One batched call for the whole run.
pub async fn compose(
    enricher: &dyn Enricher,
    items: &[RawItem],
) -> Result<Vec<ComposedItem>, PipelineError> {
    enricher
        .compose(items)
        .await
        .map_err(PipelineError::ComposeFailed)
}

/// One record per item, in item order, with enrichment attached by id.
///
/// Fails before anything is written when the enricher returned more items
/// than it was given.
pub fn build_records(
    items: &[RawItem],
    composed: &[ComposedItem],
    channel_id: &str,
) -> Result<Vec<PersistedRecord>, PipelineError> {
    if composed.len() > items.len() {
        return Err(PipelineError::ConsistencyViolation {
            composed: composed.len(),
            raw: items.len(),
        });
    }

    let by_id: HashMap<&str, &ComposedItem> =
        composed.iter().map(|c| (c.id.as_str(), c)).collect();

    Ok(items
        .iter()
        .map(|n| {
            let mut rec = PersistedRecord::from_raw(n, channel_id);
            if let Some(c) = by_id.get(n.id.as_str()) {
                rec.attach(c);
            }
            rec
        })
        .collect())
}

/// Create records one by one. No rollback: rows written before a failure stay.
pub async fn persist(
    archive: &dyn Archive,
    records: &[PersistedRecord],
) -> Result<usize, PipelineError> {
    for rec in records {
        archive
            .create(rec)
            .await
            .map_err(|cause| PipelineError::PersistFailed {
                hash: rec.hash.clone(),
                cause,
            })?;
    }
    Ok(records.len())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Suspicious,
    EmptyMeta,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Suspicious => "suspicious",
            SkipReason::EmptyMeta => "empty_meta",
        }
    }
}

/// Publish filters, checked in order.
pub fn skip_reason(record: &PersistedRecord, cfg: &PipelineConfig) -> Option<SkipReason> {
    if record.is_suspicious && cfg.omit_suspicious() {
        return Some(SkipReason::Suspicious);
    }
    if cfg.omit_empty_meta() && record.meta_or_empty().is_empty() {
        return Some(SkipReason::EmptyMeta);
    }
    None
}

/// Message body sent to the channel.
///
/// With composition the body carries hash, provider, metadata JSON, the
/// suspicious flag and the composed text; without it, title and description.
pub fn format_message(record: &PersistedRecord, composed: bool) -> serde_json::Result<String> {
    if !composed {
        return Ok(format!(
            "{}\n{}",
            record.original_title, record.original_description
        ));
    }

    let meta = match &record.metadata {
        Some(m) => serde_json::to_string(m)?,
        None => "null".to_string(),
    };
    Ok(format!(
        "Hash: {}\nProvider: {}\nMeta: {}\nIsSuspicious:{}\n {}",
        record.hash,
        record.provider_name,
        meta,
        record.is_suspicious,
        record.composed_text.as_deref().unwrap_or_default()
    ))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishTally {
    pub published: usize,
    pub skipped_suspicious: usize,
    pub skipped_empty_meta: usize,
}

/// Publish records in order, marking each success on the record itself.
///
/// Stops at the first failure; records before it keep their publication ids.
pub async fn publish(
    publisher: &dyn Publisher,
    cfg: &PipelineConfig,
    records: &mut [PersistedRecord],
) -> Result<PublishTally, PipelineError> {
    let mut tally = PublishTally::default();

    for rec in records.iter_mut() {
        if let Some(reason) = skip_reason(rec, cfg) {
            match reason {
                SkipReason::Suspicious => tally.skipped_suspicious += 1,
                SkipReason::EmptyMeta => tally.skipped_empty_meta += 1,
            }
            counter!("pipeline_skipped_total", "reason" => reason.as_str()).increment(1);
            tracing::debug!(target: "pipeline", hash = %rec.hash, reason = reason.as_str(), "publish skipped");
            continue;
        }

        let body = format_message(rec, cfg.enable_composition()).map_err(|e| {
            PipelineError::PublishFailed {
                hash: rec.hash.clone(),
                cause: anyhow::Error::new(e).context("formatting message body"),
            }
        })?;

        let publication_id =
            publisher
                .publish(&body)
                .await
                .map_err(|cause| PipelineError::PublishFailed {
                    hash: rec.hash.clone(),
                    cause,
                })?;

        rec.mark_published(publication_id, Utc::now());
        tally.published += 1;
        counter!("pipeline_published_total").increment(1);
    }

    Ok(tally)
}

/// Write every record back, published or not.
pub async fn update(
    archive: &dyn Archive,
    records: &[PersistedRecord],
) -> Result<usize, PipelineError> {
    for rec in records {
        archive
            .update(rec)
            .await
            .map_err(|cause| PipelineError::UpdateFailed {
                hash: rec.hash.clone(),
                cause,
            })?;
    }
    Ok(records.len())
}
