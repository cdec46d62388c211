use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};

use crate::models::PersistedRecord;
use crate::pipeline::types::Archive;

/// In-process archive. Clones share the same rows, so several pipelines can
/// use one instance.
#[derive(Clone, Default)]
pub struct MemoryArchive {
    rows: Arc<Mutex<Rows>>,
}

#[derive(Default)]
struct Rows {
    by_hash: HashMap<String, PersistedRecord>,
    order: Vec<String>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Rows> {
        self.rows.lock()
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, hash: &str) -> Option<PersistedRecord> {
        self.lock().by_hash.get(hash).cloned()
    }

    /// All rows in insertion order.
    pub fn snapshot(&self) -> Vec<PersistedRecord> {
        let rows = self.lock();
        rows.order
            .iter()
            .filter_map(|h| rows.by_hash.get(h).cloned())
            .collect()
    }

    /// Stored rows that never got a publication id.
    pub fn find_unpublished(&self) -> Vec<PersistedRecord> {
        self.snapshot()
            .into_iter()
            .filter(|r| !r.is_published())
            .collect()
    }
}

#[async_trait]
impl Archive for MemoryArchive {
    async fn find_existing_hashes(&self, hashes: &[String]) -> Result<Vec<String>> {
        let rows = self.lock();
        Ok(hashes
            .iter()
            .filter(|h| rows.by_hash.contains_key(h.as_str()))
            .cloned()
            .collect())
    }

    async fn create(&self, record: &PersistedRecord) -> Result<()> {
        let mut rows = self.lock();
        if rows.by_hash.contains_key(&record.hash) {
            bail!("record {} already exists", record.hash);
        }
        rows.order.push(record.hash.clone());
        rows.by_hash.insert(record.hash.clone(), record.clone());
        Ok(())
    }

    async fn update(&self, record: &PersistedRecord) -> Result<()> {
        let mut rows = self.lock();
        match rows.by_hash.get_mut(&record.hash) {
            Some(row) => {
                *row = record.clone();
                Ok(())
            }
            None => bail!("record {} not found", record.hash),
        }
    }
}
