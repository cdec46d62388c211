use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::{fs, sync::Mutex};

use crate::models::PersistedRecord;
use crate::pipeline::types::Archive;

/// Archive kept as a JSON array on disk.
///
/// Every create/update rewrites the file through a temp file and rename, so a
/// crash leaves either the old or the new contents.
pub struct FileArchive {
    path: PathBuf,
    table: Mutex<Table>,
}

/// Rows in file order plus a hash index over them.
struct Table {
    rows: Vec<PersistedRecord>,
    hashes: HashSet<String>,
}

impl FileArchive {
    /// Open `path`, starting empty if the file does not exist yet.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let rows: Vec<PersistedRecord> = match fs::read_to_string(&path).await {
            Ok(s) if s.trim().is_empty() => Vec::new(),
            Ok(s) => serde_json::from_str(&s)
                .with_context(|| format!("parsing archive {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("reading archive {}", path.display()))
            }
        };
        let hashes: HashSet<String> = rows.iter().map(|r| r.hash.clone()).collect();
        if hashes.len() != rows.len() {
            bail!("archive {} holds duplicate hashes", path.display());
        }
        tracing::info!(path = %path.display(), rows = rows.len(), "archive opened");
        Ok(Self {
            path,
            table: Mutex::new(Table { rows, hashes }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.rows.len()
    }

    pub async fn find_unpublished(&self) -> Vec<PersistedRecord> {
        self.table
            .lock()
            .await
            .rows
            .iter()
            .filter(|r| !r.is_published())
            .cloned()
            .collect()
    }

    async fn flush(&self, rows: &[PersistedRecord]) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .await
                    .with_context(|| format!("creating {}", dir.display()))?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(rows).context("encoding archive")?;
        fs::write(&tmp, json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl Archive for FileArchive {
    async fn find_existing_hashes(&self, hashes: &[String]) -> Result<Vec<String>> {
        let table = self.table.lock().await;
        Ok(hashes
            .iter()
            .filter(|h| table.hashes.contains(h.as_str()))
            .cloned()
            .collect())
    }

    async fn create(&self, record: &PersistedRecord) -> Result<()> {
        let mut table = self.table.lock().await;
        if table.hashes.contains(&record.hash) {
            bail!("record {} already exists", record.hash);
        }
        table.rows.push(record.clone());
        if let Err(e) = self.flush(&table.rows).await {
            table.rows.pop();
            return Err(e);
        }
        table.hashes.insert(record.hash.clone());
        Ok(())
    }

    async fn update(&self, record: &PersistedRecord) -> Result<()> {
        let mut table = self.table.lock().await;
        let Some(idx) = table.rows.iter().position(|r| r.hash == record.hash) else {
            bail!("record {} not found", record.hash);
        };
        let previous = std::mem::replace(&mut table.rows[idx], record.clone());
        if let Err(e) = self.flush(&table.rows).await {
            table.rows[idx] = previous;
            return Err(e);
        }
        Ok(())
    }
}
