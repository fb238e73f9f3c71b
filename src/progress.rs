//! Durable per-item status ledger. Source of truth for resumption.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{Result, ShiftError};
use crate::plan::MigrationItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Ledger entry for one item, keyed by its source item id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemStatus {
    pub status: ItemState,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

/// Whole-document ledger, persisted after every single-item change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressLedger {
    pub started: DateTime<Utc>,
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    #[serde(default)]
    pub files: BTreeMap<String, ItemStatus>,
}

impl ProgressLedger {
    fn new() -> Self {
        Self {
            started: Utc::now(),
            total: 0,
            completed: 0,
            failed: 0,
            files: BTreeMap::new(),
        }
    }

    pub fn status_of(&self, id: &str) -> Option<&ItemStatus> {
        self.files.get(id)
    }
}

/// Write-through store around the ledger document. Every mutation is durable
/// before the call returns; a crash mid-step leaves the prior status on disk.
pub struct ProgressStore {
    path: PathBuf,
    ledger: ProgressLedger,
}

impl ProgressStore {
    /// Read the persisted ledger, or initialize an empty one with a start
    /// timestamp.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let ledger = if path.exists() {
            let content = fs::read_to_string(&path).await?;
            let ledger: ProgressLedger = serde_json::from_str(&content)?;
            info!(
                path = %path.display(),
                completed = ledger.completed,
                failed = ledger.failed,
                "Loaded existing progress ledger"
            );
            ledger
        } else {
            ProgressLedger::new()
        };

        Ok(Self { path, ledger })
    }

    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    pub async fn set_total(&mut self, total: u64) -> Result<()> {
        self.ledger.total = total;
        self.persist().await
    }

    /// Update one entry and persist the whole ledger synchronously.
    pub async fn mark_item(
        &mut self,
        id: &str,
        status: ItemState,
        details: BTreeMap<String, String>,
    ) -> Result<()> {
        self.ledger.files.insert(
            id.to_string(),
            ItemStatus {
                status,
                timestamp: Utc::now(),
                details,
            },
        );
        self.recount();
        self.persist().await?;
        debug!(id, ?status, "Ledger updated");
        Ok(())
    }

    /// Explicitly clear an entry so a later run reprocesses the item.
    pub async fn clear_item(&mut self, id: &str) -> Result<bool> {
        let removed = self.ledger.files.remove(id).is_some();
        if removed {
            self.recount();
            self.persist().await?;
        }
        Ok(removed)
    }

    /// Items with no ledger entry. A stale `processing` entry is re-included
    /// only when `retry_stale_processing` is set; `completed` and `failed`
    /// entries always exclude the item.
    pub fn unprocessed<'a>(
        &self,
        items: &'a [MigrationItem],
        retry_stale_processing: bool,
    ) -> Vec<&'a MigrationItem> {
        items
            .iter()
            .filter(|item| match self.ledger.files.get(&item.source_item_id) {
                None => true,
                Some(entry) => {
                    retry_stale_processing && entry.status == ItemState::Processing
                }
            })
            .collect()
    }

    fn recount(&mut self) {
        self.ledger.completed = self
            .ledger
            .files
            .values()
            .filter(|e| e.status == ItemState::Completed)
            .count() as u64;
        self.ledger.failed = self
            .ledger
            .files
            .values()
            .filter(|e| e.status == ItemState::Failed)
            .count() as u64;
    }

    async fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        // Atomic write: serialize, temp file, rename.
        let temp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(&self.ledger)?;
        fs::write(&temp, &content)
            .await
            .map_err(|e| ShiftError::StatePersistence(e.to_string()))?;
        fs::rename(&temp, &self.path).await.map_err(|e| {
            let _ = std::fs::remove_file(&temp);
            ShiftError::StatePersistence(e.to_string())
        })?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
