//! Write-once snapshots for forensic recovery. Never read back by the
//! orchestrator; no update or delete operations exist.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::error::Result;
use crate::plan::MigrationItem;

/// Point-in-time copy of the full migration plan, taken at run start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub run_id: String,
    pub mode: String,
    pub item_count: usize,
    pub timestamp: DateTime<Utc>,
    pub items: Vec<MigrationItem>,
}

pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write an immutable copy of the planned item list.
    pub async fn snapshot_plan(&self, snapshot: &PlanSnapshot) -> Result<PathBuf> {
        let name = format!(
            "{}_plan_{}.json",
            Utc::now().format("%Y%m%dT%H%M%SZ"),
            snapshot.run_id
        );
        let path = self.write(&name, serde_json::to_string_pretty(snapshot)?).await?;
        info!(path = %path.display(), items = snapshot.item_count, "Plan snapshot written");
        Ok(path)
    }

    /// Write an immutable copy of a record's field values before an update.
    pub async fn snapshot_record_before_update(
        &self,
        record_id: &str,
        current_fields: &serde_json::Value,
    ) -> Result<PathBuf> {
        // uuid suffix keeps names unique even for back-to-back snapshots of
        // the same record.
        let name = format!(
            "{}_record_{}_{}.json",
            Utc::now().format("%Y%m%dT%H%M%SZ"),
            record_id,
            uuid::Uuid::new_v4().simple()
        );
        let path = self
            .write(&name, serde_json::to_string_pretty(current_fields)?)
            .await?;
        info!(path = %path.display(), record_id, "Pre-update record snapshot written");
        Ok(path)
    }

    async fn write(&self, name: &str, content: String) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(name);
        fs::write(&path, content).await?;
        Ok(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn plan_snapshot_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());

        let snapshot = PlanSnapshot {
            run_id: "run-1".to_string(),
            mode: "production".to_string(),
            item_count: 1,
            timestamp: Utc::now(),
            items: vec![MigrationItem {
                product_label: "Widget".to_string(),
                source_item_id: "a".to_string(),
                destination_record_id: "1".to_string(),
                original_reference_url: "https://old.example.test/items/a".to_string(),
            }],
        };

        let path = store.snapshot_plan(&snapshot).await.unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let read_back: PlanSnapshot = serde_json::from_str(&content).unwrap();
        assert_eq!(read_back.items, snapshot.items);
    }

    #[tokio::test]
    async fn record_snapshots_get_unique_files() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let fields = serde_json::json!({"Reference_Link": "https://old.example.test/items/a"});

        let first = store
            .snapshot_record_before_update("rec-1", &fields)
            .await
            .unwrap();
        let second = store
            .snapshot_record_before_update("rec-1", &fields)
            .await
            .unwrap();
        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
    }
}
