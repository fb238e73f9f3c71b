//! Append-only structured audit trail. Advisory, never transactional with
//! the operation it records.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub status: AuditStatus,
    pub payload: serde_json::Value,
}

/// Newline-delimited JSON sink. A failed append is logged and swallowed so
/// it can never roll back or fail the business operation it was describing.
pub struct AuditSink {
    path: PathBuf,
}

impl AuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn record(
        &self,
        event_type: &str,
        payload: serde_json::Value,
        status: AuditStatus,
    ) {
        let record = AuditRecord {
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            status,
            payload,
        };

        if let Err(e) = self.append(&record).await {
            warn!(event_type, error = %e, "Audit append failed");
        }
    }

    async fn append(&self, record: &AuditRecord) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}
