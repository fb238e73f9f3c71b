use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{Result, ShiftError};

/// Top-level configuration, loaded from a TOML file and passed explicitly
/// into every component constructor. There is no ambient global state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShiftConfig {
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub resume: ResumeConfig,
    pub run: RunConfig,
    pub plan: PlanConfig,
}

impl ShiftConfig {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            ShiftError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values, collecting every violation.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.api.base_url.is_empty() {
            errors.push("api.base_url must not be empty");
        }
        if self.api.destination_drive_id.is_empty() {
            errors.push("api.destination_drive_id must not be empty");
        }
        if self.api.record_site_id.is_empty() {
            errors.push("api.record_site_id must not be empty");
        }
        if self.api.record_list_id.is_empty() {
            errors.push("api.record_list_id must not be empty");
        }
        if self.api.record_field.is_empty() {
            errors.push("api.record_field must not be empty");
        }
        if self.api.timeout_secs == 0 {
            errors.push("api.timeout_secs must be greater than 0");
        }

        if self.retry.max_retries == 0 {
            errors.push("retry.max_retries must be greater than 0");
        }

        if self.run.dry_run_sample == 0 {
            errors.push("run.dry_run_sample must be greater than 0");
        }
        if self.run.filename_max_len == 0 {
            errors.push("run.filename_max_len must be greater than 0");
        }

        if self.plan.source_marker.is_empty() {
            errors.push("plan.source_marker must not be empty");
        }
        if self.plan.reference_column.is_empty() {
            errors.push("plan.reference_column must not be empty");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ShiftError::Config(errors.join("; ")))
        }
    }
}

/// Remote API endpoints and identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the HTTP+JSON API.
    pub base_url: String,
    /// Destination drive the blobs are stored into.
    pub destination_drive_id: String,
    /// Site holding the record list to patch.
    pub record_site_id: String,
    /// Record list to patch.
    pub record_list_id: String,
    /// Field on the record that receives the published link.
    pub record_field: String,
    /// Link type requested when publishing.
    pub link_type: String,
    /// Link scope requested when publishing.
    pub link_scope: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Environment variable holding the bearer token.
    pub token_env: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            destination_drive_id: String::new(),
            record_site_id: String::new(),
            record_list_id: String::new(),
            record_field: "Reference_Link".to_string(),
            link_type: "organizationView".to_string(),
            link_scope: "organization".to_string(),
            timeout_secs: 30,
            token_env: "DOCSHIFT_TOKEN".to_string(),
        }
    }
}

/// Retry and backoff tuning for the remote client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    /// Wait applied to a rate-limit response that carries no advised delay.
    pub rate_limit_fallback_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_secs: 2,
            rate_limit_fallback_secs: 2,
        }
    }
}

/// Resumption behavior for partial runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResumeConfig {
    /// Re-attempt items left in `processing` by a killed run. When false,
    /// any ledger entry (including a stale `processing` one) excludes the
    /// item from the working set, matching the historical behavior.
    pub retry_stale_processing: bool,
}

impl Default for ResumeConfig {
    fn default() -> Self {
        Self {
            retry_stale_processing: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory holding the ledger, audit log, and snapshots.
    pub state_dir: PathBuf,
    /// Working-set cap applied in dry-run mode.
    pub dry_run_sample: usize,
    /// Cap on the label-derived part of destination filenames.
    pub filename_max_len: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("migration_state"),
            dry_run_sample: 5,
            filename_max_len: 50,
        }
    }
}

/// Columns and markers used to select plan rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    pub label_column: String,
    pub reference_column: String,
    pub record_id_column: String,
    /// Substring identifying references that live in the source store.
    pub source_marker: String,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            label_column: "Product Name".to_string(),
            reference_column: "Reference".to_string(),
            record_id_column: "ID".to_string(),
            source_marker: String::new(),
        }
    }
}

/// Filesystem layout of the persisted migration state.
#[derive(Debug, Clone)]
pub struct StatePaths {
    pub ledger: PathBuf,
    pub audit_log: PathBuf,
    pub snapshot_dir: PathBuf,
}

impl StatePaths {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            ledger: state_dir.join("progress.json"),
            audit_log: state_dir.join("audit.jsonl"),
            snapshot_dir: state_dir.join("snapshots"),
        }
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        if let Some(parent) = self.ledger.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::create_dir_all(&self.snapshot_dir).await?;
        Ok(())
    }
}
