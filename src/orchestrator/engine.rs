use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{RetryingApiClient, Transport};
use crate::audit::{AuditSink, AuditStatus};
use crate::config::{ResumeConfig, RunConfig};
use crate::error::{Result, ShiftError};
use crate::plan::MigrationItem;
use crate::progress::{ItemState, ProgressStore};
use crate::snapshot::{PlanSnapshot, SnapshotStore};

/// Aggregate outcome of one orchestrator invocation. Not persisted beyond
/// the audit trail it already generated.
#[derive(Debug)]
pub struct RunResult {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    pub errors: Vec<ItemError>,
}

impl RunResult {
    pub fn all_completed(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Debug)]
pub struct ItemError {
    pub product_label: String,
    pub error: String,
}

/// Runs the per-item pipeline (fetch, store, publish, record-update),
/// strictly sequentially. A single item's failure never aborts the run; the
/// orchestrator is the boundary where a failure becomes a recorded fact.
pub struct MigrationOrchestrator<T> {
    client: RetryingApiClient<T>,
    progress: ProgressStore,
    snapshots: SnapshotStore,
    audit: AuditSink,
    resume: ResumeConfig,
    run_config: RunConfig,
}

impl<T: Transport> MigrationOrchestrator<T> {
    pub fn new(
        client: RetryingApiClient<T>,
        progress: ProgressStore,
        snapshots: SnapshotStore,
        audit: AuditSink,
        resume: ResumeConfig,
        run_config: RunConfig,
    ) -> Self {
        Self {
            client,
            progress,
            snapshots,
            audit,
            resume,
            run_config,
        }
    }

    pub async fn run(&mut self, items: &[MigrationItem], dry_run: bool) -> Result<RunResult> {
        if items.is_empty() {
            return Err(ShiftError::EmptyPlan);
        }

        let run_id = Uuid::new_v4().to_string();
        let mode = if dry_run { "dry-run" } else { "production" };
        info!(run_id, mode, total = items.len(), "Starting migration run");

        self.progress.set_total(items.len() as u64).await?;

        let mut working = self
            .progress
            .unprocessed(items, self.resume.retry_stale_processing);
        let skipped = items.len() - working.len();
        if skipped > 0 {
            info!(skipped, "Skipping items already present in the ledger");
        }

        if dry_run && working.len() > self.run_config.dry_run_sample {
            warn!(
                sample = self.run_config.dry_run_sample,
                "Dry run: truncating working set"
            );
            working.truncate(self.run_config.dry_run_sample);
        }

        // Items already completed by earlier runs count toward this run's
        // totals, so a resumed run reports what one uninterrupted run would.
        // A dry run reports only the sample it exercised.
        let already_completed = if dry_run {
            0
        } else {
            items
                .iter()
                .filter(|item| {
                    self.progress
                        .ledger()
                        .status_of(&item.source_item_id)
                        .is_some_and(|entry| entry.status == ItemState::Completed)
                })
                .count() as u64
        };

        // The forensic record covers the entire submitted plan, not the
        // resume-filtered working set.
        let plan_snapshot = PlanSnapshot {
            run_id: run_id.clone(),
            mode: mode.to_string(),
            item_count: items.len(),
            timestamp: Utc::now(),
            items: items.to_vec(),
        };
        if let Err(e) = self.snapshots.snapshot_plan(&plan_snapshot).await {
            warn!(error = %e, "Plan snapshot failed, continuing");
        }

        self.audit
            .record(
                "run_started",
                json!({"run_id": run_id, "mode": mode, "items": working.len()}),
                AuditStatus::Success,
            )
            .await;

        let mut result = RunResult {
            total: if dry_run {
                working.len() as u64
            } else {
                items.len() as u64
            },
            completed: already_completed,
            failed: 0,
            errors: Vec::new(),
        };

        let count = working.len();
        for (idx, item) in working.into_iter().enumerate() {
            info!(
                position = idx + 1,
                of = count,
                product = %item.product_label,
                "Processing item"
            );

            match self.process_item(item, dry_run).await {
                Ok(()) => result.completed += 1,
                Err(e) => {
                    let message = e.to_string();
                    let mut details = BTreeMap::new();
                    details.insert("error".to_string(), message.clone());
                    self.progress
                        .mark_item(&item.source_item_id, ItemState::Failed, details)
                        .await?;
                    self.audit
                        .record(
                            "item_migration_failed",
                            json!({"product": item.product_label, "error": message}),
                            AuditStatus::Error,
                        )
                        .await;
                    warn!(product = %item.product_label, error = %message, "Item failed");
                    result.failed += 1;
                    result.errors.push(ItemError {
                        product_label: item.product_label.clone(),
                        error: message,
                    });
                }
            }
        }

        self.audit
            .record(
                "run_completed",
                json!({
                    "run_id": run_id,
                    "total": result.total,
                    "completed": result.completed,
                    "failed": result.failed,
                }),
                AuditStatus::Success,
            )
            .await;

        info!(
            total = result.total,
            completed = result.completed,
            failed = result.failed,
            "Migration run complete"
        );
        Ok(result)
    }

    async fn process_item(&mut self, item: &MigrationItem, dry_run: bool) -> Result<()> {
        let id = item.source_item_id.as_str();
        self.progress
            .mark_item(id, ItemState::Processing, BTreeMap::new())
            .await?;

        let blob = self.client.fetch_blob(id).await?;
        debug!(bytes = blob.len(), "Fetched source blob");

        let filename = self.destination_filename(&item.product_label);

        if dry_run {
            info!(filename, "[dry-run] would store blob at destination");
            info!("[dry-run] would publish link for stored item");
            self.client
                .update_record(&item.destination_record_id, "(dry-run)", true)
                .await?;

            let mut details = BTreeMap::new();
            details.insert("dry_run".to_string(), "true".to_string());
            self.progress
                .mark_item(id, ItemState::Completed, details)
                .await?;
            self.audit
                .record(
                    "item_migrated",
                    json!({"product": item.product_label, "dry_run": true}),
                    AuditStatus::Success,
                )
                .await;
            return Ok(());
        }

        let stored = self.client.store_blob(&filename, blob).await?;
        let link_url = self.client.publish_link(&stored.id).await?;

        // Best-effort copy of the record's prior state. Not a precondition.
        match self.client.fetch_record(&item.destination_record_id).await {
            Ok(fields) => {
                if let Err(e) = self
                    .snapshots
                    .snapshot_record_before_update(&item.destination_record_id, &fields)
                    .await
                {
                    warn!(record_id = %item.destination_record_id, error = %e, "Record snapshot failed");
                }
            }
            Err(e) => {
                warn!(
                    record_id = %item.destination_record_id,
                    error = %e,
                    "Could not capture pre-update record state"
                );
            }
        }

        self.client
            .update_record(&item.destination_record_id, &link_url, false)
            .await?;

        let mut details = BTreeMap::new();
        details.insert("share_url".to_string(), link_url.clone());
        details.insert("destination_id".to_string(), stored.id.clone());
        self.progress
            .mark_item(id, ItemState::Completed, details)
            .await?;
        self.audit
            .record(
                "item_migrated",
                json!({"product": item.product_label, "share_url": link_url}),
                AuditStatus::Success,
            )
            .await;

        info!(share_url = %link_url, "Item migrated");
        Ok(())
    }

    /// Destination filename from the product label, length-capped before the
    /// client sanitizes it.
    fn destination_filename(&self, label: &str) -> String {
        let capped: String = label.chars().take(self.run_config.filename_max_len).collect();
        format!("{}.bin", capped)
    }

    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }
}
