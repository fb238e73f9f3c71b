use std::path::Path;

use regex::Regex;
use tracing::{debug, info};

use super::MigrationItem;
use crate::config::PlanConfig;
use crate::error::{Result, ShiftError};

/// Reads the tabular migration plan and extracts the rows whose reference
/// column points into the source store.
pub struct PlanLoader {
    config: PlanConfig,
    item_id_pattern: Regex,
}

impl PlanLoader {
    pub fn new(config: PlanConfig) -> Self {
        // Trailing path segment of the reference URL is the source item id.
        let item_id_pattern =
            Regex::new(r"/([A-Za-z0-9_-]+)$").expect("item id pattern is valid");
        Self {
            config,
            item_id_pattern,
        }
    }

    pub fn load(&self, path: &Path) -> Result<Vec<MigrationItem>> {
        let mut reader = csv::Reader::from_path(path).map_err(|e| {
            ShiftError::Plan(format!("cannot read {}: {}", path.display(), e))
        })?;

        let headers = reader.headers()?.clone();
        let reference_idx = self.column_index(&headers, &self.config.reference_column)?;
        let label_idx = self.column_index(&headers, &self.config.label_column)?;
        let record_id_idx = self.column_index(&headers, &self.config.record_id_column)?;

        let marker = self.config.source_marker.to_lowercase();
        let mut items = Vec::new();

        for record in reader.records() {
            let record = record?;
            let reference = record.get(reference_idx).unwrap_or("").trim();
            if reference.is_empty() || !reference.to_lowercase().contains(&marker) {
                continue;
            }

            let Some(captures) = self.item_id_pattern.captures(reference) else {
                debug!(reference, "Reference matches marker but has no item id");
                continue;
            };

            items.push(MigrationItem {
                product_label: record.get(label_idx).unwrap_or("").trim().to_string(),
                source_item_id: captures[1].to_string(),
                destination_record_id: record.get(record_id_idx).unwrap_or("").trim().to_string(),
                original_reference_url: reference.to_string(),
            });
        }

        info!(count = items.len(), plan = %path.display(), "Loaded migration plan");
        Ok(items)
    }

    fn column_index(&self, headers: &csv::StringRecord, name: &str) -> Result<usize> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| ShiftError::Plan(format!("plan is missing column '{}'", name)))
    }
}
