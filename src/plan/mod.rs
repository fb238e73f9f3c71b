//! Migration plan loading: tabular source file -> validated item list.

mod loader;

pub use loader::PlanLoader;

/// One artifact to migrate. Identity is `source_item_id`; immutable once
/// loaded.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MigrationItem {
    pub product_label: String,
    pub source_item_id: String,
    pub destination_record_id: String,
    pub original_reference_url: String,
}
