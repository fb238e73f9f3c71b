use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShiftError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Migration plan error: {0}")]
    Plan(String),

    #[error("No items to migrate")]
    EmptyPlan,

    #[error("Failed to download file {item_id} from source store: {reason}")]
    Download { item_id: String, reason: String },

    #[error("Failed to store {filename} at destination: {reason}")]
    Store { filename: String, reason: String },

    #[error("Failed to publish link for item {item_id}: {reason}")]
    PublishLink { item_id: String, reason: String },

    #[error("Failed to update record {record_id}: {reason}")]
    RecordUpdate { record_id: String, reason: String },

    #[error("Failed to fetch record {record_id}: {reason}")]
    RecordFetch { record_id: String, reason: String },

    #[error("State persistence failed: {0}")]
    StatePersistence(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),
}

impl ShiftError {
    /// Whether this error aborts the whole run rather than a single item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Auth(_) | Self::Plan(_) | Self::EmptyPlan
        )
    }
}

pub type Result<T> = std::result::Result<T, ShiftError>;
