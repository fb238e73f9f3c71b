pub mod api;
pub mod audit;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod plan;
pub mod progress;
pub mod snapshot;

pub use api::{Endpoints, HttpTransport, RetryPolicy, RetryingApiClient, Transport};
pub use audit::{AuditSink, AuditStatus};
pub use auth::{EnvTokenProvider, StaticTokenProvider, TokenProvider};
pub use config::{ShiftConfig, StatePaths};
pub use error::{Result, ShiftError};
pub use orchestrator::{MigrationOrchestrator, RunResult};
pub use plan::{MigrationItem, PlanLoader};
pub use progress::{ItemState, ProgressLedger, ProgressStore};
pub use snapshot::{PlanSnapshot, SnapshotStore};
