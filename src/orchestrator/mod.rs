//! Drives each plan item through the migration pipeline.

mod engine;

pub use engine::{ItemError, MigrationOrchestrator, RunResult};
