mod settings;

pub use settings::{
    ApiConfig, PlanConfig, ResumeConfig, RetryConfig, RunConfig, ShiftConfig, StatePaths,
};
