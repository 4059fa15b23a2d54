//! Run accounting for the classifier pipeline.
//!
//! Counts what went through the pipeline (rows, samples, windows, runs,
//! predictions) so an operator can see how the current model came to be.

pub mod run_log;

// Re-export commonly used types
pub use run_log::{
    create_shared_log, create_shared_log_with_persistence, RunLog, RunStats, SharedRunLog,
};
