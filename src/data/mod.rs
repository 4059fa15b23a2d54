//! Training data for the CSI motion classifier.
//!
//! This module provides the reading/sample types and the loader that turns a
//! flat CSV table into per-sample, time-ordered sequences.

pub mod loader;
pub mod types;

// Re-export commonly used types
pub use loader::{LoadSummary, SampleLoader, REQUIRED_COLUMNS};
pub use types::{CsiFeatures, Reading, Sample, SampleId, FEATURE_COLUMNS, FEATURE_COUNT};
