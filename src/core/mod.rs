//! Core data preparation for the CSI motion classifier.
//!
//! This module contains:
//! - Label encoding, fitted once over the whole label vocabulary
//! - Window segmentation and jitter augmentation
//! - Flattening windows into feature vectors
//! - Standardization fitted on the training partition
//! - Stratified train/test splitting

pub mod features;
pub mod labels;
pub mod normalize;
pub mod split;
pub mod windowing;

// Re-export commonly used types
pub use features::{flatten, flatten_all, flatten_readings, flattened_len, replicate};
pub use labels::LabelEncoder;
pub use normalize::Normalizer;
pub use split::{stratified_split, SplitIndices};
pub use windowing::{
    augment, jitter, window_count, DroppedSample, Segmentation, Window, WindowSet, Windower,
};
