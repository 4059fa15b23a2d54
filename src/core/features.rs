//! Flattening windows into classifier feature vectors.
//!
//! A `(W, 4)` window becomes a vector of `W * 4` values, reading by reading
//! and feature by feature within a reading. Inference must reproduce this
//! order exactly.

use crate::core::windowing::{Window, WindowSet};
use crate::data::types::{CsiFeatures, FEATURE_COUNT};

/// Length of a flattened window.
pub fn flattened_len(window_len: usize) -> usize {
    window_len * FEATURE_COUNT
}

/// Flatten one window row-major.
pub fn flatten(window: &Window) -> Vec<f64> {
    window.values.iter().flatten().copied().collect()
}

/// Flatten every window of a set, preserving order.
pub fn flatten_all(set: &WindowSet) -> Vec<Vec<f64>> {
    set.windows().iter().map(flatten).collect()
}

/// Flatten a captured sequence of readings.
pub fn flatten_readings(readings: &[CsiFeatures]) -> Vec<f64> {
    readings.iter().flat_map(|r| r.to_array()).collect()
}

/// Synthesize a flattened window by repeating one reading `window_len` times.
///
/// This treats a one-shot reading as constant over the whole window.
pub fn replicate(reading: &CsiFeatures, window_len: usize) -> Vec<f64> {
    let row = reading.to_array();
    let mut out = Vec::with_capacity(flattened_len(window_len));
    for _ in 0..window_len {
        out.extend_from_slice(&row);
    }
    out
}
