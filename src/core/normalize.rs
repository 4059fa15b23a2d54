//! Per-column standardization of feature vectors.
//!
//! Means and scales are fitted on the training partition only and then applied
//! unchanged to test vectors and inference inputs.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Fitted column means and scales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    means: Vec<f64>,
    /// Population standard deviations; 1.0 for constant columns
    scales: Vec<f64>,
}

impl Normalizer {
    /// Fit on a set of equally sized vectors.
    pub fn fit(rows: &[Vec<f64>]) -> PipelineResult<Self> {
        let width = rows
            .first()
            .map(Vec::len)
            .ok_or_else(|| PipelineError::EmptyDataset("no vectors to fit the normalizer on".into()))?;
        if let Some(row) = rows.iter().find(|row| row.len() != width) {
            return Err(PipelineError::shape_mismatch("normalizer fit", width, row.len()));
        }

        let mut means = Vec::with_capacity(width);
        let mut scales = Vec::with_capacity(width);
        for col in 0..width {
            let column: Vec<f64> = rows.iter().map(|row| row[col]).collect();
            let mean = column.iter().mean();
            let std = column.iter().population_std_dev();
            means.push(mean);
            scales.push(if is_constant(std, mean) { 1.0 } else { std });
        }

        tracing::debug!(width, rows = rows.len(), "normalizer fitted");
        Ok(Self { means, scales })
    }

    /// Build from stored parameters.
    pub fn from_parts(means: Vec<f64>, scales: Vec<f64>) -> PipelineResult<Self> {
        let normalizer = Self { means, scales };
        normalizer.validate()?;
        Ok(normalizer)
    }

    /// Check the parameters are consistent and usable.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.means.len() != self.scales.len() {
            return Err(PipelineError::shape_mismatch(
                "normalizer parameters",
                self.means.len(),
                self.scales.len(),
            ));
        }
        if self.means.iter().any(|m| !m.is_finite())
            || self.scales.iter().any(|s| !s.is_finite() || *s <= 0.0)
        {
            return Err(PipelineError::schema(
                "normalizer has non-finite means or non-positive scales",
            ));
        }
        Ok(())
    }

    /// Number of columns this normalizer expects.
    pub fn width(&self) -> usize {
        self.means.len()
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    /// Standardize one vector.
    pub fn transform_row(&self, row: &[f64]) -> PipelineResult<Vec<f64>> {
        if row.len() != self.width() {
            return Err(PipelineError::shape_mismatch(
                "normalizer transform",
                self.width(),
                row.len(),
            ));
        }
        Ok(row
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .collect())
    }

    /// Standardize many vectors.
    pub fn transform(&self, rows: &[Vec<f64>]) -> PipelineResult<Vec<Vec<f64>>> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }
}

/// Whether a column's spread is indistinguishable from rounding noise.
fn is_constant(std: f64, mean: f64) -> bool {
    !std.is_finite() || std <= 10.0 * f64::EPSILON * mean.abs().max(1.0)
}
