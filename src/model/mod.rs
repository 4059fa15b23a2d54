//! Classifier boundary.
//!
//! The learning algorithm is supplied by a third-party library. The rest of
//! the crate talks to it only through [`Classifier`], so any tree or ensemble
//! model with `fit` and `predict` can be substituted.

pub mod forest;
pub mod metrics;

pub use forest::{ForestParams, RandomForest};
pub use metrics::{ClassMetrics, ClassificationReport, ConfusionMatrix};

use crate::error::PipelineResult;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A supervised multi-class classifier over dense feature vectors.
pub trait Classifier: Sized + Serialize + DeserializeOwned {
    /// Hyperparameters accepted by [`Classifier::fit`].
    type Params;

    /// Fit on `features` (one row per example) with class indices `labels`.
    fn fit(features: &[Vec<f64>], labels: &[u32], params: &Self::Params) -> PipelineResult<Self>;

    /// Predict one class index per row.
    fn predict(&self, features: &[Vec<f64>]) -> PipelineResult<Vec<u32>>;

    /// Number of input columns the model was fitted on.
    fn n_features(&self) -> usize;
}
