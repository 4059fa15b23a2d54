//! Random forest classifier backed by `smartcore`.

use crate::config::TrainingConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::model::Classifier;
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_classifier::{
    RandomForestClassifier, RandomForestClassifierParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;

type Forest = RandomForestClassifier<f64, u32, DenseMatrix<f64>, Vec<u32>>;

/// Forest hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: u16,
    pub max_depth: Option<u16>,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self::from(&TrainingConfig::default())
    }
}

impl From<&TrainingConfig> for ForestParams {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            n_trees: config.n_trees,
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            seed: config.forest_seed,
        }
    }
}

impl ForestParams {
    fn to_smartcore(&self) -> RandomForestClassifierParameters {
        let mut params = RandomForestClassifierParameters::default()
            .with_n_trees(self.n_trees)
            .with_min_samples_split(self.min_samples_split)
            .with_seed(self.seed);
        if let Some(depth) = self.max_depth {
            params = params.with_max_depth(depth);
        }
        params
    }
}

/// A fitted random forest.
#[derive(Serialize, Deserialize)]
pub struct RandomForest {
    forest: Forest,
    params: ForestParams,
    n_features: usize,
}

impl std::fmt::Debug for RandomForest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomForest")
            .field("params", &self.params)
            .field("n_features", &self.n_features)
            .finish_non_exhaustive()
    }
}

impl RandomForest {
    pub fn params(&self) -> &ForestParams {
        &self.params
    }
}

/// Row-major rows into a dense matrix, checking they are rectangular.
fn to_matrix(features: &[Vec<f64>], expected_width: Option<usize>) -> PipelineResult<DenseMatrix<f64>> {
    let width = match (features.first(), expected_width) {
        (_, Some(width)) => width,
        (Some(row), None) => row.len(),
        (None, None) => return Err(PipelineError::EmptyDataset("no feature rows".into())),
    };
    if width == 0 {
        return Err(PipelineError::shape_mismatch("classifier input", 1, 0));
    }
    if let Some(row) = features.iter().find(|row| row.len() != width) {
        return Err(PipelineError::shape_mismatch("classifier input", width, row.len()));
    }
    let rows = features.to_vec();
    Ok(DenseMatrix::from_2d_vec(&rows))
}

impl Classifier for RandomForest {
    type Params = ForestParams;

    fn fit(features: &[Vec<f64>], labels: &[u32], params: &ForestParams) -> PipelineResult<Self> {
        if features.is_empty() {
            return Err(PipelineError::EmptyDataset("no training rows".into()));
        }
        if features.len() != labels.len() {
            return Err(PipelineError::shape_mismatch(
                "training labels",
                features.len(),
                labels.len(),
            ));
        }

        let x = to_matrix(features, None)?;
        let y = labels.to_vec();
        let n_features = features[0].len();

        tracing::info!(
            rows = features.len(),
            n_features,
            n_trees = params.n_trees,
            "fitting random forest"
        );
        let forest = Forest::fit(&x, &y, params.to_smartcore())
            .map_err(|e| PipelineError::Model(e.to_string()))?;

        Ok(Self {
            forest,
            params: params.clone(),
            n_features,
        })
    }

    fn predict(&self, features: &[Vec<f64>]) -> PipelineResult<Vec<u32>> {
        if features.is_empty() {
            return Ok(Vec::new());
        }
        let x = to_matrix(features, Some(self.n_features))?;
        self.forest
            .predict(&x)
            .map_err(|e| PipelineError::Model(e.to_string()))
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<u32>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..20 {
            let jitter = (i as f64 * 0.37).sin() * 0.1;
            x.push(vec![-1.0 + jitter, -2.0 - jitter]);
            y.push(0);
            x.push(vec![1.0 + jitter, 2.0 - jitter]);
            y.push(1);
        }
        (x, y)
    }

    fn small_params() -> ForestParams {
        ForestParams {
            n_trees: 15,
            ..ForestParams::default()
        }
    }

    #[test]
    fn test_fit_predict_separable() {
        let (x, y) = separable();
        let forest = RandomForest::fit(&x, &y, &small_params()).unwrap();
        assert_eq!(forest.n_features(), 2);

        let predicted = forest.predict(&[vec![-1.0, -2.0], vec![1.0, 2.0]]).unwrap();
        assert_eq!(predicted, vec![0, 1]);
    }

    #[test]
    fn test_predict_is_deterministic() {
        let (x, y) = separable();
        let forest = RandomForest::fit(&x, &y, &small_params()).unwrap();
        let a = forest.predict(&x).unwrap();
        let b = forest.predict(&x).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let (x, y) = separable();
        let forest = RandomForest::fit(&x, &y, &small_params()).unwrap();
        assert!(matches!(
            forest.predict(&[vec![1.0, 2.0, 3.0]]),
            Err(PipelineError::ShapeMismatch { expected: 2, actual: 3, .. })
        ));
    }

    #[test]
    fn test_label_count_mismatch_rejected() {
        let (x, _) = separable();
        assert!(matches!(
            RandomForest::fit(&x, &[0, 1], &small_params()),
            Err(PipelineError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_serde_roundtrip_predicts_the_same() {
        let (x, y) = separable();
        let forest = RandomForest::fit(&x, &y, &small_params()).unwrap();
        let json = serde_json::to_string(&forest).unwrap();
        let restored: RandomForest = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.predict(&x).unwrap(), forest.predict(&x).unwrap());
        assert_eq!(restored.params(), forest.params());
    }
}
