//! Inference boundary.
//!
//! An [`InferenceContext`] bundles everything a prediction needs (model,
//! normalizer, label encoding, window length) as one immutable value. It is
//! built once, by a training run or by loading an artifact set, and passed
//! explicitly to whoever serves predictions.
//!
//! A single reading is turned into a window by repeating it `window_len`
//! times, which treats a one-shot reading as constant over the window.

use crate::core::features::{flatten_readings, flattened_len, replicate};
use crate::core::labels::LabelEncoder;
use crate::core::normalize::Normalizer;
use crate::data::types::CsiFeatures;
use crate::error::{PipelineError, PipelineResult};
use crate::model::{Classifier, RandomForest};
use serde::{Deserialize, Serialize};

/// Everything needed to turn raw readings into a label.
#[derive(Debug)]
pub struct InferenceContext<C = RandomForest> {
    model: C,
    normalizer: Normalizer,
    encoder: LabelEncoder,
    window_len: usize,
    fingerprint: String,
}

impl<C: Classifier> InferenceContext<C> {
    /// Assemble a context, checking that its parts agree on the feature width.
    pub fn new(
        model: C,
        normalizer: Normalizer,
        encoder: LabelEncoder,
        window_len: usize,
        fingerprint: String,
    ) -> PipelineResult<Self> {
        let width = flattened_len(window_len);
        if normalizer.width() != width {
            return Err(PipelineError::shape_mismatch(
                "normalizer width",
                width,
                normalizer.width(),
            ));
        }
        if model.n_features() != width {
            return Err(PipelineError::shape_mismatch(
                "model input width",
                width,
                model.n_features(),
            ));
        }
        if encoder.num_classes() == 0 {
            return Err(PipelineError::NotTrained("label encoding has no classes".into()));
        }

        Ok(Self {
            model,
            normalizer,
            encoder,
            window_len,
            fingerprint,
        })
    }

    /// Predict from a single reading, repeated over a whole window.
    pub fn predict(&self, reading: &CsiFeatures) -> PipelineResult<String> {
        if let Some(field) = reading.first_non_finite() {
            return Err(PipelineError::invalid_input(field, "value is not finite"));
        }
        self.predict_flat(&replicate(reading, self.window_len))
    }

    /// Predict from a captured window of exactly `window_len` readings.
    pub fn predict_window(&self, readings: &[CsiFeatures]) -> PipelineResult<String> {
        if readings.len() != self.window_len {
            return Err(PipelineError::shape_mismatch(
                "inference window",
                self.window_len,
                readings.len(),
            ));
        }
        if let Some(field) = readings.iter().find_map(CsiFeatures::first_non_finite) {
            return Err(PipelineError::invalid_input(field, "value is not finite"));
        }
        self.predict_flat(&flatten_readings(readings))
    }

    /// Predict class indices for already flattened, unnormalized vectors.
    pub fn predict_indices(&self, rows: &[Vec<f64>]) -> PipelineResult<Vec<u32>> {
        let scaled = self.normalizer.transform(rows)?;
        self.model.predict(&scaled)
    }

    fn predict_flat(&self, row: &[f64]) -> PipelineResult<String> {
        let scaled = self.normalizer.transform_row(row)?;
        let predicted = self.model.predict(&[scaled])?;
        let index = predicted
            .first()
            .copied()
            .ok_or_else(|| PipelineError::Model("classifier returned no prediction".into()))?;
        Ok(self.encoder.decode(index)?.to_string())
    }

    pub fn model(&self) -> &C {
        &self.model
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn encoder(&self) -> &LabelEncoder {
        &self.encoder
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// Fingerprint shared by the artifacts of the producing training run.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// A scalar that may arrive as a number or as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarInput {
    Number(f64),
    Text(String),
}

impl From<f64> for ScalarInput {
    fn from(value: f64) -> Self {
        ScalarInput::Number(value)
    }
}

impl From<String> for ScalarInput {
    fn from(value: String) -> Self {
        ScalarInput::Text(value)
    }
}

/// Prediction request: the four statistics of one CSI reading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub amplitude_mean: Option<ScalarInput>,
    #[serde(default)]
    pub amplitude_std: Option<ScalarInput>,
    #[serde(default)]
    pub phase_mean: Option<ScalarInput>,
    #[serde(default)]
    pub phase_std: Option<ScalarInput>,
}

impl PredictRequest {
    pub fn new(amplitude_mean: f64, amplitude_std: f64, phase_mean: f64, phase_std: f64) -> Self {
        Self {
            amplitude_mean: Some(amplitude_mean.into()),
            amplitude_std: Some(amplitude_std.into()),
            phase_mean: Some(phase_mean.into()),
            phase_std: Some(phase_std.into()),
        }
    }

    /// Validate and convert into a reading.
    pub fn to_features(&self) -> PipelineResult<CsiFeatures> {
        Ok(CsiFeatures::new(
            scalar("amplitude_mean", &self.amplitude_mean)?,
            scalar("amplitude_std", &self.amplitude_std)?,
            scalar("phase_mean", &self.phase_mean)?,
            scalar("phase_std", &self.phase_std)?,
        ))
    }
}

fn scalar(field: &'static str, input: &Option<ScalarInput>) -> PipelineResult<f64> {
    let value = match input {
        None => return Err(PipelineError::invalid_input(field, "missing")),
        Some(ScalarInput::Number(v)) => *v,
        Some(ScalarInput::Text(text)) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| PipelineError::invalid_input(field, format!("not a number: `{text}`")))?,
    };
    if !value.is_finite() {
        return Err(PipelineError::invalid_input(field, "value is not finite"));
    }
    Ok(value)
}

/// Prediction response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub label: String,
}

/// Answer one request against an optional context.
///
/// A missing context means no training run has produced artifacts yet.
pub fn predict_position<C: Classifier>(
    context: Option<&InferenceContext<C>>,
    request: &PredictRequest,
) -> PipelineResult<PredictResponse> {
    let context = context
        .ok_or_else(|| PipelineError::NotTrained("no artifact set is loaded".into()))?;
    let features = request.to_features()?;
    let label = context.predict(&features)?;
    Ok(PredictResponse { label })
}
