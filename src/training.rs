//! Training and evaluation runs.
//!
//! A training run is a strict sequence:
//!
//! ```text
//! samples ─▶ label encoding ─▶ windows ─▶ + jittered copies ─▶ flatten
//!         ─▶ stratified split ─▶ normalizer (train only) ─▶ classifier fit
//!         ─▶ test predictions ─▶ report
//! ```
//!
//! Any error aborts the run. The only tolerated loss is the documented drop
//! of samples shorter than one window.

use crate::artifacts::compute_fingerprint;
use crate::config::{Config, WindowConfig};
use crate::core::features::{flatten_all, flattened_len};
use crate::core::labels::LabelEncoder;
use crate::core::normalize::Normalizer;
use crate::core::split::{select, stratified_split, SplitIndices};
use crate::core::windowing::{augment, DroppedSample, WindowSet, Windower};
use crate::data::loader::LoadSummary;
use crate::data::types::Sample;
use crate::error::{PipelineError, PipelineResult};
use crate::inference::InferenceContext;
use crate::model::{Classifier, ClassificationReport, ForestParams, RandomForest};
use rand::seq::index::sample as sample_indices;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use uuid::Uuid;

/// Counts describing the data that went into a run.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub load: LoadSummary,
    pub dropped: Vec<DroppedSample>,
    /// Windows cut from the samples, before augmentation
    pub windows: usize,
    /// Windows after appending jittered copies
    pub augmented_windows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub n_features: usize,
    pub classes: Vec<String>,
}

/// Windowed, split and normalized data ready for a classifier.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub encoder: LabelEncoder,
    pub windows: WindowSet,
    pub split: SplitIndices,
    pub normalizer: Normalizer,
    pub train_features: Vec<Vec<f64>>,
    pub train_labels: Vec<u32>,
    pub test_features: Vec<Vec<f64>>,
    pub test_labels: Vec<u32>,
    pub summary: DatasetSummary,
}

/// Run every preprocessing step up to, but not including, the classifier.
pub fn prepare(samples: &[Sample], config: &Config) -> PipelineResult<PreparedData> {
    config.validate()?;
    if samples.is_empty() {
        return Err(PipelineError::EmptyDataset("no samples loaded".into()));
    }

    // Encoding covers the full vocabulary, before any split
    let encoder = LabelEncoder::fit(samples.iter().map(|s| s.label.as_str()));

    let windower = Windower::from_config(&config.windowing)?;
    let segmentation = windower.segment(samples, &encoder)?;
    let window_count = segmentation.windows.len();
    if window_count == 0 {
        return Err(PipelineError::EmptyDataset(format!(
            "no sample has at least {} readings",
            config.windowing.window_len
        )));
    }

    let windows = augment(
        segmentation.windows,
        config.windowing.noise_sigma,
        config.windowing.noise_seed,
    )?;

    let features = flatten_all(&windows);
    let split = stratified_split(
        windows.labels(),
        config.training.test_fraction,
        config.training.split_seed,
    )
    .map_err(|e| match e {
        PipelineError::InsufficientClassMembers { class, count } => {
            // Report the label, not the class index
            let class = class
                .parse::<u32>()
                .ok()
                .and_then(|i| encoder.decode(i).ok().map(str::to_string))
                .unwrap_or(class);
            PipelineError::InsufficientClassMembers { class, count }
        }
        other => other,
    })?;

    let raw_train = select(&features, &split.train);
    let raw_test = select(&features, &split.test);
    let normalizer = Normalizer::fit(&raw_train)?;
    let train_features = normalizer.transform(&raw_train)?;
    let test_features = normalizer.transform(&raw_test)?;
    let train_labels = select(windows.labels(), &split.train);
    let test_labels = select(windows.labels(), &split.test);

    let summary = DatasetSummary {
        load: LoadSummary::of(samples),
        dropped: segmentation.dropped,
        windows: window_count,
        augmented_windows: windows.len(),
        train_rows: train_features.len(),
        test_rows: test_features.len(),
        n_features: flattened_len(config.windowing.window_len),
        classes: encoder.classes().to_vec(),
    };

    tracing::info!(
        windows = summary.windows,
        augmented = summary.augmented_windows,
        train = summary.train_rows,
        test = summary.test_rows,
        classes = encoder.num_classes(),
        "dataset prepared"
    );

    Ok(PreparedData {
        encoder,
        windows,
        split,
        normalizer,
        train_features,
        train_labels,
        test_features,
        test_labels,
        summary,
    })
}

/// One held-out row with its true and predicted labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpotCheck {
    /// Position within the test partition
    pub row: usize,
    pub truth: String,
    pub predicted: String,
}

/// Result of a training run.
#[derive(Debug)]
pub struct TrainingOutcome<C = RandomForest> {
    pub run_id: Uuid,
    pub context: InferenceContext<C>,
    pub report: ClassificationReport,
    pub summary: DatasetSummary,
    test_truth: Vec<u32>,
    test_predicted: Vec<u32>,
}

impl<C: Classifier> TrainingOutcome<C> {
    /// A seeded random selection of up to `n` test rows.
    pub fn spot_checks(&self, n: usize, seed: u64) -> Vec<SpotCheck> {
        let total = self.test_truth.len();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut rows = sample_indices(&mut rng, total, n.min(total)).into_vec();
        rows.sort_unstable();

        let name = |index: u32| {
            self.context
                .encoder()
                .decode(index)
                .map(str::to_string)
                .unwrap_or_else(|_| format!("#{index}"))
        };
        rows.into_iter()
            .map(|row| SpotCheck {
                row,
                truth: name(self.test_truth[row]),
                predicted: name(self.test_predicted[row]),
            })
            .collect()
    }

    /// Class indices of the test partition, true and predicted.
    pub fn test_predictions(&self) -> (&[u32], &[u32]) {
        (&self.test_truth, &self.test_predicted)
    }
}

/// Train the default random forest.
pub fn train(samples: &[Sample], config: &Config) -> PipelineResult<TrainingOutcome<RandomForest>> {
    train_with::<RandomForest>(samples, config, &ForestParams::from(&config.training))
}

/// Train any classifier on the prepared data.
pub fn train_with<C: Classifier>(
    samples: &[Sample],
    config: &Config,
    params: &C::Params,
) -> PipelineResult<TrainingOutcome<C>> {
    let prepared = prepare(samples, config)?;

    let model = C::fit(&prepared.train_features, &prepared.train_labels, params)?;
    let test_predicted = model.predict(&prepared.test_features)?;
    let report =
        ClassificationReport::evaluate(&prepared.test_labels, &test_predicted, &prepared.encoder)?;

    let run_id = Uuid::new_v4();
    let window_len = config.windowing.window_len;
    let fingerprint =
        compute_fingerprint(&run_id, window_len, &prepared.normalizer, &prepared.encoder)?;
    let context = InferenceContext::new(
        model,
        prepared.normalizer,
        prepared.encoder,
        window_len,
        fingerprint,
    )?;

    tracing::info!(run_id = %run_id, accuracy = report.accuracy, "training run complete");

    Ok(TrainingOutcome {
        run_id,
        context,
        report,
        summary: prepared.summary,
        test_truth: prepared.test_labels,
        test_predicted,
    })
}

/// Result of evaluating saved artifacts on another dataset.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationOutcome {
    pub report: ClassificationReport,
    pub windows: usize,
    pub dropped: Vec<DroppedSample>,
}

/// Evaluate a trained context on labeled samples, without augmentation.
///
/// Labels outside the frozen encoding fail with `UnseenLabel`. The context's
/// window length is used; stride and short-sample policy come from `windowing`.
pub fn evaluate<C: Classifier>(
    context: &InferenceContext<C>,
    samples: &[Sample],
    windowing: &WindowConfig,
) -> PipelineResult<EvaluationOutcome> {
    let config = WindowConfig {
        window_len: context.window_len(),
        ..windowing.clone()
    };
    let segmentation = Windower::from_config(&config)?.segment(samples, context.encoder())?;
    if segmentation.windows.is_empty() {
        return Err(PipelineError::EmptyDataset(format!(
            "no sample has at least {} readings",
            context.window_len()
        )));
    }

    let features = flatten_all(&segmentation.windows);
    let predicted = context.predict_indices(&features)?;
    let report =
        ClassificationReport::evaluate(segmentation.windows.labels(), &predicted, context.encoder())?;

    tracing::info!(windows = segmentation.windows.len(), accuracy = report.accuracy, "evaluation complete");

    Ok(EvaluationOutcome {
        report,
        windows: segmentation.windows.len(),
        dropped: segmentation.dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::{CsiFeatures, Reading, SampleId};
    use approx::assert_abs_diff_eq;

    fn make_sample(id: &str, label: &str, len: usize, base: f64) -> Sample {
        Sample {
            id: SampleId::from(id),
            label: label.to_string(),
            readings: (0..len)
                .map(|i| {
                    let wobble = (i as f64 * 0.9 + base).sin() * 0.05;
                    Reading {
                        timestamp: i as f64,
                        features: CsiFeatures::new(
                            base + wobble,
                            0.1 * base + wobble,
                            -base + wobble,
                            0.01 * base,
                        ),
                    }
                })
                .collect(),
        }
    }

    fn small_config() -> Config {
        let mut config = Config::default();
        config.training.n_trees = 20;
        config
    }

    #[test]
    fn test_prepare_counts() {
        let samples = vec![
            make_sample("1", "A", 20, 1.0),
            make_sample("2", "B", 20, 5.0),
        ];
        let prepared = prepare(&samples, &small_config()).unwrap();

        assert_eq!(prepared.summary.windows, 12);
        assert_eq!(prepared.summary.augmented_windows, 24);
        assert_eq!(prepared.windows.class_counts(2), vec![12, 12]);
        assert_eq!(prepared.summary.n_features, 40);
        assert_eq!(
            prepared.summary.train_rows + prepared.summary.test_rows,
            24
        );
        assert_eq!(prepared.train_labels.len(), prepared.train_features.len());
        assert_eq!(prepared.test_labels.len(), prepared.test_features.len());
    }

    #[test]
    fn test_normalizer_fitted_on_train_partition_only() {
        let samples = vec![
            make_sample("1", "A", 30, 1.0),
            make_sample("2", "B", 30, 4.0),
            make_sample("3", "A", 24, 1.5),
            make_sample("4", "B", 26, 3.5),
        ];
        let prepared = prepare(&samples, &small_config()).unwrap();

        for col in 0..prepared.summary.n_features {
            let column: Vec<f64> = prepared.train_features.iter().map(|r| r[col]).collect();
            let n = column.len() as f64;
            let mean = column.iter().sum::<f64>() / n;
            let std = (column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
            assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-9);
            assert_abs_diff_eq!(std, 1.0, epsilon = 1e-9);
        }

        let raw = flatten_all(&prepared.windows);
        let refit = Normalizer::fit(&select(&raw, &prepared.split.train)).unwrap();
        assert_eq!(refit, prepared.normalizer);
    }

    #[test]
    fn test_empty_and_too_short_inputs() {
        assert!(matches!(
            prepare(&[], &small_config()),
            Err(PipelineError::EmptyDataset(_))
        ));
        let samples = vec![make_sample("1", "A", 5, 1.0)];
        assert!(matches!(
            prepare(&samples, &small_config()),
            Err(PipelineError::EmptyDataset(_))
        ));
    }

    #[test]
    fn test_train_and_spot_checks() {
        let samples = vec![
            make_sample("1", "A", 20, 1.0),
            make_sample("2", "B", 20, 5.0),
            make_sample("3", "A", 20, 1.2),
            make_sample("4", "B", 20, 4.8),
        ];
        let outcome = train(&samples, &small_config()).unwrap();
        assert!(outcome.report.accuracy > 0.9);
        assert_eq!(outcome.summary.classes, vec!["A", "B"]);

        let checks = outcome.spot_checks(2, 7);
        assert_eq!(checks.len(), 2);
        assert_eq!(checks, outcome.spot_checks(2, 7));
        assert!(outcome.spot_checks(1000, 7).len() == outcome.summary.test_rows);

        let (truth, predicted) = outcome.test_predictions();
        assert_eq!(truth.len(), predicted.len());
    }

    #[test]
    fn test_evaluate_rejects_unseen_labels() {
        let samples = vec![
            make_sample("1", "A", 20, 1.0),
            make_sample("2", "B", 20, 5.0),
        ];
        let outcome = train(&samples, &small_config()).unwrap();

        let report = evaluate(&outcome.context, &samples, &WindowConfig::default()).unwrap();
        assert_eq!(report.windows, 12);
        assert!(report.report.accuracy > 0.9);

        let novel = vec![make_sample("9", "C", 20, 9.0)];
        assert!(matches!(
            evaluate(&outcome.context, &novel, &WindowConfig::default()),
            Err(PipelineError::UnseenLabel { .. })
        ));
    }
}
