//! Sliding-window segmentation and jitter augmentation.
//!
//! Each sample is cut into fixed-length windows that never cross sample
//! boundaries. Augmentation appends a Gaussian-jittered copy of the whole
//! window set after the originals, so window `i` and window `i + N` always
//! share a label.

use crate::config::{ShortSamplePolicy, WindowConfig};
use crate::core::labels::LabelEncoder;
use crate::data::types::{Sample, SampleId, FEATURE_COUNT};
use crate::error::{PipelineError, PipelineResult};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// A fixed-length slice of one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    /// Sample this window was cut from
    pub sample_id: SampleId,
    /// Offset of the first reading within the sample
    pub start: usize,
    /// Whether this is a noise-perturbed copy
    pub jittered: bool,
    /// Feature rows, one per reading
    pub values: Vec<[f64; FEATURE_COUNT]>,
}

impl Window {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Windows with their encoded labels.
///
/// `windows` and `labels` always have the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowSet {
    windows: Vec<Window>,
    labels: Vec<u32>,
}

impl WindowSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a window with its label.
    pub fn push(&mut self, window: Window, label: u32) {
        self.windows.push(window);
        self.labels.push(label);
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Iterate over `(window, label)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Window, u32)> {
        self.windows.iter().zip(self.labels.iter().copied())
    }

    /// Number of windows per class index.
    pub fn class_counts(&self, num_classes: usize) -> Vec<usize> {
        let mut counts = vec![0; num_classes];
        for &label in &self.labels {
            if let Some(count) = counts.get_mut(label as usize) {
                *count += 1;
            }
        }
        counts
    }
}

/// A sample that produced no windows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedSample {
    pub sample_id: SampleId,
    pub len: usize,
}

/// Result of segmenting a set of samples.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub windows: WindowSet,
    pub dropped: Vec<DroppedSample>,
}

/// Number of windows a sequence of `len` readings yields.
pub fn window_count(len: usize, window_len: usize, stride: usize) -> usize {
    if window_len == 0 || stride == 0 || len < window_len {
        0
    } else {
        (len - window_len) / stride + 1
    }
}

/// Cuts samples into windows.
#[derive(Debug, Clone)]
pub struct Windower {
    window_len: usize,
    stride: usize,
    short_samples: ShortSamplePolicy,
}

impl Windower {
    /// Create a windower; `window_len` and `stride` must be non-zero.
    pub fn new(window_len: usize, stride: usize) -> PipelineResult<Self> {
        let config = WindowConfig {
            window_len,
            stride,
            ..WindowConfig::default()
        };
        Self::from_config(&config)
    }

    pub fn from_config(config: &WindowConfig) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self {
            window_len: config.window_len,
            stride: config.stride,
            short_samples: config.short_samples,
        })
    }

    pub fn with_short_samples(mut self, policy: ShortSamplePolicy) -> Self {
        self.short_samples = policy;
        self
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Segment every sample, labelling windows through `encoder`.
    ///
    /// Samples shorter than the window length are dropped with a warning or
    /// rejected, depending on the short-sample policy.
    pub fn segment(
        &self,
        samples: &[Sample],
        encoder: &LabelEncoder,
    ) -> PipelineResult<Segmentation> {
        let mut windows = WindowSet::new();
        let mut dropped = Vec::new();

        for sample in samples {
            let label = encoder.encode(&sample.label)?;

            if sample.len() < self.window_len {
                match self.short_samples {
                    ShortSamplePolicy::Fail => {
                        return Err(PipelineError::InsufficientSequenceLength {
                            sample_id: sample.id.to_string(),
                            len: sample.len(),
                            window_len: self.window_len,
                        });
                    }
                    ShortSamplePolicy::Drop => {
                        tracing::warn!(
                            sample_id = %sample.id,
                            len = sample.len(),
                            window_len = self.window_len,
                            "sample shorter than window, dropped"
                        );
                        dropped.push(DroppedSample {
                            sample_id: sample.id.clone(),
                            len: sample.len(),
                        });
                        continue;
                    }
                }
            }

            let mut start = 0;
            while start + self.window_len <= sample.len() {
                let values = sample.readings[start..start + self.window_len]
                    .iter()
                    .map(|r| r.features.to_array())
                    .collect();
                windows.push(
                    Window {
                        sample_id: sample.id.clone(),
                        start,
                        jittered: false,
                        values,
                    },
                    label,
                );
                start += self.stride;
            }
        }

        tracing::info!(
            samples = samples.len(),
            dropped = dropped.len(),
            windows = windows.len(),
            window_len = self.window_len,
            stride = self.stride,
            "samples segmented"
        );

        Ok(Segmentation { windows, dropped })
    }
}

/// Return a copy of `set` with independent Gaussian noise added to every value.
pub fn jitter(set: &WindowSet, sigma: f64, seed: u64) -> PipelineResult<WindowSet> {
    let normal = Normal::new(0.0, sigma).map_err(|e| {
        PipelineError::Config(crate::config::ConfigError::InvalidValue {
            field: "noise_sigma",
            reason: e.to_string(),
        })
    })?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut out = WindowSet::new();
    for (window, label) in set.iter() {
        let values = window
            .values
            .iter()
            .map(|row| {
                let mut noisy = *row;
                for v in noisy.iter_mut() {
                    *v += normal.sample(&mut rng);
                }
                noisy
            })
            .collect();
        out.push(
            Window {
                sample_id: window.sample_id.clone(),
                start: window.start,
                jittered: true,
                values,
            },
            label,
        );
    }
    Ok(out)
}

/// Originals followed by one jittered copy of each, labels concatenated the same way.
pub fn augment(set: WindowSet, sigma: f64, seed: u64) -> PipelineResult<WindowSet> {
    let noisy = jitter(&set, sigma, seed)?;
    let mut out = set;
    out.windows.extend(noisy.windows);
    out.labels.extend(noisy.labels);
    tracing::debug!(windows = out.len(), "window set augmented");
    Ok(out)
}
