//! Error types for the CSI motion classification pipeline.
//!
//! Every stage (loading, windowing, normalization, training, inference and
//! artifact persistence) reports failures through [`PipelineError`]. None of
//! these errors are transient: the operation that hit one is aborted.

use crate::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Convenient `Result` alias used across the crate.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors produced by the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required column is missing or a value is malformed.
    #[error("schema error{}: {message}", row_suffix(.row))]
    Schema {
        /// 1-based line number in the input, when the problem is row-specific.
        row: Option<u64>,
        message: String,
    },

    /// Rows sharing a sample id carry different labels.
    #[error(
        "sample `{sample_id}` has inconsistent labels: `{expected}` then `{found}` at line {row}"
    )]
    InconsistentLabel {
        sample_id: String,
        expected: String,
        found: String,
        row: u64,
    },

    /// A sample is shorter than the window length.
    #[error("sample `{sample_id}` has {len} readings, fewer than the window length {window_len}")]
    InsufficientSequenceLength {
        sample_id: String,
        len: usize,
        window_len: usize,
    },

    /// A label is not part of the frozen label encoding.
    #[error("label `{label}` is not in the trained label encoding")]
    UnseenLabel { label: String },

    /// A class index has no label in the frozen encoding.
    #[error("class index {index} is out of range for {num_classes} classes")]
    UnknownClassIndex { index: u32, num_classes: usize },

    /// Inference was requested before a training run produced artifacts.
    #[error("model is not trained: {0}")]
    NotTrained(String),

    /// A feature vector does not have the expected length.
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Artifacts on disk come from different training runs.
    #[error("artifact `{artifact}` has fingerprint {found}, manifest expects {expected}")]
    ArtifactMismatch {
        artifact: &'static str,
        expected: String,
        found: String,
    },

    /// An inference input is missing, non-numeric or non-finite.
    #[error("invalid input `{field}`: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// There is nothing to train or evaluate on.
    #[error("dataset is empty: {0}")]
    EmptyDataset(String),

    /// A class is too small to be represented in both partitions of a split.
    #[error("class `{class}` has only {count} member(s); at least 2 are needed to stratify")]
    InsufficientClassMembers { class: String, count: usize },

    /// The classifier failed to fit or predict.
    #[error("classifier error: {0}")]
    Model(String),

    /// Reading or writing a file failed.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV decoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration is invalid or could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// Construct a [`PipelineError::Schema`] for a specific input line.
    pub fn schema_at<S: Into<String>>(row: u64, message: S) -> Self {
        PipelineError::Schema {
            row: Some(row),
            message: message.into(),
        }
    }

    /// Construct a [`PipelineError::Schema`] not tied to a row.
    pub fn schema<S: Into<String>>(message: S) -> Self {
        PipelineError::Schema {
            row: None,
            message: message.into(),
        }
    }

    /// Construct a [`PipelineError::ShapeMismatch`].
    pub fn shape_mismatch(context: &'static str, expected: usize, actual: usize) -> Self {
        PipelineError::ShapeMismatch {
            context,
            expected,
            actual,
        }
    }

    /// Construct a [`PipelineError::InvalidInput`].
    pub fn invalid_input<S: Into<String>>(field: &'static str, reason: S) -> Self {
        PipelineError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    /// Construct a [`PipelineError::Io`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-readable code, used by the HTTP boundary.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Schema { .. } => "SCHEMA_ERROR",
            PipelineError::InconsistentLabel { .. } => "INCONSISTENT_LABEL",
            PipelineError::InsufficientSequenceLength { .. } => "INSUFFICIENT_SEQUENCE_LENGTH",
            PipelineError::UnseenLabel { .. } => "UNSEEN_LABEL",
            PipelineError::UnknownClassIndex { .. } => "UNKNOWN_CLASS_INDEX",
            PipelineError::NotTrained(_) => "NOT_TRAINED",
            PipelineError::ShapeMismatch { .. } => "SHAPE_MISMATCH",
            PipelineError::ArtifactMismatch { .. } => "ARTIFACT_MISMATCH",
            PipelineError::InvalidInput { .. } => "INVALID_INPUT",
            PipelineError::EmptyDataset(_) => "EMPTY_DATASET",
            PipelineError::InsufficientClassMembers { .. } => "INSUFFICIENT_CLASS_MEMBERS",
            PipelineError::Model(_) => "MODEL_ERROR",
            PipelineError::Io { .. } => "IO_ERROR",
            PipelineError::Csv(_) => "CSV_ERROR",
            PipelineError::Json(_) => "JSON_ERROR",
            PipelineError::Config(_) => "CONFIG_ERROR",
        }
    }
}

fn row_suffix(row: &Option<u64>) -> String {
    match row {
        Some(row) => format!(" at line {row}"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_mentions_line() {
        let err = PipelineError::schema_at(7, "column `phase_mean` is not numeric");
        let msg = err.to_string();
        assert!(msg.contains("line 7"));
        assert!(msg.contains("phase_mean"));

        let err = PipelineError::schema("missing columns: label");
        assert_eq!(err.to_string(), "schema error: missing columns: label");
    }

    #[test]
    fn test_shape_mismatch_message() {
        let err = PipelineError::shape_mismatch("normalizer", 40, 36);
        assert_eq!(
            err.to_string(),
            "shape mismatch in normalizer: expected 40, got 36"
        );
        assert_eq!(err.code(), "SHAPE_MISMATCH");
    }
}
