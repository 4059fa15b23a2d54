//! Configuration for the CSI motion classifier.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main configuration for training and serving.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How samples are cut into windows and augmented
    pub windowing: WindowConfig,

    /// Split and classifier settings
    pub training: TrainingConfig,

    /// Directory holding the model, normalizer and label artifacts
    pub artifacts_path: PathBuf,

    /// Directory for the run log and other state
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("csi-motion");

        Self {
            windowing: WindowConfig::default(),
            training: TrainingConfig::default(),
            artifacts_path: data_dir.join("artifacts"),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file, falling back to defaults if it
    /// does not exist.
    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to a specific file.
    pub fn save_to(&self, config_path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("csi-motion")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.artifacts_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Check every section for values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.windowing.validate()?;
        self.training.validate()
    }
}

/// What to do with a sample that has fewer readings than one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortSamplePolicy {
    /// Skip the sample and log a warning
    #[default]
    Drop,
    /// Abort the run
    Fail,
}

impl std::str::FromStr for ShortSamplePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(ShortSamplePolicy::Drop),
            "fail" => Ok(ShortSamplePolicy::Fail),
            other => Err(ConfigError::InvalidValue {
                field: "short_samples",
                reason: format!("expected `drop` or `fail`, got `{other}`"),
            }),
        }
    }
}

/// Windowing and augmentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Readings per window
    pub window_len: usize,
    /// Offset between consecutive window starts
    pub stride: usize,
    /// Standard deviation of the additive Gaussian jitter
    pub noise_sigma: f64,
    /// Seed for the jitter draws
    pub noise_seed: u64,
    /// Handling of samples shorter than `window_len`
    pub short_samples: ShortSamplePolicy,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_len: 10,
            stride: 2,
            noise_sigma: 0.02,
            noise_seed: 42,
            short_samples: ShortSamplePolicy::Drop,
        }
    }
}

impl WindowConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_len == 0 {
            return Err(ConfigError::invalid("window_len", "must be at least 1"));
        }
        if self.stride == 0 {
            return Err(ConfigError::invalid("stride", "must be at least 1"));
        }
        if !self.noise_sigma.is_finite() || self.noise_sigma < 0.0 {
            return Err(ConfigError::invalid(
                "noise_sigma",
                format!("must be a finite non-negative number, got {}", self.noise_sigma),
            ));
        }
        Ok(())
    }
}

/// Split and classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fraction of windows held out for evaluation
    pub test_fraction: f64,
    /// Seed for the stratified split
    pub split_seed: u64,
    /// Number of trees in the forest
    pub n_trees: u16,
    /// Maximum tree depth (unlimited when absent)
    pub max_depth: Option<u16>,
    /// Minimum number of rows needed to split a node
    pub min_samples_split: usize,
    /// Seed for bootstrap sampling inside the forest
    pub forest_seed: u64,
    /// Number of held-out rows to print after training
    pub spot_checks: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            split_seed: 42,
            n_trees: 500,
            max_depth: None,
            min_samples_split: 2,
            forest_seed: 42,
            spot_checks: 2,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ConfigError::invalid(
                "test_fraction",
                format!("must be strictly between 0 and 1, got {}", self.test_fraction),
            ));
        }
        if self.n_trees == 0 {
            return Err(ConfigError::invalid("n_trees", "must be at least 1"));
        }
        if self.max_depth == Some(0) {
            return Err(ConfigError::invalid("max_depth", "must be at least 1 when set"));
        }
        if self.min_samples_split < 2 {
            return Err(ConfigError::invalid("min_samples_split", "must be at least 2"));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Serialize error: {0}")]
    SerializeError(String),
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid<S: Into<String>>(field: &'static str, reason: S) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}
