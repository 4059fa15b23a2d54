//! CSI Motion Classifier - motion and position classification from Wi-Fi CSI.
//!
//! This library turns labeled recordings of per-timestamp CSI statistics
//! (amplitude mean/std, phase mean/std) into a trained classifier, and serves
//! predictions for single readings from a persisted artifact set.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                       CSI Motion Classifier                       │
//! ├───────────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌───────────┐   ┌───────────┐   ┌──────────────┐  │
//! │  │  Loader  │──▶│ Windowing │──▶│ Normalize │──▶│  Classifier  │  │
//! │  │  (CSV)   │   │ + jitter  │   │(train fit)│   │random forest │  │
//! │  └──────────┘   └───────────┘   └───────────┘   └──────────────┘  │
//! │                                                        │          │
//! │                                                        ▼          │
//! │  ┌──────────┐   ┌───────────┐                   ┌──────────────┐  │
//! │  │ Run log  │   │ Artifacts │◀──────────────────│    Report    │  │
//! │  └──────────┘   └───────────┘                   └──────────────┘  │
//! │                       │                                           │
//! │                       ▼                                           │
//! │               ┌────────────────┐                                  │
//! │               │InferenceContext│──▶ CLI / HTTP predict            │
//! │               └────────────────┘                                  │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use csi_motion_classifier::{train, ArtifactStore, Config, CsiFeatures, SampleLoader};
//!
//! let config = Config::default();
//! let samples = SampleLoader::new().load_path("recordings.csv")?;
//! let outcome = train(&samples, &config)?;
//! println!("{}", outcome.report);
//!
//! let store = ArtifactStore::new(&config.artifacts_path);
//! store.save(&outcome.context, outcome.run_id)?;
//!
//! let context: csi_motion_classifier::InferenceContext = store.load()?;
//! let label = context.predict(&CsiFeatures::new(12.1, 0.8, -0.4, 0.05))?;
//! # Ok::<(), csi_motion_classifier::PipelineError>(())
//! ```

pub mod artifacts;
pub mod audit;
pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod inference;
pub mod model;
pub mod training;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use artifacts::{ArtifactManifest, ArtifactStore};
pub use audit::{RunLog, RunStats, SharedRunLog};
pub use config::{Config, ConfigError, ShortSamplePolicy, TrainingConfig, WindowConfig};
pub use core::{LabelEncoder, Normalizer, WindowSet, Windower};
pub use data::{CsiFeatures, Reading, Sample, SampleId, SampleLoader};
pub use error::{PipelineError, PipelineResult};
pub use inference::{predict_position, InferenceContext, PredictRequest, PredictResponse};
pub use model::{Classifier, ClassificationReport, ForestParams, RandomForest};
pub use training::{evaluate, train, train_with, TrainingOutcome};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
