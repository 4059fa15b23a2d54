//! Persisted artifact sets.
//!
//! A training run writes four JSON files into one directory:
//!
//! ```text
//! manifest.json    run id, creation time, producer, shapes, classes,
//!                  fingerprint, model digest
//! model.json       { fingerprint, payload: <classifier> }
//! normalizer.json  { fingerprint, payload: <normalizer> }
//! labels.json      { fingerprint, payload: <label encoding> }
//! ```
//!
//! The fingerprint is a SHA-256 digest over the run id, window length,
//! normalizer and label encoding. Loading refuses any file whose fingerprint
//! differs from the manifest, so artifacts from different runs are never mixed.
//! The serialized model is covered by its own SHA-256 digest in the manifest,
//! checked against the loaded payload.

use crate::core::labels::LabelEncoder;
use crate::core::normalize::Normalizer;
use crate::data::types::FEATURE_COUNT;
use crate::error::{PipelineError, PipelineResult};
use crate::inference::InferenceContext;
use crate::model::Classifier;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Name of the producing software.
pub const PRODUCER_NAME: &str = "csi-motion-classifier";

/// Artifact file format version.
pub const ARTIFACT_VERSION: &str = "1.1";

const MANIFEST_FILE: &str = "manifest.json";
const MODEL_FILE: &str = "model.json";
const NORMALIZER_FILE: &str = "normalizer.json";
const LABELS_FILE: &str = "labels.json";

/// Description of one training run's artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub version: String,
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub producer: String,
    pub producer_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub window_len: usize,
    pub feature_count: usize,
    pub n_features: usize,
    pub classes: Vec<String>,
    pub fingerprint: String,
    /// SHA-256 of the serialized model payload
    pub model_digest: String,
}

/// Wrapper binding an artifact to its run.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    fingerprint: String,
    payload: T,
}

/// Fingerprint for a run's preprocessing state.
pub fn compute_fingerprint(
    run_id: &Uuid,
    window_len: usize,
    normalizer: &Normalizer,
    encoder: &LabelEncoder,
) -> PipelineResult<String> {
    let mut hasher = Sha256::new();
    hasher.update(run_id.as_bytes());
    hasher.update((window_len as u64).to_le_bytes());
    hasher.update(serde_json::to_vec(normalizer)?);
    hasher.update(serde_json::to_vec(encoder)?);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Digest of a serialized payload.
///
/// Hashes the canonical JSON of the value tree, so the bytes are the same
/// whether the payload came from a live model or was read back from disk.
pub fn payload_digest(payload: &serde_json::Value) -> PipelineResult<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(payload)?);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Reads and writes artifact sets in one directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether a manifest is present.
    pub fn exists(&self) -> bool {
        self.dir.join(MANIFEST_FILE).exists()
    }

    /// Write the context's artifacts, replacing any previous set.
    ///
    /// The manifest is written last so a partially written set is never
    /// picked up as complete.
    pub fn save<C: Classifier>(
        &self,
        context: &InferenceContext<C>,
        run_id: Uuid,
    ) -> PipelineResult<ArtifactManifest> {
        let fingerprint = compute_fingerprint(
            &run_id,
            context.window_len(),
            context.normalizer(),
            context.encoder(),
        )?;
        if fingerprint != context.fingerprint() {
            return Err(PipelineError::ArtifactMismatch {
                artifact: "context",
                expected: fingerprint,
                found: context.fingerprint().to_string(),
            });
        }

        std::fs::create_dir_all(&self.dir).map_err(|e| PipelineError::io(&self.dir, e))?;

        let manifest_path = self.dir.join(MANIFEST_FILE);
        if manifest_path.exists() {
            std::fs::remove_file(&manifest_path).map_err(|e| PipelineError::io(&manifest_path, e))?;
        }

        let model = serde_json::to_value(context.model())?;
        let model_digest = payload_digest(&model)?;

        self.write_envelope(MODEL_FILE, &fingerprint, &model)?;
        self.write_envelope(NORMALIZER_FILE, &fingerprint, context.normalizer())?;
        self.write_envelope(LABELS_FILE, &fingerprint, context.encoder())?;

        let manifest = ArtifactManifest {
            version: ARTIFACT_VERSION.to_string(),
            run_id,
            created_at: Utc::now(),
            producer: PRODUCER_NAME.to_string(),
            producer_version: env!("CARGO_PKG_VERSION").to_string(),
            host: hostname::get().ok().and_then(|h| h.into_string().ok()),
            window_len: context.window_len(),
            feature_count: FEATURE_COUNT,
            n_features: context.model().n_features(),
            classes: context.encoder().classes().to_vec(),
            fingerprint,
            model_digest,
        };
        self.write_json(MANIFEST_FILE, &manifest)?;

        tracing::info!(
            dir = %self.dir.display(),
            run_id = %manifest.run_id,
            fingerprint = %manifest.fingerprint,
            "artifact set saved"
        );
        Ok(manifest)
    }

    /// Read the manifest alone.
    pub fn manifest(&self) -> PipelineResult<ArtifactManifest> {
        if !self.exists() {
            return Err(PipelineError::NotTrained(format!(
                "no artifact manifest in {}",
                self.dir.display()
            )));
        }
        self.read_json(MANIFEST_FILE)
    }

    /// Load a matched artifact set into an inference context.
    pub fn load<C: Classifier>(&self) -> PipelineResult<InferenceContext<C>> {
        let manifest = self.manifest()?;

        let model: serde_json::Value =
            self.read_envelope(MODEL_FILE, "model", &manifest.fingerprint)?;
        let normalizer: Normalizer =
            self.read_envelope(NORMALIZER_FILE, "normalizer", &manifest.fingerprint)?;
        let encoder: LabelEncoder =
            self.read_envelope(LABELS_FILE, "labels", &manifest.fingerprint)?;

        normalizer.validate()?;
        encoder.validate()?;

        // Recompute to catch payloads edited after the run
        let recomputed =
            compute_fingerprint(&manifest.run_id, manifest.window_len, &normalizer, &encoder)?;
        if recomputed != manifest.fingerprint {
            return Err(PipelineError::ArtifactMismatch {
                artifact: "manifest",
                expected: manifest.fingerprint,
                found: recomputed,
            });
        }
        let model_digest = payload_digest(&model)?;
        if model_digest != manifest.model_digest {
            return Err(PipelineError::ArtifactMismatch {
                artifact: "model",
                expected: manifest.model_digest,
                found: model_digest,
            });
        }
        let model: C = serde_json::from_value(model)?;

        if encoder.classes() != manifest.classes.as_slice() {
            return Err(PipelineError::ArtifactMismatch {
                artifact: "labels",
                expected: manifest.classes.join(","),
                found: encoder.classes().join(","),
            });
        }

        let context = InferenceContext::new(
            model,
            normalizer,
            encoder,
            manifest.window_len,
            manifest.fingerprint,
        )?;
        tracing::info!(dir = %self.dir.display(), classes = context.encoder().num_classes(), "artifact set loaded");
        Ok(context)
    }

    fn write_envelope<T: Serialize>(
        &self,
        file: &str,
        fingerprint: &str,
        payload: &T,
    ) -> PipelineResult<()> {
        self.write_json(
            file,
            &Envelope {
                fingerprint: fingerprint.to_string(),
                payload,
            },
        )
    }

    fn read_envelope<T: DeserializeOwned>(
        &self,
        file: &str,
        artifact: &'static str,
        expected: &str,
    ) -> PipelineResult<T> {
        let envelope: Envelope<T> = self.read_json(file)?;
        if envelope.fingerprint != expected {
            return Err(PipelineError::ArtifactMismatch {
                artifact,
                expected: expected.to_string(),
                found: envelope.fingerprint,
            });
        }
        Ok(envelope.payload)
    }

    fn write_json<T: Serialize>(&self, file: &str, value: &T) -> PipelineResult<()> {
        let path = self.dir.join(file);
        let json = serde_json::to_string(value)?;
        std::fs::write(&path, json).map_err(|e| PipelineError::io(&path, e))
    }

    fn read_json<T: DeserializeOwned>(&self, file: &str) -> PipelineResult<T> {
        let path = self.dir.join(file);
        if !path.exists() {
            return Err(PipelineError::NotTrained(format!(
                "artifact {} is missing",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(&path).map_err(|e| PipelineError::io(&path, e))?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_depends_on_inputs() {
        let run = Uuid::new_v4();
        let normalizer = Normalizer::from_parts(vec![0.0; 4], vec![1.0; 4]).unwrap();
        let encoder = LabelEncoder::fit(["a", "b"]);

        let a = compute_fingerprint(&run, 1, &normalizer, &encoder).unwrap();
        let b = compute_fingerprint(&run, 1, &normalizer, &encoder).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let other_run = compute_fingerprint(&Uuid::new_v4(), 1, &normalizer, &encoder).unwrap();
        assert_ne!(a, other_run);

        let other_labels =
            compute_fingerprint(&run, 1, &normalizer, &LabelEncoder::fit(["a", "c"])).unwrap();
        assert_ne!(a, other_labels);
    }

    #[test]
    fn test_payload_digest_survives_disk_roundtrip() {
        let model = serde_json::json!({ "trees": [{ "split": 0.1 + 0.2, "depth": 3 }] });
        let text = serde_json::to_string(&model).unwrap();
        let reread: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(payload_digest(&model).unwrap(), payload_digest(&reread).unwrap());

        let other = serde_json::json!({ "trees": [{ "split": 0.3, "depth": 3 }] });
        assert_ne!(payload_digest(&model).unwrap(), payload_digest(&other).unwrap());
    }

    #[test]
    fn test_missing_store_is_not_trained() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("absent"));
        assert!(!store.exists());
        assert!(matches!(store.manifest(), Err(PipelineError::NotTrained(_))));
        assert!(matches!(
            store.load::<crate::model::RandomForest>(),
            Err(PipelineError::NotTrained(_))
        ));
    }
}
