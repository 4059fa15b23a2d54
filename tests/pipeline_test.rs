//! End-to-end tests for the training pipeline and artifact sets

use csi_motion_classifier::core::{augment, LabelEncoder, Windower};
use csi_motion_classifier::{
    evaluate, predict_position, train, ArtifactStore, Config, CsiFeatures, InferenceContext,
    PipelineError, PredictRequest, SampleLoader,
};
use std::fmt::Write as _;
use std::path::Path;

/// Two well separated postures, `n` samples each.
fn recording_csv(samples_per_label: usize, readings: usize) -> String {
    let mut csv = String::from(
        "sample_id,timestamp,amplitude_mean,amplitude_std,phase_mean,phase_std,label\n",
    );
    let postures = [("sitting", 5.0, 0.4, -1.0, 0.05), ("walking", 15.0, 2.5, 1.0, 0.6)];
    let mut id = 0;
    for (label, amp, amp_std, phase, phase_std) in postures {
        for _ in 0..samples_per_label {
            id += 1;
            for t in 0..readings {
                let wobble = ((t * 7 + id * 3) as f64).sin() * 0.1;
                writeln!(
                    csv,
                    "{id},{t},{},{},{},{},{label}",
                    amp + wobble,
                    amp_std + wobble / 2.0,
                    phase - wobble,
                    phase_std + wobble / 10.0
                )
                .unwrap();
            }
        }
    }
    csv
}

fn small_config(artifacts: &Path) -> Config {
    let mut config = Config::default();
    config.training.n_trees = 25;
    config.artifacts_path = artifacts.to_path_buf();
    config
}

#[test]
fn test_two_samples_yield_expected_window_counts() {
    let csv = recording_csv(1, 20).replace("sitting", "A").replace("walking", "B");
    let samples = SampleLoader::new().load_reader(csv.as_bytes()).unwrap();
    assert_eq!(samples.len(), 2);

    let encoder = LabelEncoder::fit(samples.iter().map(|s| s.label.as_str()));
    let segmentation = Windower::new(10, 2).unwrap().segment(&samples, &encoder).unwrap();
    assert_eq!(segmentation.windows.len(), 12);
    assert_eq!(segmentation.windows.class_counts(2), vec![6, 6]);

    let augmented = augment(segmentation.windows, 0.02, 42).unwrap();
    assert_eq!(augmented.len(), 24);
    assert_eq!(augmented.class_counts(2), vec![12, 12]);
    for i in 0..12 {
        assert_eq!(augmented.labels()[i], augmented.labels()[i + 12]);
    }
}

#[test]
fn test_loading_and_windowing_is_deterministic() {
    let csv = recording_csv(2, 23);
    let loader = SampleLoader::new();
    let a = loader.load_reader(csv.as_bytes()).unwrap();
    let b = loader.load_reader(csv.as_bytes()).unwrap();
    assert_eq!(a, b);

    let encoder = LabelEncoder::fit(a.iter().map(|s| s.label.as_str()));
    let windower = Windower::new(10, 2).unwrap();
    assert_eq!(
        windower.segment(&a, &encoder).unwrap().windows,
        windower.segment(&b, &encoder).unwrap().windows
    );
}

#[test]
fn test_train_save_load_predict() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(&dir.path().join("artifacts"));
    let samples = SampleLoader::new()
        .load_reader(recording_csv(3, 30).as_bytes())
        .unwrap();

    let outcome = train(&samples, &config).unwrap();
    assert!(outcome.report.accuracy > 0.95, "{}", outcome.report);
    assert_eq!(outcome.context.encoder().classes(), ["sitting", "walking"]);

    let store = ArtifactStore::new(&config.artifacts_path);
    let manifest = store.save(&outcome.context, outcome.run_id).unwrap();
    assert_eq!(manifest.run_id, outcome.run_id);
    assert_eq!(manifest.window_len, 10);
    assert_eq!(manifest.n_features, 40);
    assert_eq!(manifest.fingerprint, outcome.context.fingerprint());
    assert_eq!(manifest.model_digest.len(), 64);

    let loaded: InferenceContext = store.load().unwrap();
    assert_eq!(loaded.normalizer(), outcome.context.normalizer());
    assert_eq!(loaded.encoder(), outcome.context.encoder());

    let sitting = CsiFeatures::new(5.0, 0.4, -1.0, 0.05);
    let walking = CsiFeatures::new(15.0, 2.5, 1.0, 0.6);
    assert_eq!(loaded.predict(&sitting).unwrap(), "sitting");
    assert_eq!(loaded.predict(&walking).unwrap(), "walking");

    // Same inputs, same artifacts, same answer
    for _ in 0..3 {
        assert_eq!(
            loaded.predict(&walking).unwrap(),
            outcome.context.predict(&walking).unwrap()
        );
    }

    let response =
        predict_position(Some(&loaded), &PredictRequest::new(5.0, 0.4, -1.0, 0.05)).unwrap();
    assert_eq!(response.label, "sitting");
}

#[test]
fn test_tampered_envelope_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());
    let samples = SampleLoader::new()
        .load_reader(recording_csv(2, 20).as_bytes())
        .unwrap();
    let outcome = train(&samples, &config).unwrap();
    let store = ArtifactStore::new(dir.path());
    store.save(&outcome.context, outcome.run_id).unwrap();

    let path = dir.path().join("normalizer.json");
    let mut envelope: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    envelope["fingerprint"] = serde_json::Value::String("0".repeat(64));
    std::fs::write(&path, envelope.to_string()).unwrap();

    assert!(matches!(
        store.load::<csi_motion_classifier::RandomForest>(),
        Err(PipelineError::ArtifactMismatch { artifact: "normalizer", .. })
    ));
}

#[test]
fn test_edited_payload_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());
    let samples = SampleLoader::new()
        .load_reader(recording_csv(2, 20).as_bytes())
        .unwrap();
    let outcome = train(&samples, &config).unwrap();
    let store = ArtifactStore::new(dir.path());
    store.save(&outcome.context, outcome.run_id).unwrap();

    let path = dir.path().join("normalizer.json");
    let mut envelope: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    envelope["payload"]["means"][0] = serde_json::json!(123.0);
    std::fs::write(&path, envelope.to_string()).unwrap();

    assert!(matches!(
        store.load::<csi_motion_classifier::RandomForest>(),
        Err(PipelineError::ArtifactMismatch { .. })
    ));
}

#[test]
fn test_model_payload_from_another_run_is_rejected() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();

    // Same labels, opposite signal levels
    let csv = recording_csv(2, 20);
    let inverted = csv
        .replace("sitting", "tmp")
        .replace("walking", "sitting")
        .replace("tmp", "walking");
    for (dir, csv) in [(first.path(), &csv), (second.path(), &inverted)] {
        let samples = SampleLoader::new().load_reader(csv.as_bytes()).unwrap();
        let outcome = train(&samples, &small_config(dir)).unwrap();
        ArtifactStore::new(dir)
            .save(&outcome.context, outcome.run_id)
            .unwrap();
    }

    // Keep the first run's envelope, swap in the second run's model
    let read = |path: &Path| -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    };
    let target = first.path().join("model.json");
    let mut envelope = read(&target);
    envelope["payload"] = read(&second.path().join("model.json"))["payload"].clone();
    std::fs::write(&target, envelope.to_string()).unwrap();

    assert!(matches!(
        ArtifactStore::new(first.path()).load::<csi_motion_classifier::RandomForest>(),
        Err(PipelineError::ArtifactMismatch { artifact: "model", .. })
    ));
}

#[test]
fn test_artifacts_from_different_runs_are_not_mixed() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let samples = SampleLoader::new()
        .load_reader(recording_csv(2, 20).as_bytes())
        .unwrap();

    for dir in [first.path(), second.path()] {
        let outcome = train(&samples, &small_config(dir)).unwrap();
        ArtifactStore::new(dir)
            .save(&outcome.context, outcome.run_id)
            .unwrap();
    }

    std::fs::copy(second.path().join("model.json"), first.path().join("model.json")).unwrap();
    assert!(matches!(
        ArtifactStore::new(first.path()).load::<csi_motion_classifier::RandomForest>(),
        Err(PipelineError::ArtifactMismatch { artifact: "model", .. })
    ));
}

#[test]
fn test_missing_artifacts_are_not_trained() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path().join("nothing-here"));
    let loaded = store.load::<csi_motion_classifier::RandomForest>();
    assert!(matches!(loaded, Err(PipelineError::NotTrained(_))));

    let request = PredictRequest::new(1.0, 1.0, 1.0, 1.0);
    assert!(matches!(
        predict_position::<csi_motion_classifier::RandomForest>(None, &request),
        Err(PipelineError::NotTrained(_))
    ));
}

#[test]
fn test_evaluate_on_new_recordings() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());
    let samples = SampleLoader::new()
        .load_reader(recording_csv(3, 24).as_bytes())
        .unwrap();
    let outcome = train(&samples, &config).unwrap();

    let held_out = SampleLoader::new()
        .load_reader(recording_csv(1, 16).as_bytes())
        .unwrap();
    let evaluation = evaluate(&outcome.context, &held_out, &config.windowing).unwrap();
    // 16 readings -> 4 windows per sample, no jittered copies
    assert_eq!(evaluation.windows, 8);
    assert_eq!(evaluation.report.total, 8);

    let unseen = recording_csv(1, 16).replace("walking", "running");
    let unseen = SampleLoader::new().load_reader(unseen.as_bytes()).unwrap();
    assert!(matches!(
        evaluate(&outcome.context, &unseen, &config.windowing),
        Err(PipelineError::UnseenLabel { .. })
    ));
}

#[test]
fn test_inconsistent_labels_abort_loading() {
    let csv = "sample_id,timestamp,amplitude_mean,amplitude_std,phase_mean,phase_std,label\n\
               1,0,1,1,1,1,sitting\n\
               1,1,1,1,1,1,walking\n";
    assert!(matches!(
        SampleLoader::new().load_reader(csv.as_bytes()),
        Err(PipelineError::InconsistentLabel { .. })
    ));
}
