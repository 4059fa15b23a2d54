//! Persistent pipeline counters.

use crate::error::{PipelineError, PipelineResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for the current session, optionally carried over from disk.
#[derive(Debug)]
pub struct RunLog {
    /// CSV rows accepted by the loader
    rows_loaded: AtomicU64,
    /// Samples assembled from those rows
    samples_loaded: AtomicU64,
    /// Samples too short for one window
    samples_dropped: AtomicU64,
    /// Windows cut before augmentation
    windows_emitted: AtomicU64,
    training_runs: AtomicU64,
    evaluations: AtomicU64,
    predictions_served: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl RunLog {
    pub fn new() -> Self {
        Self {
            rows_loaded: AtomicU64::new(0),
            samples_loaded: AtomicU64::new(0),
            samples_dropped: AtomicU64::new(0),
            windows_emitted: AtomicU64::new(0),
            training_runs: AtomicU64::new(0),
            evaluations: AtomicU64::new(0),
            predictions_served: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log backed by a JSON file, resuming its counters if present.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!(error = %e, "could not load previous run log");
        }

        log
    }

    /// Record a completed load.
    pub fn record_load(&self, rows: u64, samples: u64) {
        self.rows_loaded.fetch_add(rows, Ordering::Relaxed);
        self.samples_loaded.fetch_add(samples, Ordering::Relaxed);
    }

    /// Record the result of segmentation.
    pub fn record_segmentation(&self, windows: u64, dropped: u64) {
        self.windows_emitted.fetch_add(windows, Ordering::Relaxed);
        self.samples_dropped.fetch_add(dropped, Ordering::Relaxed);
    }

    pub fn record_training_run(&self) {
        self.training_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evaluation(&self) {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_prediction(&self) {
        self.predictions_served.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counter values.
    pub fn stats(&self) -> RunStats {
        RunStats {
            rows_loaded: self.rows_loaded.load(Ordering::Relaxed),
            samples_loaded: self.samples_loaded.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            windows_emitted: self.windows_emitted.load(Ordering::Relaxed),
            training_runs: self.training_runs.load(Ordering::Relaxed),
            evaluations: self.evaluations.load(Ordering::Relaxed),
            predictions_served: self.predictions_served.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Human-readable summary.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Pipeline Statistics:\n\
             - Rows loaded: {}\n\
             - Samples loaded: {}\n\
             - Samples dropped (too short): {}\n\
             - Windows emitted: {}\n\
             - Training runs: {}\n\
             - Evaluations: {}\n\
             - Predictions served: {}\n\
             - Session duration: {} seconds",
            stats.rows_loaded,
            stats.samples_loaded,
            stats.samples_dropped,
            stats.windows_emitted,
            stats.training_runs,
            stats.evaluations,
            stats.predictions_served,
            stats.session_duration_secs
        )
    }

    /// Write counters to the persistence file, if one is configured.
    pub fn save(&self) -> PipelineResult<()> {
        let Some(ref path) = self.persist_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }

        let stats = self.stats();
        let persisted = PersistedStats {
            rows_loaded: stats.rows_loaded,
            samples_loaded: stats.samples_loaded,
            samples_dropped: stats.samples_dropped,
            windows_emitted: stats.windows_emitted,
            training_runs: stats.training_runs,
            evaluations: stats.evaluations,
            predictions_served: stats.predictions_served,
            last_updated: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&persisted)?;
        std::fs::write(path, json).map_err(|e| PipelineError::io(path, e))
    }

    fn load(&mut self) -> PipelineResult<()> {
        let Some(ref path) = self.persist_path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let persisted: PersistedStats = serde_json::from_str(&content)?;

        self.rows_loaded.store(persisted.rows_loaded, Ordering::Relaxed);
        self.samples_loaded.store(persisted.samples_loaded, Ordering::Relaxed);
        self.samples_dropped.store(persisted.samples_dropped, Ordering::Relaxed);
        self.windows_emitted.store(persisted.windows_emitted, Ordering::Relaxed);
        self.training_runs.store(persisted.training_runs, Ordering::Relaxed);
        self.evaluations.store(persisted.evaluations, Ordering::Relaxed);
        self.predictions_served
            .store(persisted.predictions_served, Ordering::Relaxed);
        Ok(())
    }

    /// Zero every counter.
    pub fn reset(&self) {
        for counter in [
            &self.rows_loaded,
            &self.samples_loaded,
            &self.samples_dropped,
            &self.windows_emitted,
            &self.training_runs,
            &self.evaluations,
            &self.predictions_served,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub rows_loaded: u64,
    pub samples_loaded: u64,
    pub samples_dropped: u64,
    pub windows_emitted: u64,
    pub training_runs: u64,
    pub evaluations: u64,
    pub predictions_served: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    #[serde(default)]
    rows_loaded: u64,
    #[serde(default)]
    samples_loaded: u64,
    #[serde(default)]
    samples_dropped: u64,
    #[serde(default)]
    windows_emitted: u64,
    #[serde(default)]
    training_runs: u64,
    #[serde(default)]
    evaluations: u64,
    #[serde(default)]
    predictions_served: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared run log.
pub type SharedRunLog = Arc<RunLog>;

pub fn create_shared_log() -> SharedRunLog {
    Arc::new(RunLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedRunLog {
    Arc::new(RunLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_log_counting() {
        let log = RunLog::new();
        log.record_load(120, 3);
        log.record_segmentation(40, 1);
        log.record_training_run();
        log.record_prediction();
        log.record_prediction();

        let stats = log.stats();
        assert_eq!(stats.rows_loaded, 120);
        assert_eq!(stats.samples_loaded, 3);
        assert_eq!(stats.windows_emitted, 40);
        assert_eq!(stats.samples_dropped, 1);
        assert_eq!(stats.training_runs, 1);
        assert_eq!(stats.evaluations, 0);
        assert_eq!(stats.predictions_served, 2);
    }

    #[test]
    fn test_run_log_reset() {
        let log = RunLog::new();
        log.record_load(10, 1);
        log.record_evaluation();
        log.reset();

        let stats = log.stats();
        assert_eq!(stats.rows_loaded, 0);
        assert_eq!(stats.evaluations, 0);
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("run_log.json");

        let log = RunLog::with_persistence(path.clone());
        log.record_load(7, 2);
        log.record_training_run();
        log.save().unwrap();

        let resumed = RunLog::with_persistence(path);
        let stats = resumed.stats();
        assert_eq!(stats.rows_loaded, 7);
        assert_eq!(stats.samples_loaded, 2);
        assert_eq!(stats.training_runs, 1);
    }

    #[test]
    fn test_unreadable_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_log.json");
        std::fs::write(&path, "not json").unwrap();

        let log = RunLog::with_persistence(path);
        assert_eq!(log.stats().rows_loaded, 0);
    }

    #[test]
    fn test_summary_format() {
        let summary = RunLog::new().summary();
        assert!(summary.contains("Rows loaded"));
        assert!(summary.contains("Predictions served"));
    }
}
