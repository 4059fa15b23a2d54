//! CSV loader for labeled CSI readings.
//!
//! Rows are grouped by `sample_id`, each group is sorted by timestamp (stable
//! for equal timestamps), and every group must carry a single label.

use crate::data::types::{CsiFeatures, Reading, Sample, SampleId, FEATURE_COLUMNS};
use crate::error::{PipelineError, PipelineResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Columns every input table must provide.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "sample_id",
    "timestamp",
    "amplitude_mean",
    "amplitude_std",
    "phase_mean",
    "phase_std",
    "label",
];

/// Reads CSI tables into samples.
#[derive(Debug, Clone)]
pub struct SampleLoader {
    delimiter: u8,
}

impl Default for SampleLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Positions of the required columns in the header.
struct ColumnIndex {
    sample_id: usize,
    timestamp: usize,
    features: [usize; 4],
    label: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &csv::StringRecord) -> PipelineResult<Self> {
        let find = |name: &str| headers.iter().position(|h| h == name);

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|name| find(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::schema(format!(
                "missing required column(s): {}",
                missing.join(", ")
            )));
        }

        // All present, checked above
        let idx = |name: &str| find(name).unwrap_or_default();
        Ok(Self {
            sample_id: idx("sample_id"),
            timestamp: idx("timestamp"),
            features: [
                idx(FEATURE_COLUMNS[0]),
                idx(FEATURE_COLUMNS[1]),
                idx(FEATURE_COLUMNS[2]),
                idx(FEATURE_COLUMNS[3]),
            ],
            label: idx("label"),
        })
    }
}

/// Rows collected for one sample id before sorting.
struct Group {
    label: String,
    readings: Vec<Reading>,
}

impl SampleLoader {
    /// Create a loader for comma-separated input.
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    /// Use a different field delimiter (e.g. `b'\t'`).
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Load samples from a file.
    pub fn load_path<P: AsRef<Path>>(&self, path: P) -> PipelineResult<Vec<Sample>> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
        tracing::info!(path = %path.display(), "loading CSI samples");
        self.load_reader(file)
    }

    /// Load samples from any reader producing delimited text with a header row.
    pub fn load_reader<R: Read>(&self, reader: R) -> PipelineResult<Vec<Sample>> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns = ColumnIndex::from_headers(rdr.headers()?)?;

        let mut groups: BTreeMap<SampleId, Group> = BTreeMap::new();
        let mut row_count = 0usize;

        for result in rdr.records() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            row_count += 1;

            let field = |index: usize| record.get(index).unwrap_or("");

            let sample_id = field(columns.sample_id);
            if sample_id.is_empty() {
                return Err(PipelineError::schema_at(line, "empty `sample_id`"));
            }

            let label = field(columns.label);
            if label.is_empty() {
                return Err(PipelineError::schema_at(line, "empty `label`"));
            }

            let timestamp = parse_timestamp(field(columns.timestamp)).ok_or_else(|| {
                PipelineError::schema_at(
                    line,
                    format!(
                        "column `timestamp` is neither a number nor a date-time: `{}`",
                        field(columns.timestamp)
                    ),
                )
            })?;

            let mut values = [0.0; 4];
            for (slot, (&index, name)) in values
                .iter_mut()
                .zip(columns.features.iter().zip(FEATURE_COLUMNS))
            {
                let raw = field(index);
                let value: f64 = raw.parse().map_err(|_| {
                    PipelineError::schema_at(line, format!("column `{name}` is not numeric: `{raw}`"))
                })?;
                if !value.is_finite() {
                    return Err(PipelineError::schema_at(
                        line,
                        format!("column `{name}` is not finite: `{raw}`"),
                    ));
                }
                *slot = value;
            }

            let reading = Reading {
                timestamp,
                features: CsiFeatures::from_array(values),
            };

            match groups.get_mut(&SampleId::from(sample_id)) {
                Some(group) => {
                    if group.label != label {
                        return Err(PipelineError::InconsistentLabel {
                            sample_id: sample_id.to_string(),
                            expected: group.label.clone(),
                            found: label.to_string(),
                            row: line,
                        });
                    }
                    group.readings.push(reading);
                }
                None => {
                    groups.insert(
                        SampleId::from(sample_id),
                        Group {
                            label: label.to_string(),
                            readings: vec![reading],
                        },
                    );
                }
            }
        }

        if row_count == 0 {
            return Err(PipelineError::EmptyDataset(
                "input has a header but no rows".to_string(),
            ));
        }

        let samples: Vec<Sample> = groups
            .into_iter()
            .map(|(id, mut group)| {
                // sort_by is stable, equal timestamps keep file order
                group
                    .readings
                    .sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
                tracing::debug!(sample_id = %id, readings = group.readings.len(), label = %group.label, "sample assembled");
                Sample {
                    id,
                    label: group.label,
                    readings: group.readings,
                }
            })
            .collect();

        tracing::info!(rows = row_count, samples = samples.len(), "CSI samples loaded");
        Ok(samples)
    }
}

/// Parse a timestamp cell into a sortable number of seconds.
///
/// Accepts plain numbers, RFC 3339, and `YYYY-MM-DD HH:MM:SS[.fff]`.
fn parse_timestamp(raw: &str) -> Option<f64> {
    if let Ok(value) = raw.parse::<f64>() {
        return value.is_finite().then_some(value);
    }

    let utc = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").map(|dt| dt.and_utc()))
        .ok()?;

    Some(utc.timestamp() as f64 + f64::from(utc.timestamp_subsec_nanos()) * 1e-9)
}

/// Counts describing a loaded dataset.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadSummary {
    /// Total readings across all samples
    pub rows: usize,
    /// Number of distinct sample ids
    pub samples: usize,
    /// Samples per label
    pub samples_per_label: BTreeMap<String, usize>,
    /// Shortest sample length
    pub min_len: usize,
    /// Longest sample length
    pub max_len: usize,
}

impl LoadSummary {
    pub fn of(samples: &[Sample]) -> Self {
        let mut samples_per_label = BTreeMap::new();
        for sample in samples {
            *samples_per_label.entry(sample.label.clone()).or_insert(0) += 1;
        }

        Self {
            rows: samples.iter().map(Sample::len).sum(),
            samples: samples.len(),
            samples_per_label,
            min_len: samples.iter().map(Sample::len).min().unwrap_or(0),
            max_len: samples.iter().map(Sample::len).max().unwrap_or(0),
        }
    }
}
