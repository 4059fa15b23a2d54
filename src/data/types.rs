//! CSI reading and sample types.
//!
//! A reading is reduced to four statistics of one CSI frame: amplitude mean and
//! standard deviation, phase mean and standard deviation.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Number of features carried by one reading.
pub const FEATURE_COUNT: usize = 4;

/// Feature column names, in flattening order.
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] =
    ["amplitude_mean", "amplitude_std", "phase_mean", "phase_std"];

/// The four CSI statistics of one reading.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CsiFeatures {
    pub amplitude_mean: f64,
    pub amplitude_std: f64,
    pub phase_mean: f64,
    pub phase_std: f64,
}

impl CsiFeatures {
    pub fn new(amplitude_mean: f64, amplitude_std: f64, phase_mean: f64, phase_std: f64) -> Self {
        Self {
            amplitude_mean,
            amplitude_std,
            phase_mean,
            phase_std,
        }
    }

    /// Features in [`FEATURE_COLUMNS`] order.
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.amplitude_mean,
            self.amplitude_std,
            self.phase_mean,
            self.phase_std,
        ]
    }

    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }

    /// Name of the first non-finite feature, if any.
    pub fn first_non_finite(&self) -> Option<&'static str> {
        self.to_array()
            .iter()
            .zip(FEATURE_COLUMNS)
            .find(|(v, _)| !v.is_finite())
            .map(|(_, name)| name)
    }
}

/// A timestamped reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Sort key derived from the input timestamp
    pub timestamp: f64,
    pub features: CsiFeatures,
}

/// Identifier of a sample.
///
/// Ids that both parse as integers are ordered numerically, everything else
/// lexically, so `"2"` sorts before `"10"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleId(pub String);

impl SampleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for SampleId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.parse::<i64>(), other.0.parse::<i64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for SampleId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SampleId {
    fn from(s: &str) -> Self {
        SampleId(s.to_string())
    }
}

/// One labeled, time-ordered sequence of readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: SampleId,
    pub label: String,
    /// Readings in ascending timestamp order
    pub readings: Vec<Reading>,
}

impl Sample {
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_order() {
        let features = CsiFeatures::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(features.to_array(), [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(CsiFeatures::from_array([1.0, 2.0, 3.0, 4.0]), features);
    }

    #[test]
    fn test_first_non_finite() {
        assert_eq!(CsiFeatures::new(1.0, 2.0, 3.0, 4.0).first_non_finite(), None);
        assert_eq!(
            CsiFeatures::new(1.0, 2.0, f64::NAN, 4.0).first_non_finite(),
            Some("phase_mean")
        );
    }

    #[test]
    fn test_sample_id_ordering() {
        let mut ids: Vec<SampleId> = ["10", "b", "2", "a", "1"]
            .iter()
            .map(|s| SampleId::from(*s))
            .collect();
        ids.sort();
        let ordered: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(ordered, vec!["1", "2", "10", "a", "b"]);
    }
}
