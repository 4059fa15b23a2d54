//! Label encoding.
//!
//! Maps the distinct label strings of a training corpus onto `0..num_classes`
//! in sorted order. The encoding is fitted once and frozen; unknown labels are
//! rejected rather than mapped to a default class.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

/// Bijection between label strings and dense class indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    /// Sorted, unique labels; a label's position is its class index
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Build an encoding from every label in `labels`.
    pub fn fit<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classes: Vec<String> = labels.into_iter().map(|l| l.as_ref().to_string()).collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    /// Rebuild an encoding from a stored class list, checking it is sorted and unique.
    pub fn from_classes(classes: Vec<String>) -> PipelineResult<Self> {
        let encoder = Self { classes };
        encoder.validate()?;
        Ok(encoder)
    }

    /// Check the class list is strictly increasing.
    pub fn validate(&self) -> PipelineResult<()> {
        if let Some(pair) = self.classes.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(PipelineError::schema(format!(
                "label encoding is not sorted and unique near `{}` / `{}`",
                pair[0], pair[1]
            )));
        }
        Ok(())
    }

    /// Class index of `label`.
    pub fn encode(&self, label: &str) -> PipelineResult<u32> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map(|index| index as u32)
            .map_err(|_| PipelineError::UnseenLabel {
                label: label.to_string(),
            })
    }

    /// Encode a sequence of labels, failing on the first unknown one.
    pub fn encode_all<I, S>(&self, labels: I) -> PipelineResult<Vec<u32>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        labels.into_iter().map(|l| self.encode(l.as_ref())).collect()
    }

    /// Label of class `index`.
    pub fn decode(&self, index: u32) -> PipelineResult<&str> {
        self.classes
            .get(index as usize)
            .map(String::as_str)
            .ok_or(PipelineError::UnknownClassIndex {
                index,
                num_classes: self.classes.len(),
            })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_sorts_and_dedups() {
        let encoder = LabelEncoder::fit(["walk", "sit", "walk", "fall", "sit"]);
        assert_eq!(encoder.classes(), &["fall", "sit", "walk"]);
        assert_eq!(encoder.num_classes(), 3);
    }

    #[test]
    fn test_encode_decode() {
        let encoder = LabelEncoder::fit(vec!["b".to_string(), "a".to_string()]);
        assert_eq!(encoder.encode("a").unwrap(), 0);
        assert_eq!(encoder.encode("b").unwrap(), 1);
        assert_eq!(encoder.decode(1).unwrap(), "b");
        assert_eq!(encoder.encode_all(["b", "a", "b"]).unwrap(), vec![1, 0, 1]);
    }

    #[test]
    fn test_unseen_label_rejected() {
        let encoder = LabelEncoder::fit(["standing", "walking"]);
        match encoder.encode("running") {
            Err(PipelineError::UnseenLabel { label }) => assert_eq!(label, "running"),
            other => panic!("expected UnseenLabel, got {other:?}"),
        }
        assert!(encoder.encode_all(["standing", "jumping"]).is_err());
    }

    #[test]
    fn test_unknown_index_rejected() {
        let encoder = LabelEncoder::fit(["a"]);
        assert!(matches!(
            encoder.decode(3),
            Err(PipelineError::UnknownClassIndex { index: 3, num_classes: 1 })
        ));
    }

    #[test]
    fn test_from_classes_validates() {
        assert!(LabelEncoder::from_classes(vec!["a".into(), "b".into()]).is_ok());
        assert!(LabelEncoder::from_classes(vec!["b".into(), "a".into()]).is_err());
        assert!(LabelEncoder::from_classes(vec!["a".into(), "a".into()]).is_err());
    }
}
