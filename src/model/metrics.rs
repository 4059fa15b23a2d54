//! Classification metrics.
//!
//! Accuracy, per-class precision/recall/F1 with support, macro and weighted
//! averages, and a confusion count table (true classes as rows, predicted
//! classes as columns). Undefined ratios (0/0) are reported as 0.

use crate::core::labels::LabelEncoder;
use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Confusion counts between true and predicted classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<String>,
    /// `counts[true][predicted]`
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Count for one cell, `None` when either class index is out of range.
    pub fn get(&self, truth: usize, predicted: usize) -> Option<usize> {
        self.counts.get(truth)?.get(predicted).copied()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }
}

/// Metrics for one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Averaged precision/recall/F1.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AveragedMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Full evaluation of a set of predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub accuracy: f64,
    pub per_class: Vec<ClassMetrics>,
    pub macro_avg: AveragedMetrics,
    pub weighted_avg: AveragedMetrics,
    pub confusion: ConfusionMatrix,
    /// Number of evaluated rows
    pub total: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl ClassificationReport {
    /// Compare `predicted` against `truth`, naming classes through `encoder`.
    pub fn evaluate(
        truth: &[u32],
        predicted: &[u32],
        encoder: &LabelEncoder,
    ) -> PipelineResult<Self> {
        if truth.len() != predicted.len() {
            return Err(PipelineError::shape_mismatch(
                "evaluation predictions",
                truth.len(),
                predicted.len(),
            ));
        }
        if truth.is_empty() {
            return Err(PipelineError::EmptyDataset("nothing to evaluate".into()));
        }

        let k = encoder.num_classes();
        let mut counts = vec![vec![0usize; k]; k];
        for (&t, &p) in truth.iter().zip(predicted) {
            // decode validates both indices
            encoder.decode(t)?;
            encoder.decode(p)?;
            counts[t as usize][p as usize] += 1;
        }

        let total = truth.len();
        let correct: usize = (0..k).map(|i| counts[i][i]).sum();

        let per_class: Vec<ClassMetrics> = (0..k)
            .map(|i| {
                let tp = counts[i][i];
                let support: usize = counts[i].iter().sum();
                let predicted_as: usize = counts.iter().map(|row| row[i]).sum();
                let precision = ratio(tp, predicted_as);
                let recall = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label: encoder.classes()[i].clone(),
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        let macro_avg = if k == 0 {
            AveragedMetrics::default()
        } else {
            AveragedMetrics {
                precision: per_class.iter().map(|c| c.precision).sum::<f64>() / k as f64,
                recall: per_class.iter().map(|c| c.recall).sum::<f64>() / k as f64,
                f1: per_class.iter().map(|c| c.f1).sum::<f64>() / k as f64,
            }
        };

        let weighted = |f: fn(&ClassMetrics) -> f64| {
            per_class
                .iter()
                .map(|c| f(c) * c.support as f64)
                .sum::<f64>()
                / total as f64
        };
        let weighted_avg = AveragedMetrics {
            precision: weighted(|c| c.precision),
            recall: weighted(|c| c.recall),
            f1: weighted(|c| c.f1),
        };

        Ok(Self {
            accuracy: ratio(correct, total),
            per_class,
            macro_avg,
            weighted_avg,
            confusion: ConfusionMatrix {
                labels: encoder.classes().to_vec(),
                counts,
            },
            total,
        })
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name_width = self
            .per_class
            .iter()
            .map(|c| c.label.len())
            .chain(["weighted avg".len()])
            .max()
            .unwrap_or(0);

        writeln!(f, "Accuracy: {:.2}", self.accuracy)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:>w$}  {:>9}  {:>9}  {:>9}  {:>9}",
            "",
            "precision",
            "recall",
            "f1-score",
            "support",
            w = name_width
        )?;
        writeln!(f)?;
        for c in &self.per_class {
            writeln!(
                f,
                "{:>w$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>9}",
                c.label,
                c.precision,
                c.recall,
                c.f1,
                c.support,
                w = name_width
            )?;
        }
        writeln!(f)?;
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>w$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>9}",
                name,
                avg.precision,
                avg.recall,
                avg.f1,
                self.total,
                w = name_width
            )?;
        }

        writeln!(f)?;
        writeln!(f, "Confusion matrix (rows: true, columns: predicted)")?;
        let cell = self
            .confusion
            .labels
            .iter()
            .map(String::len)
            .chain(self.confusion.counts.iter().flatten().map(|n| n.to_string().len()))
            .max()
            .unwrap_or(1);
        write!(f, "{:>w$}", "", w = name_width)?;
        for label in &self.confusion.labels {
            write!(f, "  {:>cell$}", label)?;
        }
        writeln!(f)?;
        for (label, row) in self.confusion.labels.iter().zip(&self.confusion.counts) {
            write!(f, "{:>w$}", label, w = name_width)?;
            for n in row {
                write!(f, "  {:>cell$}", n)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
