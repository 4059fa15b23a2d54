//! Stratified train/test splitting.

use crate::error::{PipelineError, PipelineResult};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Row indices of each partition, in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split row indices so every class keeps its proportion in both partitions.
///
/// Per class, `round(n * test_fraction)` rows go to the test partition, but at
/// least one row of each class stays in training and, when the class has two
/// or more rows, at least one goes to test.
pub fn stratified_split(
    labels: &[u32],
    test_fraction: f64,
    seed: u64,
) -> PipelineResult<SplitIndices> {
    if labels.is_empty() {
        return Err(PipelineError::EmptyDataset("no rows to split".into()));
    }

    let mut by_class: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (index, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(index);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for (class, mut indices) in by_class {
        let n = indices.len();
        if n < 2 {
            return Err(PipelineError::InsufficientClassMembers {
                class: class.to_string(),
                count: n,
            });
        }

        let n_test = ((n as f64 * test_fraction).round() as usize).clamp(1, n - 1);
        indices.shuffle(&mut rng);
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(SplitIndices { train, test })
}

/// Pick the rows at `indices`.
pub fn select<T: Clone>(items: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| items[i].clone()).collect()
}
