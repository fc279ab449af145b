//! Stratified train/test split
//!
//! Each class's row indices are shuffled with a seeded ChaCha RNG and the
//! first `round(n_class × test_fraction)` go to test. Both subsets keep the
//! original row order, so the partition depends only on the seed and input.

use churn_core::{positive_rate, ChurnError, EncodedDataset, Result, SplitConfig};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

/// One side of a partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Subset {
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<u8>,
    /// Row indices in the encoded dataset
    pub indices: Vec<usize>,
}

impl Subset {
    fn gather(dataset: &EncodedDataset, indices: Vec<usize>) -> Self {
        Self {
            rows: indices.iter().map(|&i| dataset.rows[i].clone()).collect(),
            labels: indices.iter().map(|&i| dataset.labels[i]).collect(),
            indices,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn positive_rate(&self) -> f64 {
        positive_rate(&self.labels)
    }
}

/// Disjoint, exhaustive train/test partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub train: Subset,
    pub test: Subset,
}

pub fn stratified_split(dataset: &EncodedDataset, config: &SplitConfig) -> Result<Partition> {
    let fraction = config.test_fraction;
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(ChurnError::Config(format!(
            "test fraction must be in (0, 1), got {fraction}"
        )));
    }
    if dataset.is_empty() {
        return Err(ChurnError::data_integrity("split", "no rows to split"));
    }

    let mut class0: Vec<usize> = Vec::new();
    let mut class1: Vec<usize> = Vec::new();
    for (i, &label) in dataset.labels.iter().enumerate() {
        if label == 0 {
            class0.push(i);
        } else {
            class1.push(i);
        }
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    class0.shuffle(&mut rng);
    class1.shuffle(&mut rng);

    let test0 = (class0.len() as f64 * fraction).round() as usize;
    let test1 = (class1.len() as f64 * fraction).round() as usize;

    let mut test: Vec<usize> = class0[..test0]
        .iter()
        .chain(class1[..test1].iter())
        .copied()
        .collect();
    let mut train: Vec<usize> = class0[test0..]
        .iter()
        .chain(class1[test1..].iter())
        .copied()
        .collect();
    test.sort_unstable();
    train.sort_unstable();

    if train.is_empty() || test.is_empty() {
        return Err(ChurnError::data_integrity(
            "split",
            format!(
                "{} rows cannot be split into non-empty subsets at fraction {fraction}",
                dataset.len()
            ),
        ));
    }

    let partition = Partition {
        train: Subset::gather(dataset, train),
        test: Subset::gather(dataset, test),
    };
    info!(
        train = partition.train.len(),
        test = partition.test.len(),
        "Positive churn rate: train {:.3}, test {:.3}",
        partition.train.positive_rate(),
        partition.test.positive_rate()
    );
    Ok(partition)
}
