//! Random train/test partition of sample rows

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::rng::RMersenneTwister;

/// Row partition, both sides sorted ascending
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl TrainTestSplit {
    /// Draw `round(n * train_fraction)` training rows without replacement;
    /// the rest are held out
    pub fn random(n: usize, train_fraction: f64, rng: &mut RMersenneTwister) -> Result<Self> {
        if !(train_fraction > 0.0 && train_fraction < 1.0) {
            return Err(PipelineError::InvalidInput {
                reason: format!("train_fraction must be in (0, 1), got {}", train_fraction),
            });
        }
        let n_train = (n as f64 * train_fraction).round() as usize;
        if n_train == 0 || n_train >= n {
            return Err(PipelineError::InvalidInput {
                reason: format!(
                    "train_fraction {} of {} samples leaves an empty train or test set",
                    train_fraction, n
                ),
            });
        }

        let mut train = rng.sample_without_replacement(n, n_train);
        train.sort_unstable();

        let mut in_train = vec![false; n];
        for &i in &train {
            in_train[i] = true;
        }
        let test = (0..n).filter(|&i| !in_train[i]).collect();

        Ok(Self { train, test })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes() {
        let mut rng = RMersenneTwister::new(1);
        let split = TrainTestSplit::random(40, 0.7, &mut rng).unwrap();
        assert_eq!(split.train.len(), 28);
        assert_eq!(split.test.len(), 12);

        let mut all: Vec<usize> = split.train.iter().chain(split.test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..40).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_reproducible() {
        let a = TrainTestSplit::random(50, 0.7, &mut RMersenneTwister::new(9)).unwrap();
        let b = TrainTestSplit::random(50, 0.7, &mut RMersenneTwister::new(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_split_rejects_bad_fraction() {
        let mut rng = RMersenneTwister::new(1);
        assert!(TrainTestSplit::random(10, 1.0, &mut rng).is_err());
        assert!(TrainTestSplit::random(1, 0.7, &mut rng).is_err());
    }
}
