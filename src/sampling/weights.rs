//! Inverse-frequency class weights for weighted bootstrap sampling

use serde::{Deserialize, Serialize};

use crate::data::LabelSet;
use crate::error::{PipelineError, Result};

/// Per-class weights `1 - count(c) / total`.
///
/// Classes absent from the labels have no entry (`None`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassWeights {
    weights: Vec<Option<f64>>,
    counts: Vec<usize>,
    /// Class that makes up every sample, if any (its weight is 0)
    degenerate_class: Option<usize>,
}

impl ClassWeights {
    /// Compute weights from the class id of every training sample
    pub fn from_labels(labels: &[usize], label_set: &LabelSet) -> Self {
        let mut counts = vec![0usize; label_set.len()];
        for &c in labels {
            counts[c] += 1;
        }
        let total = labels.len() as f64;

        let weights: Vec<Option<f64>> = counts
            .iter()
            .map(|&n| (n > 0).then(|| 1.0 - n as f64 / total))
            .collect();

        let degenerate_class = counts.iter().position(|&n| n > 0 && n == labels.len());
        if let Some(c) = degenerate_class {
            log::warn!(
                "Class '{}' makes up all {} training samples; its weight is 0",
                label_set.label(c).unwrap_or_default(),
                labels.len()
            );
        }

        Self {
            weights,
            counts,
            degenerate_class,
        }
    }

    /// Weight of a class, `None` if the class has no samples
    pub fn weight(&self, class_id: usize) -> Option<f64> {
        self.weights.get(class_id).copied().flatten()
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn degenerate_class(&self) -> Option<usize> {
        self.degenerate_class
    }

    /// Fail with DegenerateWeight if one class holds every sample
    pub fn check(&self, label_set: &LabelSet) -> Result<()> {
        match self.degenerate_class {
            Some(c) => Err(PipelineError::DegenerateWeight {
                class: label_set.label(c).unwrap_or_default().to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Weight of every sample from its class
    pub fn sample_weights(&self, labels: &[usize]) -> Vec<f64> {
        labels
            .iter()
            .map(|&c| self.weight(c).unwrap_or(0.0))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label_set(n: usize) -> LabelSet {
        LabelSet::new((0..n).map(|i| format!("c{}", i)).collect()).unwrap()
    }

    #[test]
    fn test_weights_from_counts() {
        let mut labels = Vec::new();
        for (c, n) in [(0usize, 20usize), (1, 15), (2, 10), (3, 5)] {
            labels.extend(std::iter::repeat(c).take(n));
        }
        let weights = ClassWeights::from_labels(&labels, &label_set(4));
        let expected = [0.6, 0.7, 0.8, 0.9];
        for (c, &e) in expected.iter().enumerate() {
            assert!((weights.weight(c).unwrap() - e).abs() < 1e-12);
        }
        assert_eq!(weights.counts(), &[20, 15, 10, 5]);

        let per_sample = weights.sample_weights(&labels);
        assert_eq!(per_sample.len(), 50);
        assert!((per_sample[49] - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_absent_class_has_no_weight() {
        let weights = ClassWeights::from_labels(&[0, 0, 2], &label_set(3));
        assert!(weights.weight(1).is_none());
        assert!(weights.weight(0).unwrap() < weights.weight(2).unwrap());
    }

    #[test]
    fn test_balanced_weights_uniform() {
        let labels: Vec<usize> = (0..40).map(|i| i % 4).collect();
        let weights = ClassWeights::from_labels(&labels, &label_set(4));
        for c in 0..4 {
            assert!((weights.weight(c).unwrap() - 0.75).abs() < 1e-12);
        }
    }

    #[test]
    fn test_single_class_is_degenerate() {
        let set = label_set(2);
        let weights = ClassWeights::from_labels(&[1, 1, 1], &set);
        assert_eq!(weights.weight(1), Some(0.0));
        assert_eq!(weights.degenerate_class(), Some(1));
        let err = weights.check(&set).unwrap_err();
        assert!(err.to_string().contains("c1"));
    }
}
