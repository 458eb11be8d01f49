//! Sample metadata: class labels and batch identifiers

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::{PipelineError, Result};

/// Ordered, versioned set of class labels.
///
/// Class ids used throughout the crate are positions in this set, so the
/// set travels with every trained model and decoding never depends on the
/// order classes happened to appear in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSet {
    version: u32,
    labels: Vec<String>,
}

impl LabelSet {
    /// Current encoding version of serialized label sets
    pub const VERSION: u32 = 1;

    /// Create a label set in the given order
    pub fn new(labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            return Err(PipelineError::InvalidMetadata {
                reason: "label set must contain at least one class".to_string(),
            });
        }
        let mut seen = HashSet::new();
        for label in &labels {
            if !seen.insert(label.as_str()) {
                return Err(PipelineError::InvalidMetadata {
                    reason: format!("duplicate class label '{}' in label set", label),
                });
            }
        }
        Ok(Self {
            version: Self::VERSION,
            labels,
        })
    }

    /// Build a label set from per-sample values, in order of first appearance
    pub fn from_first_appearance(values: &[String]) -> Result<Self> {
        let mut labels: Vec<String> = Vec::new();
        for value in values {
            if !labels.contains(value) {
                labels.push(value.clone());
            }
        }
        Self::new(labels)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Class id of a label
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Label of a class id
    pub fn label(&self, class_id: usize) -> Option<&str> {
        self.labels.get(class_id).map(|s| s.as_str())
    }
}

/// Per-sample class label and batch identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMetadata {
    /// Sample identifiers
    sample_ids: Vec<String>,
    /// Class id of each sample (index into `label_set`)
    class_ids: Vec<usize>,
    /// Batch / series identifier of each sample
    batches: Vec<String>,
    label_set: LabelSet,
}

impl SampleMetadata {
    /// Create sample metadata.
    ///
    /// When `label_set` is `None` the class order is the order of first
    /// appearance in `classes`.
    pub fn new(
        sample_ids: Vec<String>,
        classes: Vec<String>,
        batches: Vec<String>,
        label_set: Option<LabelSet>,
    ) -> Result<Self> {
        if classes.len() != sample_ids.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} class values", sample_ids.len()),
                got: format!("{} class values", classes.len()),
            });
        }
        if batches.len() != sample_ids.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} batch values", sample_ids.len()),
                got: format!("{} batch values", batches.len()),
            });
        }

        let mut seen = HashSet::new();
        for id in &sample_ids {
            if !seen.insert(id.as_str()) {
                return Err(PipelineError::InvalidMetadata {
                    reason: format!("duplicate sample ID '{}'", id),
                });
            }
        }

        let label_set = match label_set {
            Some(set) => set,
            None => LabelSet::from_first_appearance(&classes)?,
        };

        let class_ids = classes
            .iter()
            .zip(sample_ids.iter())
            .map(|(class, sample)| {
                label_set
                    .index_of(class)
                    .ok_or_else(|| PipelineError::InvalidMetadata {
                        reason: format!(
                            "sample '{}' has class '{}' which is not in the label set {:?}",
                            sample,
                            class,
                            label_set.labels()
                        ),
                    })
            })
            .collect::<Result<Vec<usize>>>()?;

        Ok(Self {
            sample_ids,
            class_ids,
            batches,
            label_set,
        })
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn class_ids(&self) -> &[usize] {
        &self.class_ids
    }

    pub fn batches(&self) -> &[String] {
        &self.batches
    }

    pub fn label_set(&self) -> &LabelSet {
        &self.label_set
    }

    /// Class label of one sample
    pub fn class_label(&self, sample_idx: usize) -> &str {
        &self.label_set.labels()[self.class_ids[sample_idx]]
    }

    /// Sample indices belonging to a class id, ascending
    pub fn samples_with_class(&self, class_id: usize) -> Vec<usize> {
        self.class_ids
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == class_id)
            .map(|(i, _)| i)
            .collect()
    }

    /// Sample count of every class in the label set (zeros included)
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.label_set.len()];
        for &c in &self.class_ids {
            counts[c] += 1;
        }
        counts
    }

    /// Class ids with at least one sample
    pub fn present_classes(&self) -> Vec<usize> {
        self.class_counts()
            .iter()
            .enumerate()
            .filter(|(_, &n)| n > 0)
            .map(|(c, _)| c)
            .collect()
    }

    /// Subset metadata to specific samples, keeping the label set
    pub fn subset(&self, sample_indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = sample_indices.iter().find(|&&i| i >= self.n_samples()) {
            return Err(PipelineError::InvalidInput {
                reason: format!(
                    "sample index {} out of range for {} samples",
                    bad,
                    self.n_samples()
                ),
            });
        }
        Ok(Self {
            sample_ids: sample_indices
                .iter()
                .map(|&i| self.sample_ids[i].clone())
                .collect(),
            class_ids: sample_indices.iter().map(|&i| self.class_ids[i]).collect(),
            batches: sample_indices
                .iter()
                .map(|&i| self.batches[i].clone())
                .collect(),
            label_set: self.label_set.clone(),
        })
    }

    /// Reorder to match `sample_ids` exactly.
    ///
    /// Samples missing on either side are listed in the error.
    pub fn aligned_to(&self, sample_ids: &[String]) -> Result<Self> {
        let index: HashMap<&str, usize> = self
            .sample_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let missing_in_meta: Vec<&str> = sample_ids
            .iter()
            .filter(|id| !index.contains_key(id.as_str()))
            .map(|s| s.as_str())
            .collect();
        let wanted: HashSet<&str> = sample_ids.iter().map(|s| s.as_str()).collect();
        let missing_in_matrix: Vec<&str> = self
            .sample_ids
            .iter()
            .filter(|id| !wanted.contains(id.as_str()))
            .map(|s| s.as_str())
            .collect();

        if !missing_in_meta.is_empty() || !missing_in_matrix.is_empty() {
            let mut msg = String::from("Sample IDs do not match between matrix and metadata.");
            if !missing_in_meta.is_empty() {
                msg.push_str(&format!(" In matrix but not metadata: {:?}.", missing_in_meta));
            }
            if !missing_in_matrix.is_empty() {
                msg.push_str(&format!(" In metadata but not matrix: {:?}.", missing_in_matrix));
            }
            return Err(PipelineError::InvalidMetadata { reason: msg });
        }

        let order: Vec<usize> = sample_ids.iter().map(|id| index[id.as_str()]).collect();
        self.subset(&order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sample_metadata() {
        let meta = SampleMetadata::new(
            strings(&["s1", "s2", "s3", "s4"]),
            strings(&["LPS", "M0", "LPS", "IFN"]),
            strings(&["GSE1", "GSE1", "GSE2", "GSE2"]),
            None,
        )
        .unwrap();

        assert_eq!(meta.label_set().labels(), &strings(&["LPS", "M0", "IFN"])[..]);
        assert_eq!(meta.samples_with_class(0), vec![0, 2]);
        assert_eq!(meta.class_counts(), vec![2, 1, 1]);
        assert_eq!(meta.class_label(3), "IFN");
    }

    #[test]
    fn test_explicit_label_order() {
        let set = LabelSet::new(strings(&["M0", "IFN", "LPS", "LPS_IFN"])).unwrap();
        let meta = SampleMetadata::new(
            strings(&["s1", "s2"]),
            strings(&["LPS", "M0"]),
            strings(&["b", "b"]),
            Some(set),
        )
        .unwrap();
        assert_eq!(meta.class_ids(), &[2, 0]);
        assert_eq!(meta.class_counts(), vec![1, 0, 1, 0]);
        assert_eq!(meta.present_classes(), vec![0, 2]);
    }

    #[test]
    fn test_unknown_label_rejected() {
        let set = LabelSet::new(strings(&["M0"])).unwrap();
        let err = SampleMetadata::new(
            strings(&["s1"]),
            strings(&["LPS"]),
            strings(&["b"]),
            Some(set),
        )
        .unwrap_err();
        assert!(err.to_string().contains("LPS"));
    }

    #[test]
    fn test_aligned_to_reorders_and_reports() {
        let meta = SampleMetadata::new(
            strings(&["s1", "s2", "s3"]),
            strings(&["a", "b", "a"]),
            strings(&["x", "y", "z"]),
            None,
        )
        .unwrap();
        let aligned = meta.aligned_to(&strings(&["s3", "s1", "s2"])).unwrap();
        assert_eq!(aligned.batches(), &strings(&["z", "x", "y"])[..]);

        let err = meta.aligned_to(&strings(&["s1", "s2", "s9"])).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("s9") && msg.contains("s3"));
    }
}
