//! Correlation-based sample QC: keep the dominant cluster of every class

use ndarray::Array2;

use super::hclust::{hclust, Linkage};
use crate::data::{ExpressionMatrix, LabeledDataset};
use crate::error::{PipelineError, Result};
use crate::stats::pearson;

/// Sample outlier filter based on correlation clustering.
///
/// For every class independently: Pearson correlation between samples across
/// all features, distance `1 - r`, hierarchical clustering, cut at
/// `cut_height`, keep the largest cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationFilter {
    /// Dendrogram cut height in `1 - r` units (0.25 keeps r >= 0.75)
    pub cut_height: f64,
    /// Classes with fewer samples than this are dropped
    pub min_group_size: usize,
    pub linkage: Linkage,
}

impl Default for CorrelationFilter {
    fn default() -> Self {
        Self {
            cut_height: 0.25,
            min_group_size: 5,
            linkage: Linkage::Complete,
        }
    }
}

/// Retained samples of one class
#[derive(Debug, Clone, PartialEq)]
pub struct GroupReport {
    pub class: String,
    pub n_input: usize,
    pub n_clusters: usize,
    /// Retained sample ids with their batch ids, for downstream batch correction
    pub retained: Vec<(String, String)>,
}

/// A class removed by the filter
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedClass {
    pub class: String,
    pub found: usize,
    pub required: usize,
}

impl DroppedClass {
    pub fn to_error(&self) -> PipelineError {
        PipelineError::InsufficientSamples {
            class: self.class.clone(),
            found: self.found,
            required: self.required,
        }
    }
}

/// Result of applying the filter to a dataset
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub dataset: LabeledDataset,
    pub groups: Vec<GroupReport>,
    pub dropped: Vec<DroppedClass>,
}

impl FilterOutcome {
    pub fn n_removed(&self, n_input: usize) -> usize {
        n_input - self.dataset.n_samples()
    }
}

/// Sample x sample `1 - r` distances.
///
/// A zero-variance sample has no defined correlation and is placed at
/// distance 1 (r = 0) from every other sample.
pub fn correlation_distances(matrix: &ExpressionMatrix) -> Array2<f64> {
    let n = matrix.n_samples();
    let mut d = Array2::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let r = pearson(matrix.sample_values(i), matrix.sample_values(j));
            let dist = if r.is_finite() { 1.0 - r } else { 1.0 };
            d[[i, j]] = dist;
            d[[j, i]] = dist;
        }
    }
    d
}

impl CorrelationFilter {
    /// Cluster one group and return the positions (within the group) of the
    /// largest cluster plus the number of clusters found
    pub fn dominant_cluster(&self, group: &ExpressionMatrix) -> Result<(Vec<usize>, usize)> {
        if group.n_samples() <= 1 {
            return Ok(((0..group.n_samples()).collect(), group.n_samples()));
        }
        let distances = correlation_distances(group);
        let tree = hclust(&distances, self.linkage)?;
        let cut = tree.cut(self.cut_height);
        let largest = cut.largest().unwrap_or(0);
        Ok((cut.members(largest), cut.n_clusters()))
    }

    /// Apply the filter to every class of the dataset.
    ///
    /// Under-sized classes are dropped and reported. The call fails only if
    /// no class survives.
    pub fn apply(&self, dataset: &LabeledDataset) -> Result<FilterOutcome> {
        let metadata = dataset.metadata();
        let label_set = dataset.label_set();

        let mut keep: Vec<usize> = Vec::new();
        let mut groups = Vec::new();
        let mut dropped = Vec::new();

        for class_id in 0..label_set.len() {
            let class = label_set.label(class_id).unwrap_or_default().to_string();
            let members = metadata.samples_with_class(class_id);
            if members.is_empty() {
                continue;
            }

            if members.len() < self.min_group_size {
                log::warn!(
                    "Class '{}' has {} samples (minimum {}), dropped before clustering",
                    class,
                    members.len(),
                    self.min_group_size
                );
                dropped.push(DroppedClass {
                    class,
                    found: members.len(),
                    required: self.min_group_size,
                });
                continue;
            }

            let group = dataset.matrix().subset_samples(&members)?;
            let (local, n_clusters) = self.dominant_cluster(&group)?;
            let retained: Vec<usize> = local.iter().map(|&i| members[i]).collect();

            if retained.len() < self.min_group_size {
                log::warn!(
                    "Class '{}': largest of {} clusters has {} samples (minimum {}), dropped",
                    class,
                    n_clusters,
                    retained.len(),
                    self.min_group_size
                );
                dropped.push(DroppedClass {
                    class,
                    found: retained.len(),
                    required: self.min_group_size,
                });
                continue;
            }

            log::info!(
                "Class '{}': {} samples, {} clusters at height {}, kept {}",
                class,
                members.len(),
                n_clusters,
                self.cut_height,
                retained.len()
            );

            groups.push(GroupReport {
                class,
                n_input: members.len(),
                n_clusters,
                retained: retained
                    .iter()
                    .map(|&i| {
                        (
                            dataset.sample_ids()[i].clone(),
                            metadata.batches()[i].clone(),
                        )
                    })
                    .collect(),
            });
            keep.extend(retained);
        }

        if groups.is_empty() {
            return Err(PipelineError::InsufficientGroups {
                stage: "correlation clustering".to_string(),
                found: 0,
                required: 1,
            });
        }

        keep.sort_unstable();
        let filtered = dataset.subset_samples(&keep)?;

        Ok(FilterOutcome {
            dataset: filtered,
            groups,
            dropped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SampleMetadata;
    use ndarray::array;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn four_samples() -> ExpressionMatrix {
        // s1..s3 follow the same profile; s4 runs the other way
        ExpressionMatrix::new(
            array![
                [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
                [1.1, 2.1, 2.9, 4.2, 5.1, 5.9],
                [0.9, 1.8, 3.2, 3.9, 4.8, 6.2],
                [6.0, 5.0, 4.0, 3.0, 2.0, 1.0],
            ],
            strings(&["s1", "s2", "s3", "s4"]),
            strings(&["g1", "g2", "g3", "g4", "g5", "g6"]),
        )
        .unwrap()
    }

    #[test]
    fn test_correlation_distances_symmetric() {
        let d = correlation_distances(&four_samples());
        assert_eq!(d[[0, 0]], 0.0);
        assert!((d[[0, 3]] - d[[3, 0]]).abs() < 1e-15);
        assert!(d[[0, 1]] < 0.25);
        assert!(d[[0, 3]] > 1.9);
    }

    #[test]
    fn test_keeps_three_sample_cluster() {
        let matrix = four_samples();
        let metadata = SampleMetadata::new(
            strings(&["s1", "s2", "s3", "s4"]),
            strings(&["M0", "M0", "M0", "M0"]),
            strings(&["b1", "b1", "b2", "b2"]),
            None,
        )
        .unwrap();
        let dataset = LabeledDataset::new(matrix, metadata).unwrap();

        let filter = CorrelationFilter {
            min_group_size: 3,
            ..CorrelationFilter::default()
        };
        let outcome = filter.apply(&dataset).unwrap();

        assert_eq!(outcome.dataset.sample_ids(), &strings(&["s1", "s2", "s3"])[..]);
        assert_eq!(outcome.groups[0].n_clusters, 2);
        assert_eq!(
            outcome.groups[0].retained[2],
            ("s3".to_string(), "b2".to_string())
        );
        assert!(outcome.dropped.is_empty());
        assert_eq!(outcome.n_removed(4), 1);
    }

    #[test]
    fn test_single_cluster_keeps_all() {
        let matrix = four_samples().subset_samples(&[0, 1, 2]).unwrap();
        let metadata = SampleMetadata::new(
            strings(&["s1", "s2", "s3"]),
            strings(&["M0", "M0", "M0"]),
            strings(&["b", "b", "b"]),
            None,
        )
        .unwrap();
        let dataset = LabeledDataset::new(matrix, metadata).unwrap();
        let filter = CorrelationFilter {
            min_group_size: 2,
            ..CorrelationFilter::default()
        };
        let outcome = filter.apply(&dataset).unwrap();
        assert_eq!(outcome.dataset, dataset);
    }

    #[test]
    fn test_small_class_dropped_not_fatal() {
        let matrix = four_samples();
        let metadata = SampleMetadata::new(
            strings(&["s1", "s2", "s3", "s4"]),
            strings(&["M0", "M0", "M0", "LPS"]),
            strings(&["b", "b", "b", "b"]),
            None,
        )
        .unwrap();
        let dataset = LabeledDataset::new(matrix, metadata).unwrap();
        let filter = CorrelationFilter {
            min_group_size: 2,
            ..CorrelationFilter::default()
        };
        let outcome = filter.apply(&dataset).unwrap();
        assert_eq!(outcome.dataset.n_samples(), 3);
        assert_eq!(outcome.dropped.len(), 1);
        assert_eq!(outcome.dropped[0].class, "LPS");
        assert!(outcome.dropped[0].to_error().to_string().contains("LPS"));
    }

    #[test]
    fn test_no_class_left_is_fatal() {
        let matrix = four_samples();
        let metadata = SampleMetadata::new(
            strings(&["s1", "s2", "s3", "s4"]),
            strings(&["a", "a", "b", "b"]),
            strings(&["x", "x", "x", "x"]),
            None,
        )
        .unwrap();
        let dataset = LabeledDataset::new(matrix, metadata).unwrap();
        let err = CorrelationFilter::default().apply(&dataset).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientGroups {
                found: 0,
                required: 1,
                ..
            }
        ));
        assert!(err.to_string().contains("found 0, at least 1 required"));
    }
}
