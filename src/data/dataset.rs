//! LabeledDataset - expression matrix paired with index-aligned metadata

use super::{ExpressionMatrix, LabelSet, SampleMetadata};
use crate::error::{PipelineError, Result};

/// Expression matrix plus sample metadata, kept index-aligned.
///
/// Every pipeline stage takes a dataset by reference and returns a new one;
/// nothing is mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledDataset {
    matrix: ExpressionMatrix,
    metadata: SampleMetadata,
}

impl LabeledDataset {
    /// Pair a matrix with metadata, reordering the metadata to the
    /// matrix's sample order
    pub fn new(matrix: ExpressionMatrix, metadata: SampleMetadata) -> Result<Self> {
        let metadata = if matrix.sample_ids() == metadata.sample_ids() {
            metadata
        } else {
            metadata.aligned_to(matrix.sample_ids())?
        };

        if matrix.n_samples() == 0 {
            return Err(PipelineError::EmptyData {
                reason: "dataset has no samples".to_string(),
            });
        }

        Ok(Self { matrix, metadata })
    }

    pub fn matrix(&self) -> &ExpressionMatrix {
        &self.matrix
    }

    pub fn metadata(&self) -> &SampleMetadata {
        &self.metadata
    }

    pub fn label_set(&self) -> &LabelSet {
        self.metadata.label_set()
    }

    /// Class id per sample
    pub fn labels(&self) -> &[usize] {
        self.metadata.class_ids()
    }

    pub fn n_samples(&self) -> usize {
        self.matrix.n_samples()
    }

    pub fn n_features(&self) -> usize {
        self.matrix.n_features()
    }

    pub fn feature_ids(&self) -> &[String] {
        self.matrix.feature_ids()
    }

    pub fn sample_ids(&self) -> &[String] {
        self.matrix.sample_ids()
    }

    /// Subset samples in both matrix and metadata
    pub fn subset_samples(&self, sample_indices: &[usize]) -> Result<Self> {
        if sample_indices.is_empty() {
            return Err(PipelineError::EmptyData {
                reason: "sample subset is empty".to_string(),
            });
        }
        Ok(Self {
            matrix: self.matrix.subset_samples(sample_indices)?,
            metadata: self.metadata.subset(sample_indices)?,
        })
    }

    /// Subset features by column index
    pub fn subset_features(&self, feature_indices: &[usize]) -> Result<Self> {
        Ok(Self {
            matrix: self.matrix.subset_features(feature_indices)?,
            metadata: self.metadata.clone(),
        })
    }

    /// Restrict and reorder features to exactly `schema`
    pub fn align_to_schema(&self, schema: &[String]) -> Result<Self> {
        Ok(Self {
            matrix: self.matrix.align_to_schema(schema)?,
            metadata: self.metadata.clone(),
        })
    }
}
