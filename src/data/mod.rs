//! Data structures for labeled expression data

mod dataset;
mod expression_matrix;
mod metadata;

pub use dataset::LabeledDataset;
pub use expression_matrix::ExpressionMatrix;
pub use metadata::{LabelSet, SampleMetadata};
