//! Sample quality control by correlation clustering

mod cluster_qc;
mod hclust;

pub use cluster_qc::{
    correlation_distances, CorrelationFilter, DroppedClass, FilterOutcome, GroupReport,
};
pub use hclust::{hclust, CutTree, Dendrogram, Linkage, Merge};
