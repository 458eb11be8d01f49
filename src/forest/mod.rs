//! Weighted-bootstrap random forest: training, prediction, importance and
//! held-out evaluation

mod ensemble;
mod evaluation;
mod importance;
mod tree;

pub use ensemble::{train_forest, ForestFit, ForestParams, TrainedModel};
pub use evaluation::{evaluate, ClassMetrics, ConfusionMatrix, PerformanceRecord};
pub use importance::{permutation_importance, FeatureImportance};
pub use tree::{majority, DecisionTree, TreeNode, TreeParams};
