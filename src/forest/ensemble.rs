//! Bagged ensemble of CART trees grown on class-weighted bootstraps

use ndarray::ArrayView1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{majority, DecisionTree, TreeNode, TreeParams};
use crate::data::{ExpressionMatrix, LabelSet, LabeledDataset};
use crate::error::{PipelineError, Result};
use crate::rng::{RMersenneTwister, WeightedSampler};

/// Forest hyperparameters recorded with every model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub tree_count: usize,
    pub max_depth: usize,
    pub split_candidates: usize,
    pub min_node_size: usize,
}

impl ForestParams {
    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            split_candidates: self.split_candidates,
            min_node_size: self.min_node_size,
        }
    }
}

/// Immutable trained classifier: trees, the feature schema they index into,
/// the hyperparameters and the label set class ids decode through
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    trees: Vec<DecisionTree>,
    feature_schema: Vec<String>,
    params: ForestParams,
    label_set: LabelSet,
}

/// A trained model plus the bootstrap of every tree, needed for OOB scoring
#[derive(Debug, Clone)]
pub struct ForestFit {
    pub model: TrainedModel,
    /// In-bag row indices (into the training set) per tree
    pub bootstraps: Vec<Vec<usize>>,
}

impl ForestFit {
    /// Training rows never drawn into tree `t`'s bootstrap, ascending
    pub fn out_of_bag(&self, t: usize, n_rows: usize) -> Vec<usize> {
        let mut in_bag = vec![false; n_rows];
        for &r in &self.bootstraps[t] {
            in_bag[r] = true;
        }
        (0..n_rows).filter(|&r| !in_bag[r]).collect()
    }
}

/// Train a forest.
///
/// Each tree is grown on `train.n_samples()` rows drawn with replacement with
/// probability proportional to `sample_weights`. One child seed per tree is
/// drawn from `rng` before the parallel stage, so the result does not depend
/// on thread scheduling.
pub fn train_forest(
    train: &LabeledDataset,
    sample_weights: &[f64],
    params: &ForestParams,
    rng: &mut RMersenneTwister,
) -> Result<ForestFit> {
    let n = train.n_samples();
    if sample_weights.len() != n {
        return Err(PipelineError::DimensionMismatch {
            expected: format!("{} sample weights", n),
            got: format!("{} sample weights", sample_weights.len()),
        });
    }
    if train.n_features() == 0 {
        return Err(PipelineError::EmptyData {
            reason: "cannot train a forest on zero features".to_string(),
        });
    }
    if params.tree_count == 0 {
        return Err(PipelineError::InvalidInput {
            reason: "tree_count must be > 0".to_string(),
        });
    }

    let sampler = WeightedSampler::new(sample_weights)?;
    let data = train.matrix().values();
    let labels = train.labels();
    let n_classes = train.label_set().len();
    let tree_params = params.tree_params();

    let seeds: Vec<u32> = (0..params.tree_count).map(|_| rng.child_seed()).collect();

    let grown: Vec<(DecisionTree, Vec<usize>)> = seeds
        .into_par_iter()
        .map(|seed| {
            let mut tree_rng = RMersenneTwister::new(seed);
            let bootstrap = sampler.draw_n(&mut tree_rng, n);
            let tree =
                DecisionTree::fit(data, labels, &bootstrap, n_classes, tree_params, &mut tree_rng);
            (tree, bootstrap)
        })
        .collect();

    let (trees, bootstraps): (Vec<DecisionTree>, Vec<Vec<usize>>) = grown.into_iter().unzip();

    log::debug!(
        "Trained {} trees on {} samples x {} features (mtry = {}, max depth = {})",
        trees.len(),
        n,
        train.n_features(),
        params.split_candidates,
        params.max_depth
    );

    Ok(ForestFit {
        model: TrainedModel {
            trees,
            feature_schema: train.feature_ids().to_vec(),
            params: *params,
            label_set: train.label_set().clone(),
        },
        bootstraps,
    })
}

impl TrainedModel {
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn feature_schema(&self) -> &[String] {
        &self.feature_schema
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn label_set(&self) -> &LabelSet {
        &self.label_set
    }

    /// Check internal consistency of a (possibly deserialized) model
    pub fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(PipelineError::InvalidInput {
                reason: "model has no trees".to_string(),
            });
        }
        let n_classes = self.label_set.len();
        for (t, tree) in self.trees.iter().enumerate() {
            let nodes = tree.nodes();
            if nodes.is_empty() {
                return Err(PipelineError::InvalidInput {
                    reason: format!("tree {} has no nodes", t),
                });
            }
            for (idx, node) in nodes.iter().enumerate() {
                match *node {
                    TreeNode::Leaf { class } if class >= n_classes => {
                        return Err(PipelineError::InvalidInput {
                            reason: format!(
                                "tree {} node {} has class {}, the label set has {}",
                                t, idx, class, n_classes
                            ),
                        });
                    }
                    // Children are stored after their parent, so the walk from the root ends
                    TreeNode::Split { left, right, .. }
                        if [left, right].iter().any(|&c| c <= idx || c >= nodes.len()) =>
                    {
                        return Err(PipelineError::InvalidInput {
                            reason: format!(
                                "tree {} node {} has children ({}, {}) outside {}..{}",
                                t,
                                idx,
                                left,
                                right,
                                idx + 1,
                                nodes.len()
                            ),
                        });
                    }
                    _ => {}
                }
            }
            if let Some(j) = tree.max_feature() {
                if j >= self.feature_schema.len() {
                    return Err(PipelineError::SchemaMismatch {
                        feature: format!("#{}", j),
                        reason: format!(
                            "tree {} splits on column {} but the schema has {} features",
                            t,
                            j,
                            self.feature_schema.len()
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Vote count per class for one row in schema order
    pub fn votes(&self, row: ArrayView1<'_, f64>) -> Vec<usize> {
        let mut votes = vec![0usize; self.label_set.len()];
        for tree in &self.trees {
            votes[tree.predict_row(row)] += 1;
        }
        votes
    }

    /// Majority-vote class ids, one per sample; ties go to the lowest id.
    ///
    /// The matrix columns must equal the feature schema exactly.
    pub fn predict(&self, matrix: &ExpressionMatrix) -> Result<Vec<usize>> {
        matrix.check_schema(&self.feature_schema)?;
        Ok((0..matrix.n_samples())
            .into_par_iter()
            .map(|i| majority(&self.votes(matrix.sample_values(i))))
            .collect())
    }

    /// Majority-vote class labels
    pub fn predict_labels(&self, matrix: &ExpressionMatrix) -> Result<Vec<String>> {
        let classes = self.predict(matrix)?;
        Ok(classes
            .into_iter()
            .map(|c| self.label_set.labels()[c].clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SampleMetadata;
    use ndarray::Array2;

    /// Two informative features, one noise feature, 3 classes x 10 samples
    fn dataset() -> LabeledDataset {
        let mut rng = RMersenneTwister::new(100);
        let n = 30;
        let mut values = Array2::zeros((n, 3));
        let mut classes = Vec::new();
        for i in 0..n {
            let c = i / 10;
            values[[i, 0]] = c as f64 * 3.0 + 0.3 * rng.rnorm();
            values[[i, 1]] = -(c as f64) * 2.0 + 0.3 * rng.rnorm();
            values[[i, 2]] = rng.rnorm();
            classes.push(["M0", "IFN", "LPS"][c].to_string());
        }
        let samples: Vec<String> = (0..n).map(|i| format!("s{}", i)).collect();
        let matrix = ExpressionMatrix::new(
            values,
            samples.clone(),
            vec!["g1".into(), "g2".into(), "noise".into()],
        )
        .unwrap();
        let metadata = SampleMetadata::new(samples, classes, vec!["b".into(); n], None).unwrap();
        LabeledDataset::new(matrix, metadata).unwrap()
    }

    fn params() -> ForestParams {
        ForestParams {
            tree_count: 25,
            max_depth: 6,
            split_candidates: 2,
            min_node_size: 1,
        }
    }

    #[test]
    fn test_forest_fits_training_data() {
        let data = dataset();
        let weights = vec![1.0; data.n_samples()];
        let fit = train_forest(&data, &weights, &params(), &mut RMersenneTwister::new(1)).unwrap();
        assert_eq!(fit.model.n_trees(), 25);
        assert_eq!(fit.bootstraps.len(), 25);
        fit.model.validate().unwrap();

        let predicted = fit.model.predict(data.matrix()).unwrap();
        let correct = predicted
            .iter()
            .zip(data.labels())
            .filter(|(p, t)| p == t)
            .count();
        assert!(correct >= 28, "only {} of 30 correct", correct);

        let labels = fit.model.predict_labels(data.matrix()).unwrap();
        assert_eq!(labels[0], "M0");
    }

    #[test]
    fn test_forest_deterministic_across_runs() {
        let data = dataset();
        let weights = vec![1.0; data.n_samples()];
        let a = train_forest(&data, &weights, &params(), &mut RMersenneTwister::new(5)).unwrap();
        let b = train_forest(&data, &weights, &params(), &mut RMersenneTwister::new(5)).unwrap();
        assert_eq!(a.model, b.model);
        assert_eq!(a.bootstraps, b.bootstraps);
    }

    #[test]
    fn test_zero_weight_class_never_drawn() {
        let data = dataset();
        let weights: Vec<f64> = data
            .labels()
            .iter()
            .map(|&c| if c == 2 { 0.0 } else { 1.0 })
            .collect();
        let fit = train_forest(&data, &weights, &params(), &mut RMersenneTwister::new(2)).unwrap();
        for bootstrap in &fit.bootstraps {
            assert!(bootstrap.iter().all(|&r| data.labels()[r] != 2));
        }
    }

    #[test]
    fn test_predict_rejects_reordered_schema() {
        let data = dataset();
        let weights = vec![1.0; data.n_samples()];
        let fit = train_forest(&data, &weights, &params(), &mut RMersenneTwister::new(1)).unwrap();
        let reordered = data.matrix().subset_features(&[1, 0, 2]).unwrap();
        let err = fit.model.predict(&reordered).unwrap_err();
        match err {
            PipelineError::SchemaMismatch { feature, .. } => assert_eq!(feature, "g1"),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_out_of_bag_complements_bootstrap() {
        let data = dataset();
        let weights = vec![1.0; data.n_samples()];
        let fit = train_forest(&data, &weights, &params(), &mut RMersenneTwister::new(1)).unwrap();
        let oob = fit.out_of_bag(0, data.n_samples());
        assert!(oob.iter().all(|r| !fit.bootstraps[0].contains(r)));
        assert!(!oob.is_empty());
    }
}
