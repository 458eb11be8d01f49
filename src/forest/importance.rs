//! Out-of-bag permutation importance

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::ensemble::ForestFit;
use crate::data::LabeledDataset;
use crate::error::{PipelineError, Result};
use crate::rng::RMersenneTwister;

/// Non-negative importance score per feature, in schema order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    features: Vec<String>,
    scores: Vec<f64>,
}

impl FeatureImportance {
    pub fn new(features: Vec<String>, scores: Vec<f64>) -> Result<Self> {
        if features.len() != scores.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} scores", features.len()),
                got: format!("{} scores", scores.len()),
            });
        }
        Ok(Self { features, scores })
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn get(&self, feature: &str) -> Option<f64> {
        self.features
            .iter()
            .position(|f| f == feature)
            .map(|i| self.scores[i])
    }

    /// (feature, score) by descending score; equal scores keep schema order
    pub fn ranked(&self) -> Vec<(&str, f64)> {
        let mut order: Vec<usize> = (0..self.features.len()).collect();
        order.sort_by(|&a, &b| self.scores[b].total_cmp(&self.scores[a]));
        order
            .into_iter()
            .map(|i| (self.features[i].as_str(), self.scores[i]))
            .collect()
    }

    /// Ids of the `k` highest-ranked features
    pub fn top_k(&self, k: usize) -> Vec<String> {
        self.ranked()
            .into_iter()
            .take(k)
            .map(|(f, _)| f.to_string())
            .collect()
    }
}

/// Mean increase in OOB misclassification rate when a feature is permuted.
///
/// For every tree, each feature it splits on is shuffled among that tree's
/// OOB rows; features a tree never uses contribute 0 for that tree. Trees
/// with no OOB rows contribute 0 everywhere. Scores are clamped at 0.
pub fn permutation_importance(
    fit: &ForestFit,
    train: &LabeledDataset,
    rng: &mut RMersenneTwister,
) -> Result<FeatureImportance> {
    let model = &fit.model;
    train.matrix().check_schema(model.feature_schema())?;
    let n_features = model.feature_schema().len();
    let n_rows = train.n_samples();
    let data = train.matrix().values();
    let labels = train.labels();

    let seeds: Vec<u32> = (0..model.n_trees()).map(|_| rng.child_seed()).collect();

    let per_tree: Vec<Vec<(usize, f64)>> = seeds
        .into_par_iter()
        .enumerate()
        .map(|(t, seed)| {
            let tree = &model.trees()[t];
            let oob = fit.out_of_bag(t, n_rows);
            if oob.is_empty() {
                return Vec::new();
            }
            let n_oob = oob.len() as f64;
            let mut tree_rng = RMersenneTwister::new(seed);

            let baseline = oob
                .iter()
                .filter(|&&r| tree.predict_row(data.row(r)) != labels[r])
                .count() as f64
                / n_oob;

            tree.split_features()
                .into_iter()
                .map(|j| {
                    let mut permuted: Vec<f64> = oob.iter().map(|&r| data[[r, j]]).collect();
                    tree_rng.shuffle(&mut permuted);
                    let errors = oob
                        .iter()
                        .zip(&permuted)
                        .filter(|&(&r, &v)| {
                            let predicted =
                                tree.predict_with(|f| if f == j { v } else { data[[r, f]] });
                            predicted != labels[r]
                        })
                        .count() as f64;
                    (j, errors / n_oob - baseline)
                })
                .collect()
        })
        .collect();

    let mut totals = vec![0.0; n_features];
    for deltas in &per_tree {
        for &(j, delta) in deltas {
            totals[j] += delta;
        }
    }
    let n_trees = model.n_trees() as f64;
    let scores = totals.into_iter().map(|s| (s / n_trees).max(0.0)).collect();

    FeatureImportance::new(model.feature_schema().to_vec(), scores)
}
