//! Schedule-driven feature pruning
//!
//! Round 0 trains on every feature. Each schedule entry K then keeps the top
//! K features by the previous round's importance and retrains on the same
//! partition and sample weights.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::data::LabeledDataset;
use crate::error::{PipelineError, Result};
use crate::forest::{
    evaluate, permutation_importance, train_forest, FeatureImportance, ForestParams,
    PerformanceRecord, TrainedModel,
};
use crate::rng::RMersenneTwister;
use crate::stats::default_split_candidates;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PruningConfig {
    pub tree_count: usize,
    pub max_depth: usize,
    /// Fixed split-candidate count; `None` re-derives ceil(sqrt(K)) each round
    pub split_candidates: Option<usize>,
    pub min_node_size: usize,
    pub schedule: Vec<usize>,
    /// Maximum number of pruning transitions, `None` for no limit
    pub max_rounds: Option<usize>,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            tree_count: 1500,
            max_depth: 15,
            split_candidates: None,
            min_node_size: 1,
            schedule: vec![10000, 1000],
            max_rounds: None,
        }
    }
}

impl PruningConfig {
    /// Forest parameters for a round over `n_features` features
    pub fn forest_params(&self, n_features: usize) -> ForestParams {
        let split_candidates = match self.split_candidates {
            Some(m) => m.clamp(1, n_features.max(1)),
            None => default_split_candidates(n_features),
        };
        ForestParams {
            tree_count: self.tree_count,
            max_depth: self.max_depth,
            split_candidates,
            min_node_size: self.min_node_size,
        }
    }
}

/// One train/evaluate/score round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub index: usize,
    pub n_features: usize,
    pub split_candidates: usize,
    pub performance: PerformanceRecord,
    pub importance: FeatureImportance,
}

#[derive(Debug, Clone)]
pub struct PruningOutcome {
    pub rounds: Vec<RoundRecord>,
    pub model: TrainedModel,
}

impl PruningOutcome {
    pub fn final_round(&self) -> &RoundRecord {
        &self.rounds[self.rounds.len() - 1]
    }

    /// Importance table of the final model
    pub fn importance(&self) -> &FeatureImportance {
        &self.final_round().importance
    }
}

fn run_round(
    index: usize,
    train: &LabeledDataset,
    test: &LabeledDataset,
    sample_weights: &[f64],
    config: &PruningConfig,
    rng: &mut RMersenneTwister,
) -> Result<(RoundRecord, TrainedModel)> {
    let params = config.forest_params(train.n_features());
    log::info!(
        "Round {}: training {} trees on {} features (mtry = {})",
        index,
        params.tree_count,
        train.n_features(),
        params.split_candidates
    );

    let fit = train_forest(train, sample_weights, &params, rng)?;
    let performance = evaluate(&fit.model, test)?;
    let importance = permutation_importance(&fit, train, rng)?;

    log::info!(
        "Round {}: held-out accuracy {:.4}, kappa {:.4}",
        index,
        performance.accuracy,
        performance.kappa
    );
    log::debug!("Round {} performance:{}", index, performance);

    let record = RoundRecord {
        index,
        n_features: train.n_features(),
        split_candidates: params.split_candidates,
        performance,
        importance,
    };
    Ok((record, fit.model))
}

/// Run round 0 and every applicable schedule step.
///
/// A step is skipped, and pruning stops, once K is not strictly below the
/// current feature count or `max_rounds` transitions have been made.
pub fn run_pruning(
    train: &LabeledDataset,
    test: &LabeledDataset,
    sample_weights: &[f64],
    config: &PruningConfig,
    rng: &mut RMersenneTwister,
) -> Result<PruningOutcome> {
    if train.feature_ids() != test.feature_ids() {
        return Err(PipelineError::SchemaMismatch {
            feature: train
                .feature_ids()
                .iter()
                .zip(test.feature_ids())
                .find(|(a, b)| a != b)
                .map(|(a, _)| a.clone())
                .unwrap_or_default(),
            reason: "train and test sets have different feature columns".to_string(),
        });
    }

    let (first, mut model) = run_round(0, train, test, sample_weights, config, rng)?;
    let mut rounds = vec![first];
    let mut train = train.clone();
    let mut test = test.clone();

    for &k in &config.schedule {
        let current = train.n_features();
        if k == 0 || k >= current {
            log::info!("Stopping pruning: K = {} is not below {} features", k, current);
            break;
        }
        if config.max_rounds.is_some_and(|max| rounds.len() > max) {
            log::info!("Stopping pruning: round budget exhausted");
            break;
        }

        let top: HashSet<String> = rounds[rounds.len() - 1]
            .importance
            .top_k(k)
            .into_iter()
            .collect();
        let schema: Vec<String> = train
            .feature_ids()
            .iter()
            .filter(|f| top.contains(*f))
            .cloned()
            .collect();

        train = train.align_to_schema(&schema)?;
        test = test.align_to_schema(&schema)?;

        let (record, next) = run_round(rounds.len(), &train, &test, sample_weights, config, rng)?;
        rounds.push(record);
        model = next;
    }

    let last = &rounds[rounds.len() - 1];
    log::info!(
        "Pruning finished after round {} with {} features",
        last.index,
        last.n_features
    );

    Ok(PruningOutcome { rounds, model })
}
