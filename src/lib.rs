//! rust_rfpipe: sample QC clustering and class-imbalance-aware random forest
//! classification of expression profiles
//!
//! The pipeline removes outlier samples per class by correlation clustering,
//! selects features by one-way ANOVA with Benjamini-Hochberg adjustment,
//! trains a random forest on class-weighted bootstraps, prunes features by
//! permutation importance over a schedule of rounds, and applies the final
//! model to independently collected samples.
//!
//! # Example
//!
//! ```ignore
//! use rust_rfpipe::prelude::*;
//!
//! let matrix = read_expression_matrix("expression.tsv", false)?;
//! let metadata = read_metadata("samples.tsv", "class", "batch", None)?;
//! let dataset = LabeledDataset::new(matrix, metadata)?;
//!
//! let result = run_pipeline(&dataset, &PipelineConfig::default())?;
//! save_model("model.json", &result.pruning.model)?;
//! ```

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod filter;
pub mod forest;
pub mod io;
pub mod predict;
pub mod pruning;
pub mod rng;
pub mod sampling;
pub mod stats;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::data::{ExpressionMatrix, LabelSet, LabeledDataset, SampleMetadata};
    pub use crate::error::{PipelineError, Result};
    pub use crate::filter::{CorrelationFilter, FilterOutcome, Linkage};
    pub use crate::forest::{
        evaluate, permutation_importance, train_forest, ConfusionMatrix, FeatureImportance,
        ForestParams, PerformanceRecord, TrainedModel,
    };
    pub use crate::io::{
        load_model, read_expression_matrix, read_metadata, save_model, write_confusion,
        write_importance, write_predictions, write_retained_samples, write_round_metrics,
        write_selection,
    };
    pub use crate::predict::{ExternalClassifier, ExternalPrediction};
    pub use crate::pruning::{run_pruning, PruningConfig, PruningOutcome, RoundRecord};
    pub use crate::rng::RMersenneTwister;
    pub use crate::sampling::{ClassWeights, TrainTestSplit};
    pub use crate::testing::{anova_select, AnovaTable};
    pub use crate::PipelineResult;
    pub use crate::run_pipeline;
}

use prelude::*;

/// Every intermediate product of a training run
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub qc: FilterOutcome,
    pub selection: AnovaTable,
    pub split: TrainTestSplit,
    pub weights: ClassWeights,
    pub pruning: PruningOutcome,
}

/// Run QC, feature selection, weighting and the pruning rounds.
///
/// One generator seeded with `config.random_seed` drives the split and every
/// round, so equal inputs and seed give identical results.
pub fn run_pipeline(dataset: &LabeledDataset, config: &PipelineConfig) -> Result<PipelineResult> {
    config.validate()?;

    log::info!(
        "Correlation QC on {} samples (cut height {}, {:?} linkage)...",
        dataset.n_samples(),
        config.correlation_cut_height,
        config.linkage
    );
    let qc = config.correlation_filter().apply(dataset)?;
    log::info!(
        "QC removed {} samples, dropped {} classes",
        qc.n_removed(dataset.n_samples()),
        qc.dropped.len()
    );

    log::info!("ANOVA feature selection on {} features...", qc.dataset.n_features());
    let selection = anova_select(&qc.dataset, config.anova_alpha)?;
    let selected = selection.selected_dataset(&qc.dataset)?;

    let mut rng = RMersenneTwister::new(config.random_seed);
    let split = TrainTestSplit::random(selected.n_samples(), config.train_fraction, &mut rng)?;
    let train = selected.subset_samples(&split.train)?;
    let test = selected.subset_samples(&split.test)?;
    log::info!("Split: {} train, {} test samples", train.n_samples(), test.n_samples());

    let weights = ClassWeights::from_labels(train.labels(), train.label_set());
    weights.check(train.label_set())?;
    let sample_weights = weights.sample_weights(train.labels());

    let pruning = run_pruning(&train, &test, &sample_weights, &config.pruning(), &mut rng)?;

    Ok(PipelineResult {
        qc,
        selection,
        split,
        weights,
        pruning,
    })
}
