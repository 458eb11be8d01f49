//! Statistical feature selection: per-feature one-way ANOVA with BH adjustment

mod anova;
mod fdr;
mod pvalue;

pub use anova::{one_way_anova, AnovaFailure, AnovaFit};
pub use fdr::{ascending_order, benjamini_hochberg};
pub use pvalue::f_test_pvalue;

use rayon::prelude::*;

use crate::data::LabeledDataset;
use crate::error::{PipelineError, Result};

/// Test outcome of a single feature
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTest {
    pub feature: String,
    pub f_statistic: f64,
    pub pvalue: f64,
    pub padj: f64,
}

/// Per-feature ANOVA results plus the selected feature list
#[derive(Debug, Clone)]
pub struct AnovaTable {
    /// One entry per input feature, in input column order
    pub tests: Vec<FeatureTest>,
    /// Features with padj < alpha, ascending raw p-value
    pub selected: Vec<String>,
    /// Untestable features and the reason, as NumericDegeneracy errors
    pub excluded: Vec<(String, AnovaFailure)>,
    pub alpha: f64,
}

impl AnovaTable {
    /// Excluded features as user-facing errors
    pub fn exclusion_errors(&self) -> Vec<PipelineError> {
        self.excluded
            .iter()
            .map(|(feature, why)| PipelineError::NumericDegeneracy {
                feature: feature.clone(),
                reason: why.to_string(),
            })
            .collect()
    }

    /// Restrict a dataset to the selected features, in selection order
    pub fn selected_dataset(&self, dataset: &LabeledDataset) -> Result<LabeledDataset> {
        if self.selected.is_empty() {
            return Err(PipelineError::EmptyData {
                reason: format!("no feature passed adjusted p < {}", self.alpha),
            });
        }
        dataset.align_to_schema(&self.selected)
    }
}

/// Test every feature independently and keep BH-adjusted p < `alpha`
pub fn anova_select(dataset: &LabeledDataset, alpha: f64) -> Result<AnovaTable> {
    let n_groups = dataset.label_set().len();
    let present = dataset.metadata().present_classes();
    if present.len() < 2 {
        return Err(PipelineError::InsufficientGroups {
            stage: "ANOVA feature selection".to_string(),
            found: present.len(),
            required: 2,
        });
    }

    let matrix = dataset.matrix();
    let labels = dataset.labels();

    let fits: Vec<std::result::Result<AnovaFit, AnovaFailure>> = (0..matrix.n_features())
        .into_par_iter()
        .map(|j| one_way_anova(matrix.feature_values(j), labels, n_groups))
        .collect();

    let mut excluded = Vec::new();
    let mut f_stats = Vec::with_capacity(fits.len());
    let mut pvalues = Vec::with_capacity(fits.len());
    for (j, fit) in fits.into_iter().enumerate() {
        match fit {
            Ok(fit) => {
                f_stats.push(fit.f_statistic);
                pvalues.push(fit.pvalue);
            }
            Err(why) => {
                excluded.push((matrix.feature_ids()[j].clone(), why));
                f_stats.push(f64::NAN);
                pvalues.push(f64::NAN);
            }
        }
    }

    if !excluded.is_empty() {
        log::warn!(
            "{} features could not be tested and were excluded (first: '{}', {})",
            excluded.len(),
            excluded[0].0,
            excluded[0].1
        );
    }

    let padj = benjamini_hochberg(&pvalues);
    let selected: Vec<String> = ascending_order(&pvalues)
        .into_iter()
        .filter(|&j| padj[j].is_finite() && padj[j] < alpha)
        .map(|j| matrix.feature_ids()[j].clone())
        .collect();

    log::info!(
        "ANOVA: {} of {} features with padj < {}",
        selected.len(),
        matrix.n_features(),
        alpha
    );

    let tests = matrix
        .feature_ids()
        .iter()
        .enumerate()
        .map(|(j, feature)| FeatureTest {
            feature: feature.clone(),
            f_statistic: f_stats[j],
            pvalue: pvalues[j],
            padj: padj[j],
        })
        .collect();

    Ok(AnovaTable {
        tests,
        selected,
        excluded,
        alpha,
    })
}
