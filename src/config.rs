//! Pipeline configuration, loadable from JSON

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::filter::{CorrelationFilter, Linkage};
use crate::pruning::PruningConfig;

/// Every tunable of a pipeline run. Missing JSON keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub correlation_cut_height: f64,
    pub min_group_size: usize,
    pub linkage: Linkage,
    pub anova_alpha: f64,
    pub tree_count: usize,
    pub max_depth: usize,
    pub split_candidates: Option<usize>,
    pub min_node_size: usize,
    pub train_fraction: f64,
    pub prune_schedule: Vec<usize>,
    pub max_rounds: Option<usize>,
    pub random_seed: u32,
    /// Explicit label order; `None` uses first appearance in the metadata
    pub label_order: Option<Vec<String>>,
    /// Worker threads, 0 for all cores
    pub threads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            correlation_cut_height: 0.25,
            min_group_size: 5,
            linkage: Linkage::Complete,
            anova_alpha: 0.05,
            tree_count: 1500,
            max_depth: 15,
            split_candidates: None,
            min_node_size: 1,
            train_fraction: 0.7,
            prune_schedule: vec![10000, 1000],
            max_rounds: None,
            random_seed: 42,
            label_order: None,
            threads: 0,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no stage can run with
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(PipelineError::InvalidInput { reason });

        if !(self.correlation_cut_height >= 0.0 && self.correlation_cut_height <= 2.0) {
            return invalid(format!(
                "correlation_cut_height must be in [0, 2], got {}",
                self.correlation_cut_height
            ));
        }
        if !(self.anova_alpha > 0.0 && self.anova_alpha <= 1.0) {
            return invalid(format!("anova_alpha must be in (0, 1], got {}", self.anova_alpha));
        }
        if self.tree_count == 0 {
            return invalid("tree_count must be > 0".to_string());
        }
        if self.split_candidates == Some(0) {
            return invalid("split_candidates must be > 0".to_string());
        }
        if self.min_node_size == 0 {
            return invalid("min_node_size must be > 0".to_string());
        }
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return invalid(format!(
                "train_fraction must be in (0, 1), got {}",
                self.train_fraction
            ));
        }
        if self.prune_schedule.contains(&0) {
            return invalid("prune_schedule entries must be > 0".to_string());
        }
        Ok(())
    }

    pub fn correlation_filter(&self) -> CorrelationFilter {
        CorrelationFilter {
            cut_height: self.correlation_cut_height,
            min_group_size: self.min_group_size,
            linkage: self.linkage,
        }
    }

    pub fn pruning(&self) -> PruningConfig {
        PruningConfig {
            tree_count: self.tree_count,
            max_depth: self.max_depth,
            split_candidates: self.split_candidates,
            min_node_size: self.min_node_size,
            schedule: self.prune_schedule.clone(),
            max_rounds: self.max_rounds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_json_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"tree_count": 200, "linkage": "average", "prune_schedule": [50, 5]}}"#
        )
        .unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.tree_count, 200);
        assert_eq!(config.linkage, Linkage::Average);
        assert_eq!(config.prune_schedule, vec![50, 5]);
        assert_eq!(config.random_seed, 42);
        assert!((config.correlation_cut_height - 0.25).abs() < 1e-10);
        assert!(config.split_candidates.is_none());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"trees": 10}}"#).unwrap();
        assert!(matches!(
            PipelineConfig::from_json_file(file.path()),
            Err(PipelineError::JsonError(_))
        ));
    }

    #[test]
    fn test_validate() {
        let config = PipelineConfig {
            train_fraction: 1.5,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_converters() {
        let config = PipelineConfig {
            min_group_size: 3,
            max_rounds: Some(1),
            ..PipelineConfig::default()
        };
        assert_eq!(config.correlation_filter().min_group_size, 3);
        assert_eq!(config.pruning().max_rounds, Some(1));
        assert_eq!(config.pruning().schedule, vec![10000, 1000]);
    }
}
