//! Classification of out-of-study samples with a trained model

use crate::data::LabeledDataset;
use crate::error::Result;
use crate::filter::{CorrelationFilter, FilterOutcome};
use crate::forest::{ConfusionMatrix, TrainedModel};

/// Applies a trained model to independently collected data.
///
/// New data passes through its own correlation filter before being aligned
/// to the model schema. The model is only borrowed.
#[derive(Debug, Clone)]
pub struct ExternalClassifier<'a> {
    model: &'a TrainedModel,
    filter: CorrelationFilter,
}

#[derive(Debug, Clone)]
pub struct ExternalPrediction {
    /// (sample id, predicted label) for every sample that passed QC
    pub predictions: Vec<(String, String)>,
    /// Recorded class of every retained sample, same order
    pub recorded: Vec<String>,
    /// Present when every recorded class is a label the model knows
    pub confusion: Option<ConfusionMatrix>,
    pub qc: FilterOutcome,
}

impl<'a> ExternalClassifier<'a> {
    pub fn new(model: &'a TrainedModel, filter: CorrelationFilter) -> Self {
        Self { model, filter }
    }

    pub fn model(&self) -> &TrainedModel {
        self.model
    }

    /// Filter, align and predict.
    ///
    /// Fails with SchemaMismatch before QC runs if a schema feature is
    /// absent from the new data.
    pub fn classify(&self, dataset: &LabeledDataset) -> Result<ExternalPrediction> {
        dataset.matrix().schema_columns(self.model.feature_schema())?;

        let n_input = dataset.n_samples();
        let qc = self.filter.apply(dataset)?;
        log::info!(
            "External QC kept {} of {} samples",
            qc.dataset.n_samples(),
            n_input
        );

        let aligned = qc.dataset.align_to_schema(self.model.feature_schema())?;
        let predicted = self.model.predict(aligned.matrix())?;

        let label_set = self.model.label_set();
        let predictions: Vec<(String, String)> = aligned
            .sample_ids()
            .iter()
            .zip(&predicted)
            .map(|(id, &c)| (id.clone(), label_set.labels()[c].clone()))
            .collect();

        let recorded: Vec<String> = (0..aligned.n_samples())
            .map(|i| aligned.metadata().class_label(i).to_string())
            .collect();

        let truth: Option<Vec<usize>> = recorded.iter().map(|l| label_set.index_of(l)).collect();
        let confusion = match truth {
            Some(truth) => Some(ConfusionMatrix::from_predictions(
                &truth, &predicted, label_set,
            )?),
            None => {
                log::info!("Recorded classes outside the model label set; no confusion matrix");
                None
            }
        };

        Ok(ExternalPrediction {
            predictions,
            recorded,
            confusion,
            qc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ExpressionMatrix, SampleMetadata};
    use crate::error::PipelineError;
    use crate::forest::{train_forest, ForestParams};
    use crate::rng::RMersenneTwister;
    use ndarray::Array2;

    /// Samples of class c share a class-specific profile plus small noise, so
    /// within-class correlation is high
    fn dataset(classes: &[&str], per_class: usize, features: &[&str], seed: u32) -> LabeledDataset {
        let mut rng = RMersenneTwister::new(seed);
        let n = classes.len() * per_class;
        let p = features.len();
        let profiles: Vec<Vec<f64>> = (0..classes.len())
            .map(|c| {
                let mut profile_rng = RMersenneTwister::new(1000 + c as u32);
                (0..p).map(|_| 3.0 * profile_rng.rnorm()).collect()
            })
            .collect();
        let mut values = Array2::zeros((n, p));
        let mut labels = Vec::new();
        for i in 0..n {
            let c = i / per_class;
            for j in 0..p {
                values[[i, j]] = profiles[c][j] + 0.1 * rng.rnorm();
            }
            labels.push(classes[c].to_string());
        }
        let samples: Vec<String> = (0..n).map(|i| format!("x{}", i)).collect();
        let features: Vec<String> = features.iter().map(|f| f.to_string()).collect();
        let matrix = ExpressionMatrix::new(values, samples.clone(), features).unwrap();
        let metadata = SampleMetadata::new(samples, labels, vec!["b".into(); n], None).unwrap();
        LabeledDataset::new(matrix, metadata).unwrap()
    }

    fn model() -> TrainedModel {
        let train = dataset(&["M0", "IFN"], 6, &["g1", "g2", "g3", "g4", "g5", "g6"], 1);
        let params = ForestParams {
            tree_count: 20,
            max_depth: 5,
            split_candidates: 3,
            min_node_size: 1,
        };
        let weights = vec![1.0; train.n_samples()];
        train_forest(&train, &weights, &params, &mut RMersenneTwister::new(1))
            .unwrap()
            .model
    }

    #[test]
    fn test_classify_with_extra_columns() {
        let model = model();
        let external = dataset(
            &["M0", "IFN"],
            6,
            &["extra", "g6", "g5", "g4", "g3", "g2", "g1"],
            2,
        );
        let classifier = ExternalClassifier::new(&model, CorrelationFilter::default());
        let result = classifier.classify(&external).unwrap();

        assert_eq!(result.predictions.len(), result.recorded.len());
        assert!(!result.predictions.is_empty());
        let confusion = result.confusion.unwrap();
        assert_eq!(confusion.total(), result.predictions.len());
        assert_eq!(confusion.labels(), model.label_set().labels());
    }

    #[test]
    fn test_missing_schema_feature() {
        let model = model();
        let external = dataset(&["M0", "IFN"], 6, &["g1", "g2", "g3", "g4", "g5"], 2);
        let classifier = ExternalClassifier::new(&model, CorrelationFilter::default());
        match classifier.classify(&external).unwrap_err() {
            PipelineError::SchemaMismatch { feature, .. } => assert_eq!(feature, "g6"),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_missing_schema_feature_reported_before_qc() {
        let model = model();
        // 4 samples per class is below the default minimum group size
        let external = dataset(&["M0", "IFN"], 4, &["g1", "g2", "g3", "g4", "g5"], 2);
        let classifier = ExternalClassifier::new(&model, CorrelationFilter::default());
        match classifier.classify(&external).unwrap_err() {
            PipelineError::SchemaMismatch { feature, .. } => assert_eq!(feature, "g6"),
            other => panic!("unexpected error {other}"),
        }

        let complete = dataset(&["M0", "IFN"], 4, &["g1", "g2", "g3", "g4", "g5", "g6"], 2);
        assert!(matches!(
            classifier.classify(&complete),
            Err(PipelineError::InsufficientGroups { .. })
        ));
    }

    #[test]
    fn test_unknown_labels_skip_confusion() {
        let model = model();
        let external = dataset(&["M0", "novel"], 6, &["g1", "g2", "g3", "g4", "g5", "g6"], 3);
        let classifier = ExternalClassifier::new(&model, CorrelationFilter::default());
        let result = classifier.classify(&external).unwrap();
        assert!(result.confusion.is_none());
        assert!(result.recorded.iter().any(|l| l == "novel"));
    }
}
