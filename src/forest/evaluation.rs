//! Confusion matrix and per-class one-vs-rest metrics

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::ensemble::TrainedModel;
use crate::data::{LabelSet, LabeledDataset};
use crate::error::{PipelineError, Result};
use crate::stats::safe_ratio;

/// Rows are true classes, columns predicted classes, both in label-set order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    labels: Vec<String>,
    counts: Array2<usize>,
}

/// One-vs-rest statistics for one class; undefined ratios are NaN
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class: String,
    pub support: usize,
    pub sensitivity: f64,
    pub specificity: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub balanced_accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub confusion: ConfusionMatrix,
    pub accuracy: f64,
    pub kappa: f64,
    pub per_class: Vec<ClassMetrics>,
}

impl ConfusionMatrix {
    pub fn from_predictions(
        truth: &[usize],
        predicted: &[usize],
        label_set: &LabelSet,
    ) -> Result<Self> {
        if truth.len() != predicted.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} predictions", truth.len()),
                got: format!("{} predictions", predicted.len()),
            });
        }
        let k = label_set.len();
        let mut counts = Array2::zeros((k, k));
        for (&t, &p) in truth.iter().zip(predicted) {
            if t >= k || p >= k {
                return Err(PipelineError::InvalidInput {
                    reason: format!("class id {} outside the {}-label set", t.max(p), k),
                });
            }
            counts[[t, p]] += 1;
        }
        Ok(Self {
            labels: label_set.labels().to_vec(),
            counts,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn counts(&self) -> &Array2<usize> {
        &self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.sum()
    }

    /// Diagonal sum
    pub fn correct(&self) -> usize {
        self.counts.diag().sum()
    }

    /// True-class counts
    pub fn row_sums(&self) -> Vec<usize> {
        self.counts.rows().into_iter().map(|r| r.sum()).collect()
    }

    /// Predicted-class counts
    pub fn col_sums(&self) -> Vec<usize> {
        self.counts.columns().into_iter().map(|c| c.sum()).collect()
    }

    pub fn accuracy(&self) -> f64 {
        safe_ratio(self.correct() as f64, self.total() as f64)
    }

    /// Cohen's kappa: (p_o - p_e) / (1 - p_e)
    pub fn kappa(&self) -> f64 {
        let n = self.total() as f64;
        if n == 0.0 {
            return f64::NAN;
        }
        let observed = self.correct() as f64 / n;
        let expected: f64 = self
            .row_sums()
            .iter()
            .zip(self.col_sums())
            .map(|(&r, c)| (r as f64 / n) * (c as f64 / n))
            .sum();
        safe_ratio(observed - expected, 1.0 - expected)
    }

    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        let n = self.total();
        let rows = self.row_sums();
        let cols = self.col_sums();
        (0..self.labels.len())
            .map(|c| {
                let tp = self.counts[[c, c]];
                let fn_ = rows[c] - tp;
                let fp = cols[c] - tp;
                let tn = n - tp - fn_ - fp;

                let sensitivity = safe_ratio(tp as f64, (tp + fn_) as f64);
                let specificity = safe_ratio(tn as f64, (tn + fp) as f64);
                let precision = safe_ratio(tp as f64, (tp + fp) as f64);
                let f1 = safe_ratio(2.0 * precision * sensitivity, precision + sensitivity);

                ClassMetrics {
                    class: self.labels[c].clone(),
                    support: rows[c],
                    sensitivity,
                    specificity,
                    precision,
                    recall: sensitivity,
                    f1,
                    balanced_accuracy: 0.5 * (sensitivity + specificity),
                }
            })
            .collect()
    }

    pub fn performance(&self) -> PerformanceRecord {
        PerformanceRecord {
            confusion: self.clone(),
            accuracy: self.accuracy(),
            kappa: self.kappa(),
            per_class: self.class_metrics(),
        }
    }
}

impl std::fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:>12}", "true\\pred")?;
        for label in &self.labels {
            write!(f, " {:>10}", label)?;
        }
        writeln!(f)?;
        for (label, row) in self.labels.iter().zip(self.counts.rows()) {
            write!(f, "{:>12}", label)?;
            for count in row {
                write!(f, " {:>10}", count)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for PerformanceRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        write!(f, "{}", self.confusion)?;
        writeln!(
            f,
            "accuracy: {:.4} ({}/{})  kappa: {:.4}",
            self.accuracy,
            self.confusion.correct(),
            self.confusion.total(),
            self.kappa
        )?;
        for m in &self.per_class {
            writeln!(
                f,
                "  {:<12} n={:<4} sens={:.3} spec={:.3} prec={:.3} f1={:.3} bal_acc={:.3}",
                m.class,
                m.support,
                m.sensitivity,
                m.specificity,
                m.precision,
                m.f1,
                m.balanced_accuracy
            )?;
        }
        Ok(())
    }
}

/// Predict the held-out set and score it
pub fn evaluate(model: &TrainedModel, test: &LabeledDataset) -> Result<PerformanceRecord> {
    let predicted = model.predict(test.matrix())?;
    let confusion =
        ConfusionMatrix::from_predictions(test.labels(), &predicted, model.label_set())?;
    Ok(confusion.performance())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn labels() -> LabelSet {
        LabelSet::new(vec!["M0".into(), "IFN".into(), "LPS".into()]).unwrap()
    }

    #[test]
    fn test_confusion_counts() {
        let truth = [0, 0, 0, 1, 1, 2, 2, 2];
        let predicted = [0, 0, 1, 1, 1, 2, 2, 0];
        let cm = ConfusionMatrix::from_predictions(&truth, &predicted, &labels()).unwrap();

        assert_eq!(cm.counts(), &array![[2, 1, 0], [0, 2, 0], [1, 0, 2]]);
        assert_eq!(cm.total(), 8);
        assert_eq!(cm.correct(), 6);
        assert_eq!(cm.row_sums(), vec![3, 2, 3]);
        assert!((cm.accuracy() - 0.75).abs() < 1e-10);
    }

    #[test]
    fn test_class_metrics() {
        let truth = [0, 0, 0, 1, 1, 2, 2, 2];
        let predicted = [0, 0, 1, 1, 1, 2, 2, 0];
        let cm = ConfusionMatrix::from_predictions(&truth, &predicted, &labels()).unwrap();
        let m0 = &cm.class_metrics()[0];

        // tp 2, fn 1, fp 1, tn 4
        assert_eq!(m0.support, 3);
        assert!((m0.sensitivity - 2.0 / 3.0).abs() < 1e-10);
        assert!((m0.specificity - 0.8).abs() < 1e-10);
        assert!((m0.precision - 2.0 / 3.0).abs() < 1e-10);
        assert!((m0.f1 - 2.0 / 3.0).abs() < 1e-10);
        assert!((m0.balanced_accuracy - (2.0 / 3.0 + 0.8) / 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_kappa() {
        // p_o = 0.75, p_e = (3*3 + 2*3 + 3*2) / 64
        let truth = [0, 0, 0, 1, 1, 2, 2, 2];
        let predicted = [0, 0, 1, 1, 1, 2, 2, 0];
        let cm = ConfusionMatrix::from_predictions(&truth, &predicted, &labels()).unwrap();
        let pe = 21.0 / 64.0;
        assert!((cm.kappa() - (0.75 - pe) / (1.0 - pe)).abs() < 1e-10);
    }

    #[test]
    fn test_absent_class_metrics_nan() {
        let cm = ConfusionMatrix::from_predictions(&[0, 1], &[0, 1], &labels()).unwrap();
        let lps = &cm.class_metrics()[2];
        assert_eq!(lps.support, 0);
        assert!(lps.sensitivity.is_nan());
        assert!(lps.precision.is_nan());
        assert!((lps.specificity - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_out_of_range_class_rejected() {
        assert!(ConfusionMatrix::from_predictions(&[0], &[3], &labels()).is_err());
        assert!(ConfusionMatrix::from_predictions(&[0, 1], &[0], &labels()).is_err());
    }
}
