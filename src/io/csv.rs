//! Delimited-text reading and writing for expression tables, metadata and
//! pipeline reports

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ndarray::Array2;

use crate::data::{ExpressionMatrix, LabelSet, SampleMetadata};
use crate::error::{PipelineError, Result};
use crate::filter::FilterOutcome;
use crate::forest::{ConfusionMatrix, FeatureImportance};
use crate::predict::ExternalPrediction;
use crate::pruning::RoundRecord;
use crate::testing::AnovaTable;

/// Tab if the header line contains one, comma otherwise
fn detect_delimiter<P: AsRef<Path>>(path: P) -> Result<u8> {
    let file = File::open(path)?;
    let mut header_line = String::new();
    BufReader::new(file).read_line(&mut header_line)?;
    if header_line.trim().is_empty() {
        return Err(PipelineError::EmptyData {
            reason: "Empty input file".to_string(),
        });
    }
    Ok(if header_line.contains('\t') { b'\t' } else { b',' })
}

fn reader<P: AsRef<Path>>(path: P) -> Result<csv::Reader<File>> {
    let delimiter = detect_delimiter(&path)?;
    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_path(path)?)
}

fn tsv_writer<P: AsRef<Path>>(path: P) -> Result<csv::Writer<File>> {
    Ok(csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?)
}

fn fmt_float(x: f64) -> String {
    if x.is_nan() {
        "NA".to_string()
    } else {
        format!("{:.6}", x)
    }
}

fn fmt_pvalue(x: f64) -> String {
    if x.is_nan() {
        "NA".to_string()
    } else {
        format!("{:.6e}", x)
    }
}

/// Read an expression table.
///
/// Default layout: first column sample ids, header row feature ids. With
/// `features_as_rows` the table is features x samples (first column feature
/// ids, header row sample ids).
pub fn read_expression_matrix<P: AsRef<Path>>(
    path: P,
    features_as_rows: bool,
) -> Result<ExpressionMatrix> {
    let mut rdr = reader(&path)?;
    let header = rdr.headers()?.clone();
    if header.len() < 2 {
        return Err(PipelineError::InvalidExpressionMatrix {
            reason: "Not enough columns in header".to_string(),
        });
    }
    let column_ids: Vec<String> = header.iter().skip(1).map(str::to_string).collect();

    let mut row_ids: Vec<String> = Vec::new();
    let mut data: Vec<f64> = Vec::new();
    for record in rdr.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let row_id = record.get(0).unwrap_or_default().to_string();
        for (j, field) in record.iter().skip(1).enumerate() {
            let value = field.parse::<f64>().map_err(|_| PipelineError::InvalidExpressionMatrix {
                reason: format!(
                    "Invalid value '{}' at row '{}', column '{}'",
                    field, row_id, column_ids[j]
                ),
            })?;
            data.push(value);
        }
        row_ids.push(row_id);
    }

    if row_ids.is_empty() {
        return Err(PipelineError::EmptyData {
            reason: "No data rows found in expression table".to_string(),
        });
    }

    let values = Array2::from_shape_vec((row_ids.len(), column_ids.len()), data).map_err(|e| {
        PipelineError::InvalidExpressionMatrix {
            reason: e.to_string(),
        }
    })?;

    if features_as_rows {
        ExpressionMatrix::from_features_by_samples(values, row_ids, column_ids)
    } else {
        ExpressionMatrix::new(values, row_ids, column_ids)
    }
}

/// Read sample metadata: first column sample ids, plus named class and batch
/// columns. Other columns are ignored.
pub fn read_metadata<P: AsRef<Path>>(
    path: P,
    class_column: &str,
    batch_column: &str,
    label_set: Option<LabelSet>,
) -> Result<SampleMetadata> {
    let mut rdr = reader(&path)?;
    let header = rdr.headers()?.clone();
    let position = |name: &str| {
        header
            .iter()
            .skip(1)
            .position(|h| h == name)
            .map(|p| p + 1)
            .ok_or_else(|| PipelineError::InvalidMetadata {
                reason: format!(
                    "Column '{}' not found in metadata. Available: {:?}",
                    name,
                    header.iter().skip(1).collect::<Vec<_>>()
                ),
            })
    };
    let class_idx = position(class_column)?;
    let batch_idx = position(batch_column)?;

    let mut sample_ids = Vec::new();
    let mut classes = Vec::new();
    let mut batches = Vec::new();
    for record in rdr.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        sample_ids.push(record.get(0).unwrap_or_default().to_string());
        classes.push(record.get(class_idx).unwrap_or_default().to_string());
        batches.push(record.get(batch_idx).unwrap_or_default().to_string());
    }

    if sample_ids.is_empty() {
        return Err(PipelineError::EmptyData {
            reason: "No samples found in metadata".to_string(),
        });
    }

    SampleMetadata::new(sample_ids, classes, batches, label_set)
}

/// Samples retained by correlation QC, with class and batch
pub fn write_retained_samples<P: AsRef<Path>>(path: P, outcome: &FilterOutcome) -> Result<()> {
    let mut wtr = tsv_writer(path)?;
    wtr.write_record(["sample_id", "class", "batch"])?;
    for group in &outcome.groups {
        for (sample, batch) in &group.retained {
            wtr.write_record([sample.as_str(), group.class.as_str(), batch.as_str()])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// ANOVA results for every feature
pub fn write_selection<P: AsRef<Path>>(path: P, table: &AnovaTable) -> Result<()> {
    let mut wtr = tsv_writer(path)?;
    wtr.write_record(["feature", "F", "pvalue", "padj", "selected"])?;
    for test in &table.tests {
        let selected = test.padj.is_finite() && test.padj < table.alpha;
        wtr.write_record([
            test.feature.clone(),
            fmt_float(test.f_statistic),
            fmt_pvalue(test.pvalue),
            fmt_pvalue(test.padj),
            selected.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Final features ranked by importance
pub fn write_importance<P: AsRef<Path>>(path: P, importance: &FeatureImportance) -> Result<()> {
    let mut wtr = tsv_writer(path)?;
    wtr.write_record(["rank", "feature", "importance"])?;
    for (rank, (feature, score)) in importance.ranked().into_iter().enumerate() {
        wtr.write_record([(rank + 1).to_string(), feature.to_string(), fmt_float(score)])?;
    }
    wtr.flush()?;
    Ok(())
}

/// One row per pruning round; per-class balanced accuracy in label order
pub fn write_round_metrics<P: AsRef<Path>>(path: P, rounds: &[RoundRecord]) -> Result<()> {
    let mut wtr = tsv_writer(path)?;
    let labels: Vec<String> = rounds
        .first()
        .map(|r| r.performance.confusion.labels().to_vec())
        .unwrap_or_default();

    let mut header = vec![
        "round".to_string(),
        "n_features".to_string(),
        "split_candidates".to_string(),
        "accuracy".to_string(),
        "kappa".to_string(),
    ];
    header.extend(labels.iter().map(|l| format!("balanced_accuracy_{}", l)));
    wtr.write_record(&header)?;

    for round in rounds {
        let mut row = vec![
            round.index.to_string(),
            round.n_features.to_string(),
            round.split_candidates.to_string(),
            fmt_float(round.performance.accuracy),
            fmt_float(round.performance.kappa),
        ];
        row.extend(
            round
                .performance
                .per_class
                .iter()
                .map(|m| fmt_float(m.balanced_accuracy)),
        );
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_predictions<P: AsRef<Path>>(path: P, prediction: &ExternalPrediction) -> Result<()> {
    let mut wtr = tsv_writer(path)?;
    wtr.write_record(["sample_id", "predicted", "recorded"])?;
    for ((sample, predicted), recorded) in prediction.predictions.iter().zip(&prediction.recorded) {
        wtr.write_record([sample, predicted, recorded])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Confusion matrix with true classes as rows
pub fn write_confusion<P: AsRef<Path>>(path: P, confusion: &ConfusionMatrix) -> Result<()> {
    let mut wtr = tsv_writer(path)?;
    let mut header = vec!["true\\predicted".to_string()];
    header.extend(confusion.labels().iter().cloned());
    wtr.write_record(&header)?;
    for (label, row) in confusion.labels().iter().zip(confusion.counts().rows()) {
        let mut record = vec![label.clone()];
        record.extend(row.iter().map(|c| c.to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}
