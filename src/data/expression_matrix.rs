//! Expression matrix representation for normalized, log-scale data

use std::collections::{HashMap, HashSet};

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{PipelineError, Result};

/// Deduplicate feature names by appending _1, _2, etc. to repeats
fn deduplicate_names(names: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for name in &names {
        *seen.entry(name.clone()).or_insert(0) += 1;
    }
    if !seen.values().any(|&c| c > 1) {
        return names;
    }
    seen.clear();
    let mut result = Vec::with_capacity(names.len());
    for name in names {
        let count = seen.entry(name.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            result.push(name);
        } else {
            let new_name = format!("{}_{}", name, *count - 1);
            log::warn!("Duplicate feature name '{}' renamed to '{}'", name, new_name);
            result.push(new_name);
        }
    }
    result
}

/// A normalized expression matrix.
/// Rows are samples, columns are features.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionMatrix {
    /// Expression values (samples x features)
    values: Array2<f64>,
    /// Sample identifiers (row keys)
    sample_ids: Vec<String>,
    /// Feature identifiers (column keys)
    feature_ids: Vec<String>,
}

impl ExpressionMatrix {
    /// Create a new expression matrix from a samples x features array
    pub fn new(
        values: Array2<f64>,
        sample_ids: Vec<String>,
        feature_ids: Vec<String>,
    ) -> Result<Self> {
        let (n_samples, n_features) = values.dim();

        if sample_ids.len() != n_samples {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} sample IDs", n_samples),
                got: format!("{} sample IDs", sample_ids.len()),
            });
        }

        if feature_ids.len() != n_features {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} feature IDs", n_features),
                got: format!("{} feature IDs", feature_ids.len()),
            });
        }

        if let Some(((i, j), _)) = values.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(PipelineError::InvalidExpressionMatrix {
                reason: format!(
                    "non-finite value for sample '{}', feature '{}'",
                    sample_ids[i], feature_ids[j]
                ),
            });
        }

        let mut seen = HashSet::with_capacity(n_samples);
        for id in &sample_ids {
            if !seen.insert(id.as_str()) {
                return Err(PipelineError::InvalidExpressionMatrix {
                    reason: format!("duplicate sample ID '{}'", id),
                });
            }
        }

        let feature_ids = deduplicate_names(feature_ids);

        Ok(Self {
            values,
            sample_ids,
            feature_ids,
        })
    }

    /// Create from a features x samples array (genes as rows, the usual
    /// layout of expression tables written by upstream tools)
    pub fn from_features_by_samples(
        values: Array2<f64>,
        feature_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        Self::new(values.reversed_axes().as_standard_layout().to_owned(), sample_ids, feature_ids)
    }

    pub fn n_samples(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }

    /// Get the expression values as a view
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    /// Values of one sample across all features
    pub fn sample_values(&self, sample_idx: usize) -> ArrayView1<'_, f64> {
        self.values.row(sample_idx)
    }

    /// Values of one feature across all samples
    pub fn feature_values(&self, feature_idx: usize) -> ArrayView1<'_, f64> {
        self.values.column(feature_idx)
    }

    pub fn feature_index(&self, feature_id: &str) -> Option<usize> {
        self.feature_ids.iter().position(|id| id == feature_id)
    }

    pub fn sample_index(&self, sample_id: &str) -> Option<usize> {
        self.sample_ids.iter().position(|id| id == sample_id)
    }

    /// Subset to specific samples (rows), in the order given
    pub fn subset_samples(&self, sample_indices: &[usize]) -> Result<Self> {
        let new_values = self.values.select(Axis(0), sample_indices);
        let new_sample_ids: Vec<String> = sample_indices
            .iter()
            .map(|&i| self.sample_ids[i].clone())
            .collect();

        Self::new(new_values, new_sample_ids, self.feature_ids.clone())
    }

    /// Subset to specific features (columns), in the order given
    pub fn subset_features(&self, feature_indices: &[usize]) -> Result<Self> {
        let new_values = self.values.select(Axis(1), feature_indices);
        let new_feature_ids: Vec<String> = feature_indices
            .iter()
            .map(|&i| self.feature_ids[i].clone())
            .collect();

        Self::new(new_values, self.sample_ids.clone(), new_feature_ids)
    }

    /// Restrict and reorder columns to exactly `schema`.
    ///
    /// Every schema feature must be present; all missing ones are named in
    /// the error.
    pub fn align_to_schema(&self, schema: &[String]) -> Result<Self> {
        let columns = self.schema_columns(schema)?;
        self.subset_features(&columns)
    }

    /// Column of every schema feature, in schema order
    pub fn schema_columns(&self, schema: &[String]) -> Result<Vec<usize>> {
        let index: HashMap<&str, usize> = self
            .feature_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut columns = Vec::with_capacity(schema.len());
        let mut missing = Vec::new();
        for feature in schema {
            match index.get(feature.as_str()) {
                Some(&j) => columns.push(j),
                None => missing.push(feature.as_str()),
            }
        }

        if !missing.is_empty() {
            return Err(PipelineError::SchemaMismatch {
                feature: missing[0].to_string(),
                reason: format!(
                    "{} of {} schema features absent from the matrix: {:?}",
                    missing.len(),
                    schema.len(),
                    missing
                ),
            });
        }

        Ok(columns)
    }

    /// Fail unless the columns are exactly `schema`, in order
    pub fn check_schema(&self, schema: &[String]) -> Result<()> {
        for (pos, expected) in schema.iter().enumerate() {
            match self.feature_ids.get(pos) {
                Some(got) if got == expected => {}
                Some(got) => {
                    return Err(PipelineError::SchemaMismatch {
                        feature: expected.clone(),
                        reason: format!("column {} holds '{}' instead", pos, got),
                    })
                }
                None => {
                    return Err(PipelineError::SchemaMismatch {
                        feature: expected.clone(),
                        reason: format!(
                            "matrix has only {} features, schema has {}",
                            self.n_features(),
                            schema.len()
                        ),
                    })
                }
            }
        }
        if self.n_features() > schema.len() {
            return Err(PipelineError::SchemaMismatch {
                feature: self.feature_ids[schema.len()].clone(),
                reason: format!(
                    "feature not in the {}-feature schema",
                    schema.len()
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{}{}", prefix, i + 1)).collect()
    }

    #[test]
    fn test_expression_matrix_creation() {
        let values = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let matrix = ExpressionMatrix::new(values, ids("s", 2), ids("g", 3)).unwrap();
        assert_eq!(matrix.n_samples(), 2);
        assert_eq!(matrix.n_features(), 3);
        assert_eq!(matrix.feature_values(1).to_vec(), vec![2.0, 5.0]);
    }

    #[test]
    fn test_non_finite_rejected() {
        let values = array![[1.0, f64::NAN], [4.0, 5.0]];
        let err = ExpressionMatrix::new(values, ids("s", 2), ids("g", 2)).unwrap_err();
        assert!(err.to_string().contains("g2"));
    }

    #[test]
    fn test_duplicate_features_renamed() {
        let values = array![[1.0, 2.0], [3.0, 4.0]];
        let matrix =
            ExpressionMatrix::new(values, ids("s", 2), vec!["a".into(), "a".into()]).unwrap();
        assert_eq!(matrix.feature_ids(), &["a".to_string(), "a_1".to_string()]);
    }

    #[test]
    fn test_transposed_constructor() {
        let values = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let matrix =
            ExpressionMatrix::from_features_by_samples(values, ids("g", 2), ids("s", 3)).unwrap();
        assert_eq!(matrix.n_samples(), 3);
        assert_eq!(matrix.sample_values(2).to_vec(), vec![3.0, 6.0]);
    }

    #[test]
    fn test_align_to_schema_reorders() {
        let values = array![[1.0, 2.0, 3.0]];
        let matrix = ExpressionMatrix::new(values, ids("s", 1), ids("g", 3)).unwrap();
        let aligned = matrix
            .align_to_schema(&["g3".to_string(), "g1".to_string()])
            .unwrap();
        assert_eq!(aligned.feature_ids(), &["g3".to_string(), "g1".to_string()]);
        assert_eq!(aligned.sample_values(0).to_vec(), vec![3.0, 1.0]);
    }

    #[test]
    fn test_align_to_schema_missing_feature() {
        let values = array![[1.0, 2.0]];
        let matrix = ExpressionMatrix::new(values, ids("s", 1), ids("g", 2)).unwrap();
        let err = matrix
            .align_to_schema(&["g1".to_string(), "g9".to_string()])
            .unwrap_err();
        match err {
            PipelineError::SchemaMismatch { feature, .. } => assert_eq!(feature, "g9"),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_check_schema_rejects_reordering() {
        let values = array![[1.0, 2.0]];
        let matrix = ExpressionMatrix::new(values, ids("s", 1), ids("g", 2)).unwrap();
        assert!(matrix.check_schema(&ids("g", 2)).is_ok());
        assert!(matrix
            .check_schema(&["g2".to_string(), "g1".to_string()])
            .is_err());
        assert!(matrix.check_schema(&ids("g", 1)).is_err());
    }
}
