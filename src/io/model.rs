//! JSON persistence of trained models

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::data::LabelSet;
use crate::error::{PipelineError, Result};
use crate::forest::TrainedModel;

pub fn save_model<P: AsRef<Path>>(path: P, model: &TrainedModel) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, model)?;
    writer.flush()?;
    Ok(())
}

/// Load and validate a model written by [`save_model`]
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<TrainedModel> {
    let reader = BufReader::new(File::open(path)?);
    let model: TrainedModel = serde_json::from_reader(reader)?;
    if model.label_set().version() != LabelSet::VERSION {
        return Err(PipelineError::InvalidInput {
            reason: format!(
                "model label set has version {}, this build reads version {}",
                model.label_set().version(),
                LabelSet::VERSION
            ),
        });
    }
    model.validate()?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ExpressionMatrix, LabeledDataset, SampleMetadata};
    use crate::forest::{train_forest, ForestParams};
    use crate::rng::RMersenneTwister;
    use ndarray::array;
    use tempfile::NamedTempFile;

    #[test]
    fn test_model_round_trip_predicts_identically() {
        let matrix = ExpressionMatrix::new(
            array![[0.0, 1.0], [0.2, 0.9], [5.0, 1.1], [5.3, 0.8], [0.1, 1.2], [4.9, 1.0]],
            (1..=6).map(|i| format!("s{}", i)).collect(),
            vec!["g1".into(), "g2".into()],
        )
        .unwrap();
        let metadata = SampleMetadata::new(
            matrix.sample_ids().to_vec(),
            ["M0", "M0", "LPS", "LPS", "M0", "LPS"].iter().map(|s| s.to_string()).collect(),
            vec!["b1".into(); 6],
            None,
        )
        .unwrap();
        let data = LabeledDataset::new(matrix, metadata).unwrap();
        let params = ForestParams {
            tree_count: 10,
            max_depth: 4,
            split_candidates: 1,
            min_node_size: 1,
        };
        let model = train_forest(&data, &[1.0; 6], &params, &mut RMersenneTwister::new(3))
            .unwrap()
            .model;

        let file = NamedTempFile::new().unwrap();
        save_model(file.path(), &model).unwrap();
        let loaded = load_model(file.path()).unwrap();

        assert_eq!(loaded.feature_schema(), model.feature_schema());
        assert_eq!(loaded.label_set(), model.label_set());
        assert_eq!(
            loaded.predict(data.matrix()).unwrap(),
            model.predict(data.matrix()).unwrap()
        );
    }

    fn write_model_json(trees: &str) -> NamedTempFile {
        let json = format!(
            "{{\"trees\":{},\"feature_schema\":[\"g1\",\"g2\"],\
             \"params\":{{\"tree_count\":1,\"max_depth\":2,\"split_candidates\":1,\
             \"min_node_size\":1}},\"label_set\":{{\"version\":1,\"labels\":[\"A\",\"B\"]}}}}",
            trees
        );
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), json).unwrap();
        file
    }

    #[test]
    fn test_load_accepts_well_formed_tree() {
        let file = write_model_json(
            r#"[{"nodes":[{"Split":{"feature":1,"threshold":0.5,"left":1,"right":2}},
                {"Leaf":{"class":0}},{"Leaf":{"class":1}}]}]"#,
        );
        let model = load_model(file.path()).unwrap();
        let matrix = ExpressionMatrix::new(
            array![[0.0, 0.2], [0.0, 0.9]],
            vec!["s1".into(), "s2".into()],
            vec!["g1".into(), "g2".into()],
        )
        .unwrap();
        assert_eq!(model.predict(&matrix).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_load_rejects_leaf_class_outside_label_set() {
        let file = write_model_json(r#"[{"nodes":[{"Leaf":{"class":7}}]}]"#);
        assert!(matches!(load_model(file.path()), Err(PipelineError::InvalidInput { .. })));
    }

    #[test]
    fn test_load_rejects_empty_tree() {
        let file = write_model_json(r#"[{"nodes":[]}]"#);
        assert!(matches!(load_model(file.path()), Err(PipelineError::InvalidInput { .. })));
    }

    #[test]
    fn test_load_rejects_bad_child_index() {
        let beyond = write_model_json(
            r#"[{"nodes":[{"Split":{"feature":0,"threshold":0.5,"left":1,"right":5}},
                {"Leaf":{"class":0}}]}]"#,
        );
        assert!(matches!(load_model(beyond.path()), Err(PipelineError::InvalidInput { .. })));

        // A child pointing back at its parent would loop forever
        let cycle = write_model_json(
            r#"[{"nodes":[{"Split":{"feature":0,"threshold":0.5,"left":0,"right":1}},
                {"Leaf":{"class":1}}]}]"#,
        );
        assert!(matches!(load_model(cycle.path()), Err(PipelineError::InvalidInput { .. })));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "{\"trees\": 3}").unwrap();
        assert!(matches!(load_model(file.path()), Err(PipelineError::JsonError(_))));
    }
}
