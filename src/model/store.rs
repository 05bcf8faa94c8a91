use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::{DetectorError, Result};
use crate::features::FeatureSchema;
use crate::model::OutlierModel;
use crate::model::isolation::IsolationForest;

pub const MODEL_FILE: &str = "isolation_forest.json";
pub const COLUMNS_FILE: &str = "model_columns.json";

/// The fitted model and the schema it was fit against; always saved and loaded together.
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub schema: FeatureSchema,
    pub model: IsolationForest,
}

impl ModelArtifacts {
    pub fn new(schema: FeatureSchema, model: IsolationForest) -> Result<Self> {
        check_in_sync(&schema, &model)?;
        Ok(Self { schema, model })
    }

    /// Write both artifacts under `dir`. Each file is written to a temporary
    /// sibling first and renamed into place.
    pub fn save(&self, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(dir).map_err(|e| DetectorError::io(dir, e))?;
        let model_path = dir.join(MODEL_FILE);
        let columns_path = dir.join(COLUMNS_FILE);
        write_json(&model_path, &self.model)?;
        write_json(&columns_path, &self.schema)?;
        info!("Saved model -> {}", model_path.display());
        info!("Saved model columns -> {}", columns_path.display());
        Ok((model_path, columns_path))
    }

    /// Load both artifacts from `dir`; a missing or mismatched pair is fatal.
    pub fn load(dir: &Path) -> Result<Self> {
        let model_path = dir.join(MODEL_FILE);
        let columns_path = dir.join(COLUMNS_FILE);
        for path in [&model_path, &columns_path] {
            if !path.exists() {
                return Err(DetectorError::ArtifactMissing(path.clone()));
            }
        }

        let model: IsolationForest = read_json(&model_path)?;
        let schema: FeatureSchema = read_json(&columns_path)?;
        let artifacts = Self::new(schema, model)?;
        info!(
            columns = artifacts.schema.len(),
            "Loaded model artifacts from {}",
            dir.display()
        );
        Ok(artifacts)
    }
}

fn check_in_sync(schema: &FeatureSchema, model: &IsolationForest) -> Result<()> {
    match model.n_features() {
        Some(n) if n == schema.len() => Ok(()),
        Some(n) => Err(DetectorError::SchemaMismatch(format!(
            "model expects {n} features but schema lists {} columns",
            schema.len()
        ))),
        None => Err(DetectorError::SchemaMismatch(
            "model artifact is not fitted".into(),
        )),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let body = serde_json::to_string_pretty(value)?;
    fs::write(&tmp, body).map_err(|e| DetectorError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| DetectorError::io(path, e))?;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|e| DetectorError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| {
        DetectorError::SchemaMismatch(format!("cannot decode {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureRow, TrainingMatrix};
    use ndarray::Array2;

    fn fitted(n_features: usize) -> IsolationForest {
        let rows = 12;
        let data = Array2::from_shape_fn((rows, n_features), |(r, c)| ((r + c) % 2) as f64);
        let matrix = TrainingMatrix {
            timestamps: (0..rows).map(|i| format!("t{i:02}")).collect(),
            data,
        };
        let mut model = IsolationForest::default();
        model.fit(&matrix).unwrap();
        model
    }

    fn schema(n: usize) -> FeatureSchema {
        FeatureSchema::new((0..n).map(|i| format!("LS{i}")).collect()).unwrap()
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ModelArtifacts::new(schema(3), fitted(3)).unwrap();
        artifacts.save(dir.path()).unwrap();

        let loaded = ModelArtifacts::load(dir.path()).unwrap();
        assert_eq!(loaded.schema, artifacts.schema);
        let row = FeatureRow {
            values: vec![1.0, 0.0, 1.0],
        };
        assert_eq!(
            loaded.model.score(&row).unwrap().label,
            artifacts.model.score(&row).unwrap().label
        );
        assert!(!dir.path().join("isolation_forest.json.tmp").exists());
    }

    #[test]
    fn columns_file_is_a_plain_list() {
        let dir = tempfile::tempdir().unwrap();
        ModelArtifacts::new(schema(2), fitted(2))
            .unwrap()
            .save(dir.path())
            .unwrap();
        let text = fs::read_to_string(dir.path().join(COLUMNS_FILE)).unwrap();
        let cols: Vec<String> = serde_json::from_str(&text).unwrap();
        assert_eq!(cols, vec!["LS0", "LS1"]);
    }

    #[test]
    fn missing_schema_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        ModelArtifacts::new(schema(2), fitted(2))
            .unwrap()
            .save(dir.path())
            .unwrap();
        fs::remove_file(dir.path().join(COLUMNS_FILE)).unwrap();

        let err = ModelArtifacts::load(dir.path()).unwrap_err();
        match err {
            DetectorError::ArtifactMissing(path) => assert!(path.ends_with(COLUMNS_FILE)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_model_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelArtifacts::load(dir.path()).unwrap_err();
        assert!(matches!(err, DetectorError::ArtifactMissing(_)));
    }

    #[test]
    fn schema_of_different_width_is_rejected_at_load() {
        let dir = tempfile::tempdir().unwrap();
        ModelArtifacts::new(schema(3), fitted(3))
            .unwrap()
            .save(dir.path())
            .unwrap();
        fs::write(dir.path().join(COLUMNS_FILE), r#"["LS0","LS1"]"#).unwrap();

        let err = ModelArtifacts::load(dir.path()).unwrap_err();
        assert!(matches!(err, DetectorError::SchemaMismatch(_)));
    }

    #[test]
    fn unfitted_model_is_rejected() {
        let err = ModelArtifacts::new(schema(2), IsolationForest::default()).unwrap_err();
        assert!(matches!(err, DetectorError::SchemaMismatch(_)));
    }
}
