use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::core::SnapshotRecord;
use crate::core::snapshot::{file_id, json_files, load_snapshot};
use crate::error::{DetectorError, Result};
use crate::features::build_matrix;
use crate::model::OutlierModel;
use crate::model::isolation::{IsolationForest, IsolationParams};
use crate::model::store::ModelArtifacts;

/// Summary of one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub files_loaded: usize,
    pub files_skipped: Vec<String>,
    pub records: usize,
    pub rows: usize,
    pub columns: usize,
    /// Training rows the fitted model itself labels ANOMALY.
    pub flagged_rows: usize,
    pub model_path: PathBuf,
    pub columns_path: PathBuf,
}

/// Historical records from every `*.json` under `dirs`, with per-file isolation:
/// a file that cannot be read or parsed is skipped and reported.
pub fn load_history(dirs: &[PathBuf]) -> Result<(Vec<SnapshotRecord>, usize, Vec<String>)> {
    let mut records = Vec::new();
    let mut loaded = 0;
    let mut skipped = Vec::new();
    for dir in dirs {
        for path in json_files(dir)? {
            match load_snapshot(&path) {
                Ok(snapshot) => {
                    loaded += 1;
                    records.extend(snapshot.records);
                }
                Err(e) => {
                    warn!("Skipping {}: {e}", file_id(&path));
                    skipped.push(file_id(&path));
                }
            }
        }
    }

    if records.is_empty() {
        let searched: Vec<String> = dirs.iter().map(|d| d.display().to_string()).collect();
        return Err(DetectorError::DataUnavailable(format!(
            "no snapshot records found in {}",
            searched.join(", ")
        )));
    }
    Ok((records, loaded, skipped))
}

/// Build the schema, fit the outlier model and persist both. Nothing is
/// written unless fitting succeeds.
pub fn train(config: &Config) -> Result<TrainingReport> {
    let dirs = config.paths.training_dirs();
    train_from(&dirs, IsolationParams::from(&config.model), &config.paths.models_dir)
}

pub fn train_from(
    dirs: &[PathBuf],
    params: IsolationParams,
    models_dir: &Path,
) -> Result<TrainingReport> {
    let (records, files_loaded, files_skipped) = load_history(dirs)?;
    info!(
        files = files_loaded,
        skipped = files_skipped.len(),
        records = records.len(),
        "Loaded historical snapshots"
    );

    let (matrix, schema) = build_matrix(&records)?;
    debug!("Schema columns: {}", schema.columns().join(", "));
    if let (Some(first), Some(last)) = (matrix.timestamps.first(), matrix.timestamps.last()) {
        info!(rows = matrix.n_rows(), "Training matrix spans {first} .. {last}");
    }

    let mut model = IsolationForest::new(params);
    model.fit(&matrix)?;
    debug!(offset = model.offset(), "Decision offset");

    let flagged_rows = model
        .score_matrix(&matrix)?
        .iter()
        .filter(|v| v.is_anomaly())
        .count();

    let artifacts = ModelArtifacts::new(schema, model)?;
    let (model_path, columns_path) = artifacts.save(models_dir)?;

    Ok(TrainingReport {
        files_loaded,
        files_skipped,
        records: records.len(),
        rows: matrix.n_rows(),
        columns: matrix.n_features(),
        flagged_rows,
        model_path,
        columns_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureRow;
    use std::fs;

    fn write_snapshot(dir: &Path, name: &str, timestamp: &str, active: &[&str]) {
        let records: Vec<serde_json::Value> = ["LS1", "LS2", "LS3"]
            .iter()
            .map(|id| {
                let state = if active.contains(id) { "ACTIVE" } else { "INACTIVE" };
                serde_json::json!({
                    "name": format!("Sensor {id}"),
                    "userName": id,
                    "inverted": "false",
                    "state": state,
                    "timestamp": timestamp,
                })
            })
            .collect();
        fs::write(dir.join(name), serde_json::to_string_pretty(&records).unwrap()).unwrap();
    }

    #[test]
    fn trains_and_persists_from_both_directories() {
        let data = tempfile::tempdir().unwrap();
        let samples = tempfile::tempdir().unwrap();
        let models = tempfile::tempdir().unwrap();
        for i in 0..6 {
            write_snapshot(data.path(), &format!("d{i}.json"), &format!("t{i:02}"), &["LS1"]);
        }
        write_snapshot(samples.path(), "s.json", "t99", &["LS1", "LS2", "LS3"]);
        fs::write(data.path().join("broken.json"), "{ nope").unwrap();

        let dirs = vec![data.path().to_path_buf(), samples.path().to_path_buf()];
        let report = train_from(&dirs, IsolationParams::default(), models.path()).unwrap();

        assert_eq!(report.files_loaded, 7);
        assert_eq!(report.files_skipped, vec!["broken.json".to_string()]);
        assert_eq!(report.records, 21);
        assert_eq!(report.rows, 7);
        assert_eq!(report.columns, 3);
        assert!(report.flagged_rows >= 1);

        let artifacts = ModelArtifacts::load(models.path()).unwrap();
        assert_eq!(artifacts.schema.columns(), &["LS1", "LS2", "LS3"]);
        let verdict = artifacts
            .model
            .score(&FeatureRow {
                values: vec![1.0, 1.0, 1.0],
            })
            .unwrap();
        assert!(verdict.is_anomaly());
    }

    #[test]
    fn no_history_is_fatal_and_writes_nothing() {
        let empty = tempfile::tempdir().unwrap();
        let models = tempfile::tempdir().unwrap();
        fs::write(empty.path().join("broken.json"), "[{").unwrap();

        let err = train_from(
            &[empty.path().to_path_buf(), PathBuf::from("/nonexistent/samples")],
            IsolationParams::default(),
            models.path(),
        )
        .unwrap_err();
        assert!(matches!(err, DetectorError::DataUnavailable(_)));
        assert!(fs::read_dir(models.path()).unwrap().next().is_none());
    }

    #[test]
    fn invalid_contamination_writes_nothing() {
        let data = tempfile::tempdir().unwrap();
        let models = tempfile::tempdir().unwrap();
        write_snapshot(data.path(), "d.json", "t00", &["LS1"]);
        let params = IsolationParams {
            contamination: 0.0,
            ..IsolationParams::default()
        };
        let err = train_from(&[data.path().to_path_buf()], params, models.path()).unwrap_err();
        assert!(matches!(err, DetectorError::InvalidParameter(_)));
        assert!(!models.path().join("model_columns.json").exists());
    }
}
