use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::core::{Snapshot, SnapshotRecord};
use crate::error::{DetectorError, Result};

pub const STATE_ACTIVE: &str = "active";
pub const STATE_INACTIVE: &str = "inactive";

/// Parse a snapshot file body: a JSON array of record objects.
pub fn parse_snapshot(source: &str, text: &str) -> Result<Snapshot> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| DetectorError::malformed(source, e))?;
    let Value::Array(items) = value else {
        return Err(DetectorError::malformed(source, "expected a JSON array of records"));
    };

    let mut has_state_field = false;
    let mut records = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let Some(obj) = item.as_object() else {
            return Err(DetectorError::malformed(source, format!("record {i} is not an object")));
        };
        has_state_field |= obj.contains_key("state");
        let record: SnapshotRecord = serde_json::from_value(item)
            .map_err(|e| DetectorError::malformed(source, format!("record {i}: {e}")))?;
        records.push(record);
    }

    debug!(source, records = records.len(), "Parsed snapshot");
    Ok(Snapshot {
        source: source.to_string(),
        records,
        has_state_field,
    })
}

/// Read and parse one snapshot file. The file name becomes the snapshot source.
pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let source = file_id(path);
    let text = std::fs::read_to_string(path).map_err(|e| DetectorError::io(path, e))?;
    parse_snapshot(&source, &text)
}

pub fn file_id(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// All `*.json` files directly under `dir`, sorted by name. A missing directory is empty.
pub fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        debug!("Snapshot directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(dir).map_err(|e| DetectorError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| DetectorError::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Feature encoding of a raw state: lowercase only, `active` is 1, anything else
/// (inactive, unknown, empty, missing) is 0.
pub fn feature_value(state: Option<&str>) -> f64 {
    match state {
        Some(s) if s.to_lowercase() == STATE_ACTIVE => 1.0,
        _ => 0.0,
    }
}

/// Rule-engine normalization: trimmed and lowercased, missing becomes empty.
pub fn normalize_state(state: Option<&str>) -> String {
    state.unwrap_or_default().trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_array_of_records() {
        let snap = parse_snapshot(
            "a.json",
            r#"[
                {"name":"S1","userName":"LS1","inverted":"false","state":"ACTIVE","timestamp":"t1"},
                {"name":"S2","userName":"LS2","inverted":"false","state":null,"timestamp":"t1"}
            ]"#,
        )
        .unwrap();
        assert_eq!(snap.source, "a.json");
        assert_eq!(snap.records.len(), 2);
        assert!(snap.has_state_field);
        assert_eq!(snap.records[1].state, None);
    }

    #[test]
    fn absent_state_key_is_tracked() {
        let snap = parse_snapshot("a.json", r#"[{"userName":"LS1","timestamp":"t1"}]"#).unwrap();
        assert!(!snap.has_state_field);
        assert_eq!(snap.records[0].name, "");
    }

    #[test]
    fn rejects_non_array() {
        let err = parse_snapshot("a.json", r#"{"userName":"LS1"}"#).unwrap_err();
        assert!(matches!(err, DetectorError::MalformedSnapshot { .. }));
    }

    #[test]
    fn rejects_record_without_sensor_id() {
        let err = parse_snapshot("a.json", r#"[{"state":"active"}]"#).unwrap_err();
        assert!(err.to_string().contains("record 0"));
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(parse_snapshot("a.json", "[{").is_err());
    }

    #[test]
    fn feature_value_lowercases_without_trimming() {
        assert_eq!(feature_value(Some("Active")), 1.0);
        assert_eq!(feature_value(Some("active")), 1.0);
        assert_eq!(feature_value(Some(" active ")), 0.0);
        assert_eq!(feature_value(Some("INACTIVE")), 0.0);
        assert_eq!(feature_value(Some("unknown")), 0.0);
        assert_eq!(feature_value(None), 0.0);
    }

    #[test]
    fn normalize_state_trims_and_lowercases() {
        assert_eq!(normalize_state(Some("  Active ")), "active");
        assert_eq!(normalize_state(Some("   ")), "");
        assert_eq!(normalize_state(None), "");
    }

    #[test]
    fn json_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), "[]").unwrap();
        std::fs::write(dir.path().join("a.json"), "[]").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        let files = json_files(dir.path()).unwrap();
        let names: Vec<String> = files.iter().map(|p| file_id(p)).collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[test]
    fn json_files_missing_dir_is_empty() {
        let files = json_files(Path::new("/nonexistent/railwatch-data")).unwrap();
        assert!(files.is_empty());
    }
}
