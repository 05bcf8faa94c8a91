use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DetectorError>;

/// Failures of the detection pipeline.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// No historical records at all; nothing to train on.
    #[error("no historical data: {0}")]
    DataUnavailable(String),

    /// Feature width/order disagrees with the trained model, or the persisted
    /// artifacts are out of sync with each other.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("malformed snapshot {source_id}: {reason}")]
    MalformedSnapshot { source_id: String, reason: String },

    #[error("missing artifact {} (train the model first)", .0.display())]
    ArtifactMissing(PathBuf),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sensor feed error: {0}")]
    Fetch(#[from] reqwest::Error),
}

impl DetectorError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DetectorError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(source_id: impl Into<String>, reason: impl ToString) -> Self {
        DetectorError::MalformedSnapshot {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }
}
