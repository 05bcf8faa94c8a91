pub mod pipeline;
pub mod snapshot;

use std::fmt;

use serde::{Deserialize, Serialize};

/// One observation of one sensor at one timestamp, as produced by the sensor table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    #[serde(default)]
    pub name: String,
    /// Stable sensor identifier; the join key across snapshot files.
    #[serde(rename = "userName")]
    pub sensor_id: String,
    #[serde(default)]
    pub inverted: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub timestamp: String,
}

/// One snapshot file's worth of records.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// File name or feed identifier, used in verdict lines and alerts.
    pub source: String,
    pub records: Vec<SnapshotRecord>,
    /// Whether any record carried a `state` key at all.
    pub has_state_field: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutlierLabel {
    Normal,
    Anomaly,
}

impl fmt::Display for OutlierLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutlierLabel::Normal => f.write_str("NORMAL"),
            OutlierLabel::Anomaly => f.write_str("ANOMALY"),
        }
    }
}

/// Outlier model output for one feature row. Lower score = more anomalous.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierVerdict {
    pub label: OutlierLabel,
    pub score: f64,
}

impl OutlierVerdict {
    pub fn is_anomaly(&self) -> bool {
        self.label == OutlierLabel::Anomaly
    }
}

/// Per-file line printed by batch scans.
#[derive(Debug, Clone, PartialEq)]
pub struct FileVerdict {
    pub file_id: String,
    pub verdict: OutlierVerdict,
}

impl fmt::Display for FileVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (score={:.4})",
            self.file_id, self.verdict.label, self.verdict.score
        )
    }
}

/// A triggered deterministic rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAlert {
    pub rule_name: String,
    pub message: String,
}

impl fmt::Display for RuleAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Composed alert handed to the notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
}
