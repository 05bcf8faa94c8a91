//! Fixed-schema numeric representation of sensor snapshots.
//!
//! Training and inference aggregate differently: training takes the max
//! state per (timestamp, sensor) bucket across all historical files,
//! inference takes the last state per sensor within a single snapshot.
//! See [`TRAINING_AGGREGATION`] and [`INFERENCE_AGGREGATION`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::SnapshotRecord;
use crate::core::snapshot::feature_value;
use crate::error::{DetectorError, Result};

/// How repeated observations of one sensor collapse into a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationPolicy {
    /// Any active observation wins.
    Max,
    /// The observation appearing last in file order wins.
    Last,
}

impl AggregationPolicy {
    pub fn combine(self, previous: f64, next: f64) -> f64 {
        match self {
            AggregationPolicy::Max => previous.max(next),
            AggregationPolicy::Last => next,
        }
    }
}

/// Within each (timestamp, sensor) bucket of the historical data.
pub const TRAINING_AGGREGATION: AggregationPolicy = AggregationPolicy::Max;
/// Within one snapshot file, per sensor.
pub const INFERENCE_AGGREGATION: AggregationPolicy = AggregationPolicy::Last;

/// Ordered sensor-id columns fixed at training time.
///
/// Persisted as a plain JSON list of strings. Columns are in lexicographic
/// order when produced by [`build_matrix`]; a loaded schema keeps whatever
/// order was persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FeatureSchema {
    columns: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<String>) -> Result<Self> {
        if columns.is_empty() {
            return Err(DetectorError::SchemaMismatch("feature schema is empty".into()));
        }
        let mut index = HashMap::with_capacity(columns.len());
        for (i, col) in columns.iter().enumerate() {
            if index.insert(col.clone(), i).is_some() {
                return Err(DetectorError::SchemaMismatch(format!(
                    "duplicate sensor column {col:?}"
                )));
            }
        }
        Ok(Self { columns, index })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, sensor_id: &str) -> Option<usize> {
        self.index.get(sensor_id).copied()
    }
}

impl TryFrom<Vec<String>> for FeatureSchema {
    type Error = DetectorError;

    fn try_from(columns: Vec<String>) -> Result<Self> {
        Self::new(columns)
    }
}

impl From<FeatureSchema> for Vec<String> {
    fn from(schema: FeatureSchema) -> Self {
        schema.columns
    }
}

/// One snapshot expressed in schema order; 0 = inactive/absent/unknown, 1 = active.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub values: Vec<f64>,
}

impl FeatureRow {
    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// Historical rows, one per distinct timestamp, ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingMatrix {
    pub timestamps: Vec<String>,
    pub data: Array2<f64>,
}

impl TrainingMatrix {
    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }
}

/// Re-express one snapshot in the schema's column order.
///
/// Sensors missing from the snapshot are 0; sensors unknown to the schema are dropped.
pub fn build_row(records: &[SnapshotRecord], schema: &FeatureSchema) -> Result<FeatureRow> {
    if schema.is_empty() {
        return Err(DetectorError::SchemaMismatch("feature schema is empty".into()));
    }

    let mut latest: HashMap<&str, f64> = HashMap::new();
    for record in records {
        let value = feature_value(record.state.as_deref());
        latest
            .entry(record.sensor_id.as_str())
            .and_modify(|v| *v = INFERENCE_AGGREGATION.combine(*v, value))
            .or_insert(value);
    }

    let mut values = vec![0.0; schema.len()];
    let mut dropped = 0usize;
    for (sensor_id, value) in latest {
        match schema.position(sensor_id) {
            Some(i) => values[i] = value,
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        debug!(dropped, "Ignored sensors not present in the feature schema");
    }

    Ok(FeatureRow { values })
}

/// Pivot all historical records into a timestamp x sensor matrix.
///
/// The column set (lexicographic sensor-id order) becomes the persisted schema.
pub fn build_matrix(records: &[SnapshotRecord]) -> Result<(TrainingMatrix, FeatureSchema)> {
    if records.is_empty() {
        return Err(DetectorError::DataUnavailable(
            "zero historical records across all sources".into(),
        ));
    }

    let mut buckets: BTreeMap<&str, HashMap<&str, f64>> = BTreeMap::new();
    let mut sensors: BTreeSet<&str> = BTreeSet::new();
    for record in records {
        let value = feature_value(record.state.as_deref());
        sensors.insert(record.sensor_id.as_str());
        buckets
            .entry(record.timestamp.as_str())
            .or_default()
            .entry(record.sensor_id.as_str())
            .and_modify(|v| *v = TRAINING_AGGREGATION.combine(*v, value))
            .or_insert(value);
    }

    let schema = FeatureSchema::new(sensors.into_iter().map(String::from).collect())?;
    let mut data = Array2::<f64>::zeros((buckets.len(), schema.len()));
    let mut timestamps = Vec::with_capacity(buckets.len());
    for (row, (timestamp, values)) in buckets.into_iter().enumerate() {
        for (sensor_id, value) in values {
            if let Some(col) = schema.position(sensor_id) {
                data[[row, col]] = value;
            }
        }
        timestamps.push(timestamp.to_string());
    }

    debug!(
        rows = timestamps.len(),
        columns = schema.len(),
        "Built training matrix"
    );
    Ok((TrainingMatrix { timestamps, data }, schema))
}
