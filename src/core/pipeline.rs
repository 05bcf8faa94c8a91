use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::core::snapshot::{file_id, load_snapshot};
use crate::core::{AlertMessage, FileVerdict, OutlierVerdict, RuleAlert, Snapshot};
use crate::error::{DetectorError, Result};
use crate::features::{FeatureSchema, build_row};
use crate::model::OutlierModel;
use crate::signals::RuleEngine;
use crate::signals::fusion::decide;

/// Result of one inference run over one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionOutcome {
    pub source: String,
    pub rule_alerts: Vec<RuleAlert>,
    pub verdict: OutlierVerdict,
    pub alert: Option<AlertMessage>,
}

/// Rules on the raw snapshot, outlier model on its feature row, then fusion.
pub fn run_detection(
    snapshot: &Snapshot,
    schema: &FeatureSchema,
    model: &dyn OutlierModel,
    engine: &RuleEngine,
    subject: &str,
    now: DateTime<Utc>,
) -> Result<DetectionOutcome> {
    ensure_in_sync(schema, model)?;

    let rule_alerts = engine.evaluate(snapshot);
    debug!(source = %snapshot.source, alerts = rule_alerts.len(), "Rules evaluated");

    let row = build_row(&snapshot.records, schema)?;
    let verdict = model.score(&row)?;

    let alert = decide(subject, &snapshot.source, &rule_alerts, &verdict, now);
    if alert.is_none() {
        info!("No alerts for {}. Score={:.4}", snapshot.source, verdict.score);
    }

    Ok(DetectionOutcome {
        source: snapshot.source.clone(),
        rule_alerts,
        verdict,
        alert,
    })
}

/// Score each file on its own. Unreadable or malformed files are skipped with a
/// warning; a schema mismatch aborts the scan.
pub fn scan_files(
    files: &[PathBuf],
    schema: &FeatureSchema,
    model: &dyn OutlierModel,
) -> Result<Vec<FileVerdict>> {
    ensure_in_sync(schema, model)?;

    let mut verdicts = Vec::with_capacity(files.len());
    for path in files {
        let snapshot = match load_snapshot(path) {
            Ok(s) => s,
            Err(e) => {
                warn!("Skipping {}: {e}", file_id(path));
                continue;
            }
        };
        let row = build_row(&snapshot.records, schema)?;
        let verdict = model.score(&row)?;
        verdicts.push(FileVerdict {
            file_id: snapshot.source,
            verdict,
        });
    }
    Ok(verdicts)
}

fn ensure_in_sync(schema: &FeatureSchema, model: &dyn OutlierModel) -> Result<()> {
    match model.n_features() {
        Some(n) if n == schema.len() => Ok(()),
        Some(n) => Err(DetectorError::SchemaMismatch(format!(
            "{} was fit on {n} features, schema has {}",
            model.name(),
            schema.len()
        ))),
        None => Err(DetectorError::SchemaMismatch(format!(
            "{} is not fitted",
            model.name()
        ))),
    }
}
