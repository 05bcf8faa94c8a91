use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::core::Snapshot;
use crate::core::snapshot::parse_snapshot;
use crate::error::{DetectorError, Result};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// HTTP client for the live sensor table, which serves a JSON array of records.
pub struct SensorFeed {
    url: String,
    client: Client,
    auth: Option<String>, // base64 encoded user:pass
}

impl SensorFeed {
    pub fn new(url: &str, user: Option<&str>, password: Option<&str>) -> Self {
        use base64::{Engine, engine::general_purpose::STANDARD};
        let auth = match (user, password) {
            (Some(user), pass) if !user.is_empty() => {
                Some(STANDARD.encode(format!("{user}:{}", pass.unwrap_or_default())))
            }
            _ => None,
        };
        Self {
            url: url.to_string(),
            client: Client::new(),
            auth,
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(
            &config.url,
            config.user.as_deref(),
            config.password.as_deref(),
        )
    }

    /// Fetch one snapshot. Records without a timestamp get the collection time.
    pub async fn fetch(&self, now: DateTime<Utc>) -> Result<Snapshot> {
        let mut request = self.client.get(&self.url);
        if let Some(auth) = &self.auth {
            request = request.header("Authorization", format!("Basic {auth}"));
        }
        let body = request.send().await?.error_for_status()?.text().await?;

        let mut snapshot = parse_snapshot(&self.url, &body)?;
        stamp_missing_timestamps(&mut snapshot, now);
        info!(records = snapshot.records.len(), "Fetched sensor snapshot from {}", self.url);
        Ok(snapshot)
    }
}

fn stamp_missing_timestamps(snapshot: &mut Snapshot, now: DateTime<Utc>) {
    let stamp = now.format(TIMESTAMP_FORMAT).to_string();
    for record in snapshot.records.iter_mut().filter(|r| r.timestamp.is_empty()) {
        record.timestamp = stamp.clone();
    }
}

/// Save a fetched snapshot under `data_dir` so later training runs see it.
/// The snapshot's source becomes the archive file name.
pub fn archive_snapshot(
    snapshot: &mut Snapshot,
    data_dir: &Path,
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    std::fs::create_dir_all(data_dir).map_err(|e| DetectorError::io(data_dir, e))?;
    let name = format!("sensor_data_{}.json", now.format("%Y%m%d%H%M%S"));
    let path = data_dir.join(&name);
    let body = serde_json::to_string_pretty(&snapshot.records)?;
    std::fs::write(&path, body).map_err(|e| DetectorError::io(&path, e))?;
    debug!("Archived snapshot to {}", path.display());
    snapshot.source = name;
    Ok(path)
}
