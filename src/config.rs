use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub model: ModelConfig,
    pub source: SourceConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    /// Live snapshots land here; scanned by `scan`, read by `train`.
    pub data_dir: PathBuf,
    /// Extra historical snapshots, read by `train` only.
    pub samples_dir: PathBuf,
    pub models_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    pub contamination: f64,
    pub seed: u64,
    pub n_estimators: usize,
    pub max_samples: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub subject: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".into(),
            samples_dir: "data_samples".into(),
            models_dir: "models".into(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            contamination: 0.1,
            seed: 42,
            n_estimators: 100,
            max_samples: 256,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:12080/json/sensors".into(),
            user: None,
            password: None,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            subject: "Railway Sensor Alert".into(),
        }
    }
}

impl PathsConfig {
    /// Directories the trainer reads historical snapshots from.
    pub fn training_dirs(&self) -> Vec<PathBuf> {
        vec![self.data_dir.clone(), self.samples_dir.clone()]
    }
}

impl Config {
    /// Load config from a TOML file. Falls back to defaults if file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Config loaded from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", path.display());
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [model]
            contamination = 0.05

            [source]
            url = "http://jmri.local:12080/json/sensors"
            user = "ops"
            "#,
        )
        .unwrap();
        assert_eq!(config.model.contamination, 0.05);
        assert_eq!(config.model.seed, 42);
        assert_eq!(config.model.n_estimators, 100);
        assert_eq!(config.source.user.as_deref(), Some("ops"));
        assert!(config.source.password.is_none());
        assert_eq!(config.paths.models_dir, PathBuf::from("models"));
        assert!(config.notifications.enabled);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load("/nonexistent/railwatch.toml");
        assert_eq!(config.model.contamination, 0.1);
        assert_eq!(config.paths.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn unparsable_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[model\ncontamination = ").unwrap();
        let config = Config::load(&path);
        assert_eq!(config.model.max_samples, 256);
    }

    #[test]
    fn training_reads_data_and_samples() {
        let paths = PathsConfig::default();
        assert_eq!(
            paths.training_dirs(),
            vec![PathBuf::from("data"), PathBuf::from("data_samples")]
        );
    }
}
