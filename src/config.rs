//! TOML configuration for canguard.
//!
//! Every field has a default, so a partial file (or none at all) is valid.
//! Lookup order: `CANGUARD_CONFIG`, then `./canguard.toml`, then defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::model::forest::ForestParams;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanguardConfig {
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Outcome of the config lookup, logged once a subscriber is installed.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    /// File the configuration was read from; `None` means compiled-in defaults.
    pub path: Option<PathBuf>,
    /// Candidate files that existed or were named but failed to load.
    pub skipped: Vec<(PathBuf, String)>,
}

impl ConfigSource {
    fn file(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
            skipped: Vec::new(),
        }
    }

    pub fn log(&self) {
        for (path, error) in &self.skipped {
            warn!(path = %path.display(), error = %error, "config file could not be loaded, trying fallback");
        }
        match &self.path {
            Some(path) => info!(path = %path.display(), "loaded configuration"),
            None => debug!("no config file found, using compiled-in defaults"),
        }
    }
}

impl CanguardConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load a file that must exist, e.g. one named on the command line.
    pub fn load_required(path: &Path) -> Result<(Self, ConfigSource)> {
        Ok((Self::load(path)?, ConfigSource::file(path)))
    }

    pub fn load_or_default() -> (Self, ConfigSource) {
        let env_path = std::env::var_os("CANGUARD_CONFIG").map(PathBuf::from);
        Self::resolve(env_path.as_deref(), Path::new("canguard.toml"))
    }

    fn resolve(env_path: Option<&Path>, local: &Path) -> (Self, ConfigSource) {
        let mut source = ConfigSource::default();

        if let Some(path) = env_path {
            match Self::load(path) {
                Ok(cfg) => {
                    source.path = Some(path.to_path_buf());
                    return (cfg, source);
                }
                Err(e) => source.skipped.push((path.to_path_buf(), format!("{:#}", e))),
            }
        }

        if local.exists() {
            match Self::load(local) {
                Ok(cfg) => {
                    source.path = Some(local.to_path_buf());
                    return (cfg, source);
                }
                Err(e) => source.skipped.push((local.to_path_buf(), format!("{:#}", e))),
            }
        }

        (Self::default(), source)
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Detection engine and outlier model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Samples each message type must collect before the models train.
    pub min_samples_per_type: usize,
    /// Expected outlier share in the training data.
    pub contamination: f64,
    /// Trees per isolation forest.
    pub n_estimators: usize,
    pub random_seed: u64,
    /// Subsample size per tree; unset means min(256, samples).
    pub max_samples: Option<usize>,
    /// Directory holding the trained model artifacts.
    pub model_store_path: PathBuf,
    /// Forward diagnostic-tier rule hits to the sink, not only to the log.
    pub promote_diagnostics: bool,
    /// Anomalies buffered for the sink before new ones are dropped.
    pub sink_queue_capacity: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_samples_per_type: 500,
            contamination: 0.05,
            n_estimators: 100,
            random_seed: 42,
            max_samples: None,
            model_store_path: PathBuf::from("trained_models"),
            promote_diagnostics: true,
            sink_queue_capacity: 1024,
        }
    }
}

impl DetectorConfig {
    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_estimators: self.n_estimators,
            contamination: self.contamination,
            max_samples: self.max_samples,
            random_seed: self.random_seed,
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database receiving anomaly records.
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/canguard.db"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = CanguardConfig::default();

        assert_eq!(cfg.detector.min_samples_per_type, 500);
        assert_eq!(cfg.detector.contamination, 0.05);
        assert_eq!(cfg.detector.n_estimators, 100);
        assert_eq!(cfg.detector.random_seed, 42);
        assert_eq!(cfg.detector.max_samples, None);
        assert_eq!(cfg.detector.model_store_path, PathBuf::from("trained_models"));
        assert!(cfg.detector.promote_diagnostics);

        assert_eq!(cfg.storage.db_path, PathBuf::from("data/canguard.db"));
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.json);

        assert!(cfg.detector.forest_params().validate().is_ok());
    }

    #[test]
    fn test_parse_example_toml() {
        let toml_str = r#"
[detector]
min_samples_per_type = 200
contamination = 0.1
n_estimators = 50
random_seed = 7
max_samples = 128
model_store_path = "/var/lib/canguard/models"
promote_diagnostics = false

[storage]
db_path = "/var/lib/canguard/anomalies.db"

[logging]
level = "debug"
json = true
"#;

        let cfg: CanguardConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.detector.min_samples_per_type, 200);
        assert_eq!(cfg.detector.contamination, 0.1);
        assert_eq!(cfg.detector.n_estimators, 50);
        assert_eq!(cfg.detector.random_seed, 7);
        assert_eq!(cfg.detector.max_samples, Some(128));
        assert_eq!(
            cfg.detector.model_store_path,
            PathBuf::from("/var/lib/canguard/models")
        );
        assert!(!cfg.detector.promote_diagnostics);
        assert_eq!(cfg.storage.db_path, PathBuf::from("/var/lib/canguard/anomalies.db"));
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);

        let params = cfg.detector.forest_params();
        assert_eq!(params.n_estimators, 50);
        assert_eq!(params.max_samples, Some(128));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
[detector]
min_samples_per_type = 10
"#;
        let cfg: CanguardConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.detector.min_samples_per_type, 10);
        assert_eq!(cfg.detector.n_estimators, 100);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("canguard.toml");
        std::fs::write(&path, "[logging]\nlevel = \"warn\"\n").unwrap();

        let cfg = CanguardConfig::load(&path).unwrap();
        assert_eq!(cfg.logging.level, "warn");

        assert!(CanguardConfig::load(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_resolve_records_source_and_fallbacks() {
        let dir = tempfile::TempDir::new().unwrap();
        let local = dir.path().join("canguard.toml");
        let missing = dir.path().join("missing.toml");

        let (cfg, source) = CanguardConfig::resolve(None, &local);
        assert_eq!(cfg.logging.level, "info");
        assert!(source.path.is_none());
        assert!(source.skipped.is_empty());

        std::fs::write(&local, "[logging]\nlevel = \"debug\"\n").unwrap();
        let (cfg, source) = CanguardConfig::resolve(Some(&missing), &local);
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(source.path.as_deref(), Some(local.as_path()));
        assert_eq!(source.skipped.len(), 1);
        assert_eq!(source.skipped[0].0, missing);

        std::fs::write(&local, "[logging\n").unwrap();
        let (cfg, source) = CanguardConfig::resolve(None, &local);
        assert_eq!(cfg.logging.level, "info");
        assert!(source.path.is_none());
        assert!(source.skipped[0].1.contains("failed to parse"));
    }
}
