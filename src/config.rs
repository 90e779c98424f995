//! TOML settings stored as `config.toml` under the app root.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::app_dirs;
use crate::fs_ops;
use crate::ml::RegressorKind;
use crate::predict::{CorrelationSettings, EnsembleSettings, Strategy};

/// Default filename used to store engine settings.
pub const CONFIG_FILE_NAME: &str = "config.toml";

const MAX_CV_FOLDS: usize = 20;
const MAX_LOG_FILES: usize = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No suitable config directory found")]
    NoConfigDir,
    #[error("Unable to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config for {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
}

fn map_app_dir_error(error: app_dirs::AppDirError) -> ConfigError {
    match error {
        app_dirs::AppDirError::NoBaseDir => ConfigError::NoConfigDir,
        app_dirs::AppDirError::CreateDir { path, source } => {
            ConfigError::CreateDir { path, source }
        }
    }
}

/// Everything the engine reads at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Overrides `<app root>/models`.
    #[serde(default)]
    pub models_dir: Option<PathBuf>,
    #[serde(default = "default_strategy")]
    pub strategy: Strategy,
    /// Wall-clock budget for one ensemble training run.
    #[serde(default)]
    pub train_timeout_secs: Option<u64>,
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    #[serde(default)]
    pub correlation: CorrelationSettings,
    #[serde(default)]
    pub ensemble: EnsembleSettings,
    #[serde(default)]
    pub logging: LogSettings,
}

/// `[logging]` table: verbosity and where run logs go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    /// `error`, `warn`, `info`, `debug`, `trace` or `off`; `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Overrides `<app root>/logs`.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Run files kept, counting the current one.
    #[serde(default = "default_keep_log_files")]
    pub keep_files: usize,
    /// Mirror events to stderr.
    #[serde(default = "default_console_logging")]
    pub console: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
            keep_files: default_keep_log_files(),
            console: default_console_logging(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_keep_log_files() -> usize {
    10
}

fn default_console_logging() -> bool {
    true
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            models_dir: None,
            strategy: default_strategy(),
            train_timeout_secs: None,
            confidence_level: default_confidence_level(),
            correlation: CorrelationSettings::default(),
            ensemble: EnsembleSettings::default(),
            logging: LogSettings::default(),
        }
    }
}

fn default_strategy() -> Strategy {
    Strategy::Auto
}

fn default_confidence_level() -> f64 {
    0.95
}

fn ordered(lo: f64, hi: f64) -> (f64, f64) {
    if lo <= hi { (lo, hi) } else { (hi, lo) }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

impl EngineSettings {
    /// Clamp values into ranges the engine can work with.
    pub fn normalized(mut self) -> Self {
        let defaults = EngineSettings::default();

        self.confidence_level =
            finite_or(self.confidence_level, defaults.confidence_level).clamp(0.5, 0.999);

        let c = &mut self.correlation;
        c.mean_blend = finite_or(c.mean_blend, defaults.correlation.mean_blend).clamp(0.0, 1.0);
        c.significance =
            finite_or(c.significance, defaults.correlation.significance).clamp(1e-6, 0.5);
        (c.clamp_min, c.clamp_max) = ordered(
            finite_or(c.clamp_min, defaults.correlation.clamp_min),
            finite_or(c.clamp_max, defaults.correlation.clamp_max),
        );

        let e = &mut self.ensemble;
        let d = &defaults.ensemble;
        if e.families.is_empty() {
            e.families = RegressorKind::ALL.to_vec();
        }
        e.max_cv_folds = e.max_cv_folds.clamp(2, MAX_CV_FOLDS);
        (e.target_min, e.target_max) = ordered(
            finite_or(e.target_min, d.target_min),
            finite_or(e.target_max, d.target_max),
        );
        (e.prediction_min, e.prediction_max) = ordered(
            finite_or(e.prediction_min, d.prediction_min),
            finite_or(e.prediction_max, d.prediction_max),
        );
        let alpha = e.params.ridge_alpha;
        if !alpha.is_finite() || alpha < 0.0 {
            e.params.ridge_alpha = d.params.ridge_alpha;
        }
        let rate = e.params.gradient_boosting.learning_rate;
        if !rate.is_finite() || rate <= 0.0 {
            e.params.gradient_boosting.learning_rate = d.params.gradient_boosting.learning_rate;
        }
        e.params.random_forest.n_trees = e.params.random_forest.n_trees.max(1);
        e.params.gradient_boosting.rounds = e.params.gradient_boosting.rounds.max(1);

        let log = &mut self.logging;
        log.level = log.level.trim().to_ascii_lowercase();
        if log.level.is_empty() {
            log.level = default_log_level();
        }
        log.keep_files = log.keep_files.clamp(1, MAX_LOG_FILES);
        self
    }

    /// Configured models directory, or the default under the app root.
    pub fn resolve_models_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.models_dir {
            Some(dir) => Ok(dir.clone()),
            None => app_dirs::default_models_dir().map_err(map_app_dir_error),
        }
    }
}

/// Resolve the configuration file path, ensuring the parent directory exists.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir().map_err(map_app_dir_error)?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load settings from the app root, returning defaults if the file is missing.
pub fn load_or_default() -> Result<EngineSettings, ConfigError> {
    load_from_path(&config_path()?)
}

pub fn load_from_path(path: &Path) -> Result<EngineSettings, ConfigError> {
    if !path.exists() {
        return Ok(EngineSettings::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<EngineSettings>(&text)
        .map(EngineSettings::normalized)
        .map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })
}

/// Persist settings to the app root, overwriting any previous contents.
pub fn save(settings: &EngineSettings) -> Result<(), ConfigError> {
    save_to_path(settings, &config_path()?)
}

/// Write settings atomically, creating parent directories as needed.
pub fn save_to_path(settings: &EngineSettings, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let data = toml::to_string_pretty(settings).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    fs_ops::atomic_write(path, data.as_bytes()).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "Saved settings");
    Ok(())
}
