//! On-disk model directory and the in-memory model currently in use.
//!
//! A model directory holds one JSON artifact per trained family plus
//! `scaler.json` and `metadata.json`. Saving writes a complete staging
//! directory and swaps it in, so a failed save leaves the previous model
//! readable.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::analysis::{FEATURE_NAMES, FEATURE_SCHEMA_VERSION};
use crate::fs_ops;
use crate::ml::{CvSummary, FitMetrics, Regressor, RegressorKind, StandardScaler};

pub const METADATA_FILE_NAME: &str = "metadata.json";
pub const SCALER_FILE_NAME: &str = "scaler.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Model store I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid model artifact {path}: {message}")]
    InvalidArtifact { path: PathBuf, message: String },
    #[error("Missing model artifact {0}")]
    MissingArtifact(PathBuf),
    #[error("Stored feature schema (v{found_version}, {found_len} features) does not match v{expected_version}")]
    SchemaMismatch {
        expected_version: u32,
        found_version: u32,
        found_len: usize,
    },
}

/// Outcome of training one family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReport {
    pub trained: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_validation: Option<CvSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training: Option<FitMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ModelReport {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            trained: false,
            cross_validation: None,
            training: None,
            error: Some(error.into()),
        }
    }
}

/// Description of a training run, persisted as `metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// RFC 3339 timestamp of the training run.
    pub trained_at: String,
    pub training_samples: usize,
    pub feature_names: Vec<String>,
    pub schema_version: u32,
    pub models: BTreeMap<RegressorKind, ModelReport>,
}

impl ModelMetadata {
    fn check_schema(&self) -> Result<(), StoreError> {
        let names_match = self.feature_names.len() == FEATURE_NAMES.len()
            && self
                .feature_names
                .iter()
                .zip(FEATURE_NAMES)
                .all(|(stored, current)| stored == current);
        if self.schema_version != FEATURE_SCHEMA_VERSION || !names_match {
            return Err(StoreError::SchemaMismatch {
                expected_version: FEATURE_SCHEMA_VERSION,
                found_version: self.schema_version,
                found_len: self.feature_names.len(),
            });
        }
        Ok(())
    }
}

/// A complete, immutable set of fitted models.
#[derive(Debug)]
pub struct TrainedModel {
    pub scaler: StandardScaler,
    pub models: Vec<Box<dyn Regressor>>,
    pub metadata: ModelMetadata,
}

impl TrainedModel {
    pub fn model(&self, kind: RegressorKind) -> Option<&dyn Regressor> {
        self.models
            .iter()
            .find(|model| model.kind() == kind)
            .map(|model| model.as_ref())
    }

    /// Trained family with the highest mean cross-validated R².
    ///
    /// Families without cross-validation rank below those with it.
    pub fn best_model(&self) -> Option<(RegressorKind, Option<CvSummary>)> {
        self.models
            .iter()
            .map(|model| {
                let kind = model.kind();
                let cv = self
                    .metadata
                    .models
                    .get(&kind)
                    .and_then(|report| report.cross_validation);
                (kind, cv)
            })
            .max_by(|(_, a), (_, b)| {
                let score = |cv: &Option<CvSummary>| cv.map_or(f64::NEG_INFINITY, |c| c.r2_mean);
                score(a).total_cmp(&score(b))
            })
    }

    /// Importance vector from the first family that reports one.
    pub fn feature_importance(&self) -> Option<(RegressorKind, Vec<f64>)> {
        self.models
            .iter()
            .find_map(|model| model.feature_importance().map(|imp| (model.kind(), imp)))
    }
}

/// Owns the model directory and the model currently served to predictors.
#[derive(Debug)]
pub struct ModelStore {
    dir: PathBuf,
    current: RwLock<Option<Arc<TrainedModel>>>,
    train_lock: Mutex<()>,
}

impl ModelStore {
    /// Store rooted at `dir` with nothing loaded.
    pub fn empty(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            current: RwLock::new(None),
            train_lock: Mutex::new(()),
        }
    }

    /// Store rooted at `dir`, loading a previously saved model when present.
    ///
    /// Leftovers of an interrupted save are repaired first: a stranded
    /// `dir.old` is moved back into place and a `dir.new` staging directory is
    /// deleted.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self::empty(dir);
        recover_interrupted_save(&store.dir)?;
        if let Some(model) = load_dir(&store.dir)? {
            info!(
                dir = %store.dir.display(),
                samples = model.metadata.training_samples,
                "Loaded trained models"
            );
            store.install(Arc::new(model));
        }
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn current(&self) -> Option<Arc<TrainedModel>> {
        self.current
            .read()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    /// Held for the whole of a training run so runs do not interleave.
    pub fn lock_training(&self) -> MutexGuard<'_, ()> {
        self.train_lock.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Persist `model`, then make it current. On error nothing changes.
    pub fn save_and_install(&self, model: TrainedModel) -> Result<Arc<TrainedModel>, StoreError> {
        save_dir(&self.dir, &model)?;
        let model = Arc::new(model);
        self.install(Arc::clone(&model));
        info!(dir = %self.dir.display(), "Saved trained models");
        Ok(model)
    }

    fn install(&self, model: Arc<TrainedModel>) {
        *self.current.write().unwrap_or_else(|err| err.into_inner()) = Some(model);
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn recover_interrupted_save(dir: &Path) -> Result<(), StoreError> {
    if fs_ops::recover_dir(dir).map_err(io_err(dir))? {
        warn!(dir = %dir.display(), "Restored models left aside by an interrupted save");
    }
    if fs_ops::discard_staging(dir).map_err(io_err(dir))? {
        debug!(dir = %dir.display(), "Removed unfinished model staging directory");
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T, path: &Path) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec_pretty(value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn save_dir(dir: &Path, model: &TrainedModel) -> Result<(), StoreError> {
    if let Some(parent) = dir.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let staging = fs_ops::staging_dir_for(dir).map_err(io_err(dir))?;
    for regressor in &model.models {
        let path = staging.join(regressor.kind().file_name());
        let bytes = regressor.to_json().map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        fs_ops::atomic_write(&path, &bytes).map_err(io_err(&path))?;
    }
    let scaler_path = staging.join(SCALER_FILE_NAME);
    fs_ops::atomic_write(&scaler_path, &to_json(&model.scaler, &scaler_path)?)
        .map_err(io_err(&scaler_path))?;
    let metadata_path = staging.join(METADATA_FILE_NAME);
    fs_ops::atomic_write(&metadata_path, &to_json(&model.metadata, &metadata_path)?)
        .map_err(io_err(&metadata_path))?;
    fs_ops::swap_dir(&staging, dir).map_err(|source| {
        let _ = fs::remove_dir_all(&staging);
        StoreError::Io {
            path: dir.to_path_buf(),
            source,
        }
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let bytes = fs::read(path).map_err(io_err(path))?;
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a saved model directory; `Ok(None)` when nothing has been saved yet.
pub fn load_dir(dir: &Path) -> Result<Option<TrainedModel>, StoreError> {
    let metadata_path = dir.join(METADATA_FILE_NAME);
    if !metadata_path.is_file() {
        return Ok(None);
    }
    let metadata: ModelMetadata = read_json(&metadata_path)?;
    metadata.check_schema()?;

    let scaler_path = dir.join(SCALER_FILE_NAME);
    if !scaler_path.is_file() {
        return Err(StoreError::MissingArtifact(scaler_path));
    }
    let scaler: StandardScaler = read_json(&scaler_path)?;
    scaler
        .validate()
        .map_err(|message| StoreError::InvalidArtifact {
            path: scaler_path.clone(),
            message,
        })?;
    if scaler.feature_len() != FEATURE_NAMES.len() {
        return Err(StoreError::SchemaMismatch {
            expected_version: FEATURE_SCHEMA_VERSION,
            found_version: metadata.schema_version,
            found_len: scaler.feature_len(),
        });
    }

    let mut models = Vec::new();
    for (kind, report) in &metadata.models {
        if !report.trained {
            continue;
        }
        let path = dir.join(kind.file_name());
        if !path.is_file() {
            return Err(StoreError::MissingArtifact(path));
        }
        let bytes = fs::read(&path).map_err(io_err(&path))?;
        let model = kind
            .load(&bytes)
            .map_err(|message| StoreError::InvalidArtifact {
                path: path.clone(),
                message,
            })?;
        models.push(model);
    }
    if models.is_empty() {
        warn!(dir = %dir.display(), "Model metadata lists no trained families");
    }
    Ok(Some(TrainedModel {
        scaler,
        models,
        metadata,
    }))
}
