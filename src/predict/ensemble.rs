//! Multi-model ensemble: training with cross-validation, and prediction with
//! spread-based uncertainty.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, warn};

use super::result::{
    ConfidenceInfo, Explanation, FeatureWeight, ModelPerformance, ModelPrediction, PredictError,
    PredictionMethod, PredictionResult,
};
use super::store::{ModelMetadata, ModelReport, ModelStore, StoreError, TrainedModel};
use crate::analysis::{FEATURE_NAMES, FEATURE_SCHEMA_VERSION, FeatureEngineer, FeatureVector};
use crate::dataset::TrainingSet;
use crate::ml::metrics::mean_std;
use crate::ml::{
    CvError, FitMetrics, Interrupted, KFold, RegressorKind, RegressorParams, StandardScaler,
    TrainControl, fold_count,
};
use crate::recipe::Recipe;

/// Ensemble training and prediction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleSettings {
    /// Families trained, in this order.
    pub families: Vec<RegressorKind>,
    pub params: RegressorParams,
    /// Average every family; otherwise use the best one by cross-validated R².
    pub use_ensemble: bool,
    /// Training targets outside `[target_min, target_max]` are dropped.
    pub target_min: f64,
    pub target_max: f64,
    pub prediction_min: f64,
    pub prediction_max: f64,
    pub max_cv_folds: usize,
    pub cv_seed: u64,
    /// Below this many samples training still runs but warns.
    pub min_reliable_samples: usize,
    pub top_features: usize,
}

impl Default for EnsembleSettings {
    fn default() -> Self {
        Self {
            families: RegressorKind::ALL.to_vec(),
            params: RegressorParams::default(),
            use_ensemble: true,
            target_min: 5.0,
            target_max: 50.0,
            prediction_min: 10.0,
            prediction_max: 45.0,
            max_cv_folds: 5,
            cv_seed: 42,
            min_reliable_samples: 5,
            top_features: 5,
        }
    }
}

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("No training data available ({skipped} recipes skipped, {excluded} outside target range)")]
    NoTrainingData { skipped: usize, excluded: usize },
    #[error("Failed to fit feature scaler: {0}")]
    Scaler(String),
    #[error("Every model family failed to train")]
    AllModelsFailed(BTreeMap<RegressorKind, ModelReport>),
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a successful training run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainOutcome {
    pub metadata: ModelMetadata,
    /// Measured recipes that failed feature extraction.
    pub skipped_recipes: usize,
    /// Measured recipes dropped for an implausible porosity.
    pub excluded_targets: usize,
}

#[derive(Debug, Clone)]
pub struct EnsembleTrainer {
    engineer: FeatureEngineer,
    settings: EnsembleSettings,
    store: Arc<ModelStore>,
}

impl EnsembleTrainer {
    pub fn new(
        engineer: FeatureEngineer,
        settings: EnsembleSettings,
        store: Arc<ModelStore>,
    ) -> Self {
        Self {
            engineer,
            settings,
            store,
        }
    }

    /// Train every registered family from scratch, persist the set, then
    /// install it for predictors.
    ///
    /// An interrupted or failed run leaves both the saved and the in-memory
    /// model untouched.
    pub fn train_models(
        &self,
        recipes: &[Recipe],
        control: &TrainControl,
    ) -> Result<TrainOutcome, TrainError> {
        let _guard = self.store.lock_training();
        let settings = &self.settings;

        let all = TrainingSet::from_recipes(recipes, &self.engineer);
        let set = all.within_targets(settings.target_min, settings.target_max);
        let excluded = all.len() - set.len();
        if set.is_empty() {
            return Err(TrainError::NoTrainingData {
                skipped: all.skipped,
                excluded,
            });
        }
        if set.len() < settings.min_reliable_samples {
            warn!(
                samples = set.len(),
                "Only {} recipes with porosity data; need at least {} for reliable training",
                set.len(),
                settings.min_reliable_samples
            );
        }
        info!(samples = set.len(), skipped = all.skipped, excluded, "Training ensemble");

        let x = set.matrix();
        let y = set.targets();
        let scaler = StandardScaler::fit(&x).map_err(TrainError::Scaler)?;
        let x_scaled = scaler.transform_all(&x);

        let k = fold_count(set.len(), settings.max_cv_folds);
        let folds = (k >= 2).then(|| KFold::new(k, settings.cv_seed));
        if folds.is_none() {
            debug!(samples = set.len(), "Too few samples for cross-validation");
        }

        let mut reports = BTreeMap::new();
        let mut models = Vec::new();
        for kind in dedup(&settings.families) {
            control.check()?;
            let mut model = kind.build(&settings.params);
            let cross_validation = match &folds {
                Some(folds) => match model.cross_validate(&x_scaled, &y, folds, control) {
                    Ok(summary) => Some(summary),
                    Err(CvError::Interrupted(reason)) => return Err(reason.into()),
                    Err(err) => {
                        warn!(model = %kind, "Cross-validation failed: {err}");
                        reports.insert(kind, ModelReport::failed(err.to_string()));
                        continue;
                    }
                },
                None => None,
            };
            control.check()?;
            if let Err(err) = model.fit(&x_scaled, &y) {
                warn!(model = %kind, "Training failed: {err}");
                reports.insert(kind, ModelReport::failed(err));
                continue;
            }
            let predicted: Vec<f64> = x_scaled.iter().map(|row| model.predict(row)).collect();
            let training = FitMetrics::evaluate(&y, &predicted);
            if let Some(cv) = &cross_validation {
                debug!(
                    model = %kind,
                    cv_r2 = cv.r2_mean,
                    cv_mae = cv.mae_mean,
                    train_r2 = training.r2,
                    "Model trained"
                );
            }
            reports.insert(
                kind,
                ModelReport {
                    trained: true,
                    cross_validation,
                    training: Some(training),
                    error: None,
                },
            );
            models.push(model);
        }
        if models.is_empty() {
            return Err(TrainError::AllModelsFailed(reports));
        }
        control.check()?;

        let metadata = ModelMetadata {
            trained_at: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_else(|_| "unknown".to_string()),
            training_samples: set.len(),
            feature_names: FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
            schema_version: FEATURE_SCHEMA_VERSION,
            models: reports,
        };
        let installed = self.store.save_and_install(TrainedModel {
            scaler,
            models,
            metadata,
        })?;
        info!(
            samples = installed.metadata.training_samples,
            families = installed.models.len(),
            "Ensemble training complete"
        );
        Ok(TrainOutcome {
            metadata: installed.metadata.clone(),
            skipped_recipes: all.skipped,
            excluded_targets: excluded,
        })
    }
}

fn dedup(kinds: &[RegressorKind]) -> Vec<RegressorKind> {
    let mut out: Vec<RegressorKind> = Vec::with_capacity(kinds.len());
    for kind in kinds {
        if !out.contains(kind) {
            out.push(*kind);
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct EnsemblePredictor {
    engineer: FeatureEngineer,
    settings: EnsembleSettings,
    store: Arc<ModelStore>,
}

impl EnsemblePredictor {
    pub fn new(
        engineer: FeatureEngineer,
        settings: EnsembleSettings,
        store: Arc<ModelStore>,
    ) -> Self {
        Self {
            engineer,
            settings,
            store,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.store
            .current()
            .is_some_and(|model| !model.models.is_empty())
    }

    pub fn predict(&self, recipe: &Recipe) -> Result<PredictionResult, PredictError> {
        let model = self.store.current().ok_or(PredictError::NoTrainedModels)?;
        if model.models.is_empty() {
            return Err(PredictError::NoTrainedModels);
        }
        let features = self.engineer.engineer(recipe)?;
        let scaled = model.scaler.transform(&features.to_array());

        let member_predictions: Vec<ModelPrediction> = model
            .models
            .iter()
            .map(|m| ModelPrediction {
                model: m.kind(),
                porosity: m.predict(&scaled),
            })
            .filter(|p| p.porosity.is_finite())
            .collect();
        if member_predictions.is_empty() {
            return Err(PredictError::NonFinite);
        }

        let best = model.best_model();
        let (raw, spread, method) = if self.settings.use_ensemble {
            let values: Vec<f64> = member_predictions.iter().map(|p| p.porosity).collect();
            let (mean, std) = mean_std(&values);
            (mean, std, PredictionMethod::Ensemble)
        } else {
            let best_kind = best.map(|(kind, _)| kind);
            let chosen = member_predictions
                .iter()
                .find(|p| Some(p.model) == best_kind)
                .or_else(|| member_predictions.first())
                .ok_or(PredictError::NoTrainedModels)?;
            (chosen.porosity, 0.0, PredictionMethod::BestModel)
        };
        let predicted = raw.clamp(self.settings.prediction_min, self.settings.prediction_max);
        debug!(recipe = %recipe.name, raw, predicted, spread, "Ensemble estimate");

        let best_cv = best.and_then(|(kind, cv)| cv.map(|cv| (kind, cv)));
        let samples = model.metadata.training_samples;
        let mut info = ConfidenceInfo::new(
            method,
            samples,
            ensemble_confidence_label(samples, best_cv.map(|(_, cv)| cv.r2_mean)).to_string(),
        );
        info.uncertainty = Some(spread);
        info.model_predictions = member_predictions;
        info.model_performance = best_cv.map(|(kind, cv)| ModelPerformance {
            best_model: kind,
            r2_score: cv.r2_mean,
            mae: cv.mae_mean,
        });
        info.top_features = top_features(&model, &features, self.settings.top_features);
        info.explanation = Some(explain(&features));
        Ok(PredictionResult {
            predicted_porosity: predicted,
            confidence_info: info,
        })
    }
}

/// Confidence label from sample count and the best cross-validated R².
pub fn ensemble_confidence_label(training_samples: usize, best_cv_r2: Option<f64>) -> &'static str {
    match best_cv_r2 {
        _ if training_samples < 5 => "Low (< 5 training samples)",
        None => "Low (not cross-validated)",
        Some(r2) if r2 >= 0.7 => "High (strong cross-validated fit)",
        Some(r2) if r2 >= 0.4 => "Medium (moderate cross-validated fit)",
        Some(_) => "Low (weak cross-validated fit)",
    }
}

/// Raw values of the `n` most important features by tree importance.
fn top_features(model: &TrainedModel, features: &FeatureVector, n: usize) -> Vec<FeatureWeight> {
    let Some((_, importance)) = model.feature_importance() else {
        return Vec::new();
    };
    let values = features.to_array();
    let mut order: Vec<usize> = (0..importance.len().min(values.len())).collect();
    order.sort_by(|&a, &b| importance[b].total_cmp(&importance[a]).then(a.cmp(&b)));
    order
        .into_iter()
        .take(n)
        .map(|idx| FeatureWeight {
            feature: FEATURE_NAMES[idx].to_string(),
            value: values[idx],
        })
        .collect()
}

/// Describe the hydration, fermentation and gluten drivers of a prediction.
pub fn explain(features: &FeatureVector) -> Explanation {
    let mut factors = Vec::new();
    let hydration = features.hydration_ratio;
    if hydration > 0.75 {
        factors.push("High hydration → larger holes potential");
    } else if hydration < 0.60 {
        factors.push("Low hydration → finer, more uniform crumb");
    } else {
        factors.push("Moderate hydration → balanced crumb structure");
    }
    let fermentation = features.fermentation_power;
    if fermentation > 0.75 {
        factors.push("Strong fermentation power → good oven spring");
    } else if fermentation < 0.50 {
        factors.push("Weak fermentation → denser crumb");
    }
    let gluten = features.gluten_development_score;
    if gluten > 0.85 {
        factors.push("High gluten flour → strong dough, open crumb");
    } else if gluten < 0.65 {
        factors.push("Low gluten flour → weaker structure");
    }
    let factors: Vec<String> = factors.into_iter().map(str::to_string).collect();
    Explanation {
        primary_factor: factors.first().cloned(),
        factors,
    }
}
