//! Front door combining the correlation estimator and the model ensemble.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::correlation::{CorrelationPredictor, CorrelationSettings};
use super::ensemble::{
    EnsemblePredictor, EnsembleSettings, EnsembleTrainer, TrainError, TrainOutcome,
};
use super::insight::{
    self, CorrelationInfo, EnsembleInfo, MIN_TRAINING_SAMPLES, ModelInfo, RecipeFactors,
    SimilarRecipe, TrainingStatus,
};
use super::result::{PredictError, PredictionResult};
use super::store::ModelStore;
use crate::analysis::FeatureEngineer;
use crate::ml::TrainControl;
use crate::recipe::{Recipe, with_measured_porosity};

/// Which predictor answers a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Ensemble when trained, correlation otherwise.
    #[default]
    Auto,
    Ensemble,
    Correlation,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Auto => "auto",
            Strategy::Ensemble => "ensemble",
            Strategy::Correlation => "correlation",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Strategy::Auto),
            "ensemble" | "ml" => Ok(Strategy::Ensemble),
            "correlation" => Ok(Strategy::Correlation),
            other => Err(format!("Unknown prediction strategy: {other}")),
        }
    }
}

/// Outcome of retraining both predictors.
#[derive(Debug)]
pub struct RetrainSummary {
    pub correlation_samples: usize,
    pub ensemble: Result<TrainOutcome, TrainError>,
}

#[derive(Debug)]
pub struct PredictionService {
    correlation: RwLock<CorrelationPredictor>,
    trainer: EnsembleTrainer,
    ensemble: EnsemblePredictor,
    store: Arc<ModelStore>,
}

impl PredictionService {
    pub fn new(
        engineer: FeatureEngineer,
        correlation: CorrelationSettings,
        ensemble: EnsembleSettings,
        store: Arc<ModelStore>,
    ) -> Self {
        Self {
            correlation: RwLock::new(CorrelationPredictor::new(engineer.clone(), correlation)),
            trainer: EnsembleTrainer::new(engineer.clone(), ensemble.clone(), Arc::clone(&store)),
            ensemble: EnsemblePredictor::new(engineer, ensemble, Arc::clone(&store)),
            store,
        }
    }

    pub fn store(&self) -> &Arc<ModelStore> {
        &self.store
    }

    pub fn train_correlation(&self, recipes: &[Recipe]) -> usize {
        let mut predictor = self.correlation.write().unwrap_or_else(|err| err.into_inner());
        predictor.train(recipes)
    }

    pub fn train_ensemble(
        &self,
        recipes: &[Recipe],
        control: &TrainControl,
    ) -> Result<TrainOutcome, TrainError> {
        self.trainer.train_models(recipes, control)
    }

    /// Retrain both predictors from the same recipe set.
    ///
    /// The correlation estimator always retrains; an ensemble failure is
    /// reported in the summary and keeps the previous model set installed.
    pub fn retrain(&self, recipes: &[Recipe], control: &TrainControl) -> RetrainSummary {
        let correlation_samples = self.train_correlation(recipes);
        let ensemble = self.train_ensemble(recipes, control);
        if let Err(err) = &ensemble {
            warn!("Ensemble retraining failed: {err}");
        }
        info!(correlation_samples, ensemble_ok = ensemble.is_ok(), "Retrain finished");
        RetrainSummary {
            correlation_samples,
            ensemble,
        }
    }

    pub fn correlation_predictor(&self) -> CorrelationPredictor {
        self.correlation
            .read()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    /// Trained flags plus whether `recipes` hold enough measured bakes.
    pub fn training_status(&self, recipes: &[Recipe]) -> TrainingStatus {
        let correlation = self.correlation_predictor();
        let measured_recipes = with_measured_porosity(recipes).len();
        TrainingStatus {
            correlation_trained: correlation.is_trained(),
            ensemble_trained: self.ensemble.is_trained(),
            measured_recipes,
            minimum_samples: MIN_TRAINING_SAMPLES,
            sufficient_data: measured_recipes >= MIN_TRAINING_SAMPLES,
            features_analyzed: correlation.model().map(|model| model.correlations.len()),
        }
    }

    pub fn model_info(&self) -> ModelInfo {
        let correlation = self.correlation_predictor();
        let significance = correlation.settings().significance;
        let correlation = correlation.model().map(|model| CorrelationInfo {
            training_samples: model.training_samples,
            features_analyzed: model.correlations.len(),
            significant_features: model.significant_features(significance),
            mean_porosity: model.porosity_mean,
        });
        let ensemble = self.store.current().map(|model| {
            let best = model.best_model();
            EnsembleInfo {
                trained_at: model.metadata.trained_at.clone(),
                training_samples: model.metadata.training_samples,
                families: model.models.iter().map(|m| m.kind()).collect(),
                best_model: best.map(|(kind, _)| kind),
                best_cv_r2: best.and_then(|(_, cv)| cv).map(|cv| cv.r2_mean),
            }
        });
        ModelInfo {
            correlation,
            ensemble,
        }
    }

    pub fn analyze_recipe_factors(&self, recipe: &Recipe) -> RecipeFactors {
        insight::recipe_factors(recipe)
    }

    /// Up to `limit` of `candidates` with hydration close to `recipe`'s.
    pub fn similar_recipes<'a>(
        &self,
        recipe: &Recipe,
        candidates: &'a [Recipe],
        limit: usize,
    ) -> Vec<SimilarRecipe<'a>> {
        insight::similar_recipes(recipe, candidates, limit)
    }

    pub fn predict(
        &self,
        recipe: &Recipe,
        strategy: Strategy,
    ) -> Result<PredictionResult, PredictError> {
        match strategy {
            Strategy::Correlation => self.predict_correlation(recipe),
            Strategy::Ensemble => self.ensemble.predict(recipe),
            Strategy::Auto => {
                if !self.ensemble.is_trained() {
                    debug!("No trained ensemble; using correlation estimate");
                    return self.predict_correlation(recipe);
                }
                let mut result = self.ensemble.predict(recipe)?;
                match self.predict_correlation(recipe) {
                    Ok(alternate) => {
                        result.confidence_info.alternate_prediction =
                            Some(alternate.predicted_porosity);
                    }
                    Err(err) => debug!("No alternate estimate: {err}"),
                }
                Ok(result)
            }
        }
    }

    fn predict_correlation(&self, recipe: &Recipe) -> Result<PredictionResult, PredictError> {
        self.correlation
            .read()
            .unwrap_or_else(|err| err.into_inner())
            .predict(recipe)
    }
}
