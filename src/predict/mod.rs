//! Porosity predictors and the persisted model store.

pub mod correlation;
pub mod ensemble;
pub mod insight;
pub mod result;
pub mod service;
pub mod store;

pub use correlation::{CorrelationModel, CorrelationPredictor, CorrelationSettings};
pub use ensemble::{
    EnsemblePredictor, EnsembleSettings, EnsembleTrainer, TrainError, TrainOutcome,
};
pub use insight::{
    CorrelationInfo, EnsembleInfo, ModelInfo, RecipeFactors, SimilarRecipe, TrainingStatus,
};
pub use result::{
    ConfidenceInfo, Explanation, FeatureWeight, ModelPerformance, ModelPrediction, PredictError,
    PredictionMethod, PredictionResult,
};
pub use service::{PredictionService, RetrainSummary, Strategy};
pub use store::{ModelMetadata, ModelReport, ModelStore, StoreError, TrainedModel};

use crate::recipe::Recipe;

/// Anything that turns a recipe into a porosity estimate.
pub trait PorosityPredictor: Send + Sync {
    fn predict_porosity(&self, recipe: &Recipe) -> Result<PredictionResult, PredictError>;
}

impl PorosityPredictor for CorrelationPredictor {
    fn predict_porosity(&self, recipe: &Recipe) -> Result<PredictionResult, PredictError> {
        self.predict(recipe)
    }
}

impl PorosityPredictor for EnsemblePredictor {
    fn predict_porosity(&self, recipe: &Recipe) -> Result<PredictionResult, PredictError> {
        self.predict(recipe)
    }
}

/// The service answers with [`Strategy::Auto`].
impl PorosityPredictor for PredictionService {
    fn predict_porosity(&self, recipe: &Recipe) -> Result<PredictionResult, PredictError> {
        self.predict(recipe, Strategy::Auto)
    }
}
