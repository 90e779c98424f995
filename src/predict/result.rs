//! Prediction outputs and errors shared by both strategies.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::FeatureError;
use crate::ml::RegressorKind;

/// Which strategy produced a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMethod {
    Correlation,
    Ensemble,
    /// Single family with the best cross-validated R².
    BestModel,
}

impl PredictionMethod {
    pub fn label(self) -> &'static str {
        match self {
            PredictionMethod::Correlation => "Correlation-weighted estimate",
            PredictionMethod::Ensemble => "Ensemble average",
            PredictionMethod::BestModel => "Best single model",
        }
    }
}

/// A named feature with its value or weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeight {
    pub feature: String,
    pub value: f64,
}

/// One ensemble member's raw (unclamped) estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrediction {
    pub model: RegressorKind,
    pub porosity: f64,
}

/// Human-readable account of the main drivers behind a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub factors: Vec<String>,
    pub primary_factor: Option<String>,
}

impl Explanation {
    pub fn summary(&self) -> String {
        if self.factors.is_empty() {
            "Analysis unavailable".to_string()
        } else {
            self.factors.join(", ")
        }
    }
}

/// Best family according to cross-validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformance {
    pub best_model: RegressorKind,
    pub r2_score: f64,
    pub mae: f64,
}

/// Everything reported alongside the point estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInfo {
    pub method: PredictionMethod,
    pub training_samples: usize,
    pub confidence_level: String,
    /// Standard deviation across ensemble members.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<f64>,
    /// Per-feature `z × r` terms from the correlation estimator, schema order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feature_contributions: Vec<FeatureWeight>,
    /// Raw value of the most important features, most important first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_features: Vec<FeatureWeight>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub model_predictions: Vec<ModelPrediction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_performance: Option<ModelPerformance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Explanation>,
    /// Estimate from the other strategy, when both ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_prediction: Option<f64>,
}

impl ConfidenceInfo {
    pub fn new(
        method: PredictionMethod,
        training_samples: usize,
        confidence_level: String,
    ) -> Self {
        Self {
            method,
            training_samples,
            confidence_level,
            uncertainty: None,
            feature_contributions: Vec::new(),
            top_features: Vec::new(),
            model_predictions: Vec::new(),
            model_performance: None,
            explanation: None,
            alternate_prediction: None,
        }
    }
}

/// Point estimate plus confidence report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted_porosity: f64,
    pub confidence_info: ConfidenceInfo,
}

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("Predictor has not been trained")]
    NotTrained,
    #[error("No trained models available")]
    NoTrainedModels,
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error("Model produced a non-finite prediction")]
    NonFinite,
}
