//! Correlation-weighted porosity estimator.
//!
//! Each feature acts as a univariate regression `ŷ = ȳ + σ_y · r · z`; the
//! estimate is the weighted average of those, with weights favouring strong
//! and significant correlations, then pulled partway back toward the mean.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::result::{
    ConfidenceInfo, FeatureWeight, PredictError, PredictionMethod, PredictionResult,
};
use crate::analysis::{FEATURE_COUNT, FEATURE_NAMES, FeatureEngineer, FeatureVector};
use crate::dataset::TrainingSet;
use crate::ml::metrics::mean_std;
use crate::recipe::Recipe;
use crate::stats::correlation::{FeatureCorrelation, feature_correlations};

/// Estimator tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationSettings {
    /// Fraction of the deviation from the training mean that is discarded.
    pub mean_blend: f64,
    pub clamp_min: f64,
    pub clamp_max: f64,
    /// p-value below which a correlation counts as significant.
    pub significance: f64,
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        Self {
            mean_blend: 0.5,
            clamp_min: 5.0,
            clamp_max: 50.0,
            significance: 0.05,
        }
    }
}

/// Statistics learned from the training set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationModel {
    pub correlations: Vec<FeatureCorrelation>,
    pub feature_mean: [f64; FEATURE_COUNT],
    pub feature_std: [f64; FEATURE_COUNT],
    pub porosity_mean: f64,
    pub porosity_std: f64,
    pub training_samples: usize,
}

impl CorrelationModel {
    pub fn fit(set: &TrainingSet) -> Option<Self> {
        if set.is_empty() {
            return None;
        }
        let mut feature_mean = [0.0; FEATURE_COUNT];
        let mut feature_std = [0.0; FEATURE_COUNT];
        for idx in 0..FEATURE_COUNT {
            let (m, s) = mean_std(&set.column(idx));
            feature_mean[idx] = m;
            feature_std[idx] = s;
        }
        let (porosity_mean, porosity_std) = mean_std(&set.targets());
        Some(Self {
            correlations: feature_correlations(set),
            feature_mean,
            feature_std,
            porosity_mean,
            porosity_std,
            training_samples: set.len(),
        })
    }

    pub fn significant_features(&self, alpha: f64) -> usize {
        self.correlations
            .iter()
            .filter(|c| c.correlation.is_significant(alpha))
            .count()
    }

    /// Feature z-scores; constant features map to 0.
    pub fn z_scores(&self, features: &FeatureVector) -> [f64; FEATURE_COUNT] {
        let values = features.to_array();
        let mut z = [0.0; FEATURE_COUNT];
        for idx in 0..FEATURE_COUNT {
            let std = self.feature_std[idx];
            if std > 1e-12 {
                z[idx] = (values[idx] - self.feature_mean[idx]) / std;
            }
        }
        z
    }
}

/// Confidence label from sample count and correlation strength.
pub fn confidence_label(training_samples: usize, significant_features: usize) -> &'static str {
    if training_samples < 3 {
        "Low (< 3 training samples)"
    } else if training_samples < 10 {
        "Medium (few training samples)"
    } else if significant_features < 2 {
        "Low (weak feature correlations)"
    } else {
        "High (good training data)"
    }
}

#[derive(Debug, Clone, Default)]
pub struct CorrelationPredictor {
    engineer: FeatureEngineer,
    settings: CorrelationSettings,
    model: Option<CorrelationModel>,
}

impl CorrelationPredictor {
    pub fn new(engineer: FeatureEngineer, settings: CorrelationSettings) -> Self {
        Self {
            engineer,
            settings,
            model: None,
        }
    }

    /// Learn correlations from the measured recipes; returns the sample count.
    pub fn train(&mut self, recipes: &[Recipe]) -> usize {
        let set = TrainingSet::from_recipes(recipes, &self.engineer);
        self.model = CorrelationModel::fit(&set);
        let samples = self.model.as_ref().map_or(0, |m| m.training_samples);
        info!(
            samples,
            skipped = set.skipped,
            "Correlation predictor trained"
        );
        samples
    }

    pub fn model(&self) -> Option<&CorrelationModel> {
        self.model.as_ref()
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    pub fn settings(&self) -> &CorrelationSettings {
        &self.settings
    }

    pub fn predict(&self, recipe: &Recipe) -> Result<PredictionResult, PredictError> {
        let model = self.model.as_ref().ok_or(PredictError::NotTrained)?;
        let features = self.engineer.engineer(recipe)?;
        let z = model.z_scores(&features);

        let mut weighted = 0.0;
        let mut weight_sum = 0.0;
        let mut contributions = Vec::with_capacity(FEATURE_COUNT);
        for (idx, corr) in model.correlations.iter().enumerate() {
            let r = corr.correlation.r;
            let p = corr.correlation.p_value;
            let w = r.abs() * (1.0 - p.min(1.0));
            weighted += w * r * z[idx];
            weight_sum += w;
            contributions.push(FeatureWeight {
                feature: FEATURE_NAMES[idx].to_string(),
                value: z[idx] * r,
            });
        }
        let deviation = if weight_sum > 0.0 {
            model.porosity_std * weighted / weight_sum
        } else {
            0.0
        };
        let raw = model.porosity_mean + deviation * (1.0 - self.settings.mean_blend);
        if !raw.is_finite() {
            return Err(PredictError::NonFinite);
        }
        let predicted = raw.clamp(self.settings.clamp_min, self.settings.clamp_max);
        debug!(recipe = %recipe.name, raw, predicted, "Correlation estimate");

        let significant = model.significant_features(self.settings.significance);
        let mut info = ConfidenceInfo::new(
            PredictionMethod::Correlation,
            model.training_samples,
            confidence_label(model.training_samples, significant).to_string(),
        );
        info.feature_contributions = contributions;
        Ok(PredictionResult {
            predicted_porosity: predicted,
            confidence_info: info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn loaf(water: f64, porosity: Option<f64>) -> Recipe {
        Recipe {
            name: format!("loaf {water}"),
            ingredients: BTreeMap::from([
                ("bread flour".into(), 500.0),
                ("water".into(), water),
                ("salt".into(), 10.0),
            ]),
            mixing_time_min: Some(10.0),
            proof_time_min: Some(240.0),
            cook_time_min: Some(40.0),
            oven_temp_c: Some(230.0),
            cooking_vessel: Some("dutch oven".into()),
            measured_porosity: porosity,
            ..Recipe::default()
        }
    }

    fn trained() -> CorrelationPredictor {
        let history = [
            (300.0, 22.0),
            (325.0, 25.0),
            (350.0, 28.0),
            (375.0, 31.0),
            (400.0, 34.0),
        ];
        let recipes: Vec<Recipe> = history
            .into_iter()
            .map(|(water, porosity)| loaf(water, Some(porosity)))
            .collect();
        let mut predictor = CorrelationPredictor::default();
        assert_eq!(predictor.train(&recipes), 5);
        predictor
    }

    #[test]
    fn untrained_predictor_reports_not_trained() {
        let predictor = CorrelationPredictor::default();
        assert!(matches!(
            predictor.predict(&loaf(350.0, None)),
            Err(PredictError::NotTrained)
        ));
    }

    #[test]
    fn training_without_measurements_leaves_it_untrained() {
        let mut predictor = CorrelationPredictor::default();
        assert_eq!(predictor.train(&[loaf(350.0, None)]), 0);
        assert!(!predictor.is_trained());
    }

    #[test]
    fn interpolates_between_training_points() {
        let predictor = trained();
        let result = predictor.predict(&loaf(350.0, None)).unwrap();
        // Share-weighted composite scores are slightly non-linear in water.
        assert!((result.predicted_porosity - 28.0).abs() < 0.5);
        let wetter = predictor.predict(&loaf(390.0, None)).unwrap();
        assert!(wetter.predicted_porosity > 28.0 && wetter.predicted_porosity < 34.0);
        assert_eq!(result.confidence_info.training_samples, 5);
        assert_eq!(result.confidence_info.confidence_level, "Medium (few training samples)");
        assert_eq!(result.confidence_info.feature_contributions.len(), FEATURE_COUNT);
    }

    #[test]
    fn predictions_are_deterministic_and_clamped() {
        let predictor = trained();
        let a = predictor.predict(&loaf(360.0, None)).unwrap();
        let b = predictor.predict(&loaf(360.0, None)).unwrap();
        assert_eq!(a, b);
        let extreme = predictor.predict(&loaf(5000.0, None)).unwrap();
        assert!(extreme.predicted_porosity <= 50.0);
        assert!(extreme.predicted_porosity >= 5.0);
    }

    #[test]
    fn malformed_query_is_an_error() {
        let predictor = trained();
        let mut query = loaf(350.0, None);
        query.oven_temp_c = None;
        assert!(matches!(predictor.predict(&query), Err(PredictError::Feature(_))));
    }

    #[test]
    fn confidence_labels_follow_thresholds() {
        assert_eq!(confidence_label(2, 10), "Low (< 3 training samples)");
        assert_eq!(confidence_label(9, 0), "Medium (few training samples)");
        assert_eq!(confidence_label(12, 1), "Low (weak feature correlations)");
        assert_eq!(confidence_label(12, 2), "High (good training data)");
    }
}
