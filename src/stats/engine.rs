//! Model diagnostics over the measured recipes.
//!
//! Every call recomputes from its inputs; nothing is cached between calls.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::correlation::{FeatureCorrelation, feature_correlations};
use super::distribution::students_t_quantile;
use crate::analysis::{FEATURE_COUNT, FEATURE_NAMES, FeatureEngineer};
use crate::dataset::TrainingSet;
use crate::ml::metrics::{mean_std, r2_score};
use crate::predict::PorosityPredictor;
use crate::recipe::Recipe;

/// Count, mean, population std and range of measured porosity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Two-sided t interval for a mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
    pub margin: f64,
    pub level: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureInterval {
    pub feature: String,
    #[serde(flatten)]
    pub interval: Interval,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceIntervals {
    pub porosity: Interval,
    pub features: Vec<FeatureInterval>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualEntry {
    pub recipe_name: String,
    pub actual: f64,
    pub predicted: f64,
    /// `actual - predicted`
    pub residual: f64,
    pub abs_error: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualAnalysis {
    pub entries: Vec<ResidualEntry>,
    pub mean_residual: f64,
    pub std_residual: f64,
    pub mae: f64,
    pub max_abs_error: f64,
    pub rmse: f64,
}

/// Correlation-derived importance of one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
    pub correlation: f64,
    pub p_value: f64,
}

/// Everything the statistics view shows, computed in one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub training_stats: Option<TrainingSummary>,
    pub r_squared: f64,
    pub confidence_intervals: Option<ConfidenceIntervals>,
    pub residuals: Option<ResidualAnalysis>,
    pub feature_importance: Vec<FeatureImportance>,
    pub correlations: Vec<FeatureCorrelation>,
}

#[derive(Debug, Clone)]
pub struct StatisticsEngine {
    engineer: FeatureEngineer,
    confidence_level: f64,
    significance: f64,
}

impl Default for StatisticsEngine {
    fn default() -> Self {
        Self::new(FeatureEngineer::default(), 0.95, 0.05)
    }
}

impl StatisticsEngine {
    pub fn new(engineer: FeatureEngineer, confidence_level: f64, significance: f64) -> Self {
        Self {
            engineer,
            confidence_level,
            significance,
        }
    }

    pub fn confidence_level(&self) -> f64 {
        self.confidence_level
    }

    fn training_set(&self, recipes: &[Recipe]) -> TrainingSet {
        TrainingSet::from_recipes(recipes, &self.engineer)
    }

    pub fn training_summary(&self, recipes: &[Recipe]) -> Option<TrainingSummary> {
        let targets = self.training_set(recipes).targets();
        if targets.is_empty() {
            return None;
        }
        let (mean, std) = mean_std(&targets);
        Some(TrainingSummary {
            count: targets.len(),
            mean,
            std,
            min: targets.iter().copied().fold(f64::INFINITY, f64::min),
            max: targets.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }

    /// Training-set R² of `predictor`, clamped to `[0, 1]`.
    pub fn r_squared(&self, recipes: &[Recipe], predictor: &dyn PorosityPredictor) -> f64 {
        let entries = self.predict_measured(recipes, predictor);
        if entries.len() < 2 {
            return 0.0;
        }
        let actual: Vec<f64> = entries.iter().map(|e| e.actual).collect();
        let predicted: Vec<f64> = entries.iter().map(|e| e.predicted).collect();
        r2_score(&actual, &predicted).clamp(0.0, 1.0)
    }

    /// t intervals for mean porosity and each feature mean; needs two samples.
    pub fn confidence_intervals(&self, recipes: &[Recipe]) -> Option<ConfidenceIntervals> {
        let set = self.training_set(recipes);
        if set.len() < 2 {
            return None;
        }
        let porosity = t_interval(&set.targets(), self.confidence_level)?;
        let features = (0..FEATURE_COUNT)
            .filter_map(|idx| {
                t_interval(&set.column(idx), self.confidence_level).map(|interval| FeatureInterval {
                    feature: FEATURE_NAMES[idx].to_string(),
                    interval,
                })
            })
            .collect();
        Some(ConfidenceIntervals { porosity, features })
    }

    pub fn residuals(
        &self,
        recipes: &[Recipe],
        predictor: &dyn PorosityPredictor,
    ) -> Option<ResidualAnalysis> {
        let entries = self.predict_measured(recipes, predictor);
        if entries.len() < 2 {
            return None;
        }
        let residuals: Vec<f64> = entries.iter().map(|e| e.residual).collect();
        let (mean_residual, std_residual) = mean_std(&residuals);
        let n = entries.len() as f64;
        let mae = entries.iter().map(|e| e.abs_error).sum::<f64>() / n;
        let max_abs_error = entries.iter().map(|e| e.abs_error).fold(0.0, f64::max);
        let rmse = (residuals.iter().map(|r| r * r).sum::<f64>() / n).sqrt();
        Some(ResidualAnalysis {
            entries,
            mean_residual,
            std_residual,
            mae,
            max_abs_error,
            rmse,
        })
    }

    pub fn feature_correlations(&self, recipes: &[Recipe]) -> Vec<FeatureCorrelation> {
        let set = self.training_set(recipes);
        if set.is_empty() {
            return Vec::new();
        }
        feature_correlations(&set)
    }

    /// `|r| × (1 + 2w)` per feature, where `w` rewards p-values below the
    /// significance level; most important first.
    pub fn feature_importance(&self, recipes: &[Recipe]) -> Vec<FeatureImportance> {
        let mut importance: Vec<FeatureImportance> = self
            .feature_correlations(recipes)
            .into_iter()
            .map(|fc| {
                let r = fc.correlation.r;
                let p = fc.correlation.p_value;
                let weight = if p < self.significance && self.significance > 0.0 {
                    (self.significance - p) / self.significance
                } else {
                    0.0
                };
                FeatureImportance {
                    feature: fc.feature,
                    importance: r.abs() * (1.0 + 2.0 * weight),
                    correlation: r,
                    p_value: p,
                }
            })
            .collect();
        importance.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        importance
    }

    pub fn dashboard(&self, recipes: &[Recipe], predictor: &dyn PorosityPredictor) -> Dashboard {
        Dashboard {
            training_stats: self.training_summary(recipes),
            r_squared: self.r_squared(recipes, predictor),
            confidence_intervals: self.confidence_intervals(recipes),
            residuals: self.residuals(recipes, predictor),
            feature_importance: self.feature_importance(recipes),
            correlations: self.feature_correlations(recipes),
        }
    }

    fn predict_measured(
        &self,
        recipes: &[Recipe],
        predictor: &dyn PorosityPredictor,
    ) -> Vec<ResidualEntry> {
        recipes
            .iter()
            .filter_map(|recipe| {
                let actual = recipe.porosity()?;
                match predictor.predict_porosity(recipe) {
                    Ok(result) => {
                        let predicted = result.predicted_porosity;
                        let residual = actual - predicted;
                        Some(ResidualEntry {
                            recipe_name: recipe.name.clone(),
                            actual,
                            predicted,
                            residual,
                            abs_error: residual.abs(),
                        })
                    }
                    Err(err) => {
                        debug!(recipe = %recipe.name, "No prediction for residuals: {err}");
                        None
                    }
                }
            })
            .collect()
    }
}

/// Interval from the sample standard deviation (n - 1 denominator).
fn t_interval(values: &[f64], level: f64) -> Option<Interval> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let mean = values.iter().sum::<f64>() / nf;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (nf - 1.0);
    let t = students_t_quantile((1.0 + level) / 2.0, nf - 1.0);
    if !t.is_finite() {
        return None;
    }
    let margin = t * variance.sqrt() / nf.sqrt();
    Some(Interval {
        mean,
        lower: mean - margin,
        upper: mean + margin,
        margin,
        level,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::{
        ConfidenceInfo, PredictError, PredictionMethod, PredictionResult,
    };
    use std::collections::BTreeMap;

    struct Constant(f64);

    impl PorosityPredictor for Constant {
        fn predict_porosity(&self, _recipe: &Recipe) -> Result<PredictionResult, PredictError> {
            Ok(PredictionResult {
                predicted_porosity: self.0,
                confidence_info: ConfidenceInfo::new(
                    PredictionMethod::Correlation,
                    0,
                    String::new(),
                ),
            })
        }
    }

    struct Untrained;

    impl PorosityPredictor for Untrained {
        fn predict_porosity(&self, _recipe: &Recipe) -> Result<PredictionResult, PredictError> {
            Err(PredictError::NotTrained)
        }
    }

    fn loaf(water: f64, porosity: f64) -> Recipe {
        Recipe {
            name: format!("loaf {water}"),
            ingredients: BTreeMap::from([("bread flour".into(), 500.0), ("water".into(), water)]),
            mixing_time_min: Some(10.0),
            proof_time_min: Some(240.0),
            cook_time_min: Some(40.0),
            oven_temp_c: Some(230.0),
            measured_porosity: Some(porosity),
            ..Recipe::default()
        }
    }

    fn recipes() -> Vec<Recipe> {
        [(300.0, 20.0), (325.0, 22.0), (350.0, 24.0), (375.0, 26.0), (400.0, 28.0)]
            .into_iter()
            .map(|(w, p)| loaf(w, p))
            .collect()
    }

    #[test]
    fn training_summary_uses_population_std() {
        let summary = StatisticsEngine::default().training_summary(&recipes()).unwrap();
        assert_eq!(summary.count, 5);
        assert!((summary.mean - 24.0).abs() < 1e-12);
        assert!((summary.std - 8f64.sqrt()).abs() < 1e-12);
        assert_eq!((summary.min, summary.max), (20.0, 28.0));
        assert!(StatisticsEngine::default().training_summary(&[]).is_none());
    }

    #[test]
    fn porosity_interval_uses_t_quantile() {
        let intervals = StatisticsEngine::default().confidence_intervals(&recipes()).unwrap();
        // t(0.975, 4) = 2.776, s = sqrt(10)
        let expected = 2.776_445 * 10f64.sqrt() / 5f64.sqrt();
        assert!((intervals.porosity.margin - expected).abs() < 1e-3);
        assert!((intervals.porosity.lower - (24.0 - expected)).abs() < 1e-3);
        assert_eq!(intervals.features.len(), FEATURE_COUNT);
        assert!(
            StatisticsEngine::default()
                .confidence_intervals(&recipes()[..1])
                .is_none()
        );
    }

    #[test]
    fn residuals_against_constant_predictor() {
        let analysis = StatisticsEngine::default()
            .residuals(&recipes(), &Constant(25.0))
            .unwrap();
        assert_eq!(analysis.entries.len(), 5);
        assert_eq!(analysis.entries[0].residual, -5.0);
        assert!((analysis.mean_residual + 1.0).abs() < 1e-12);
        assert!((analysis.mae - 2.6).abs() < 1e-12);
        assert_eq!(analysis.max_abs_error, 5.0);
        assert!((analysis.rmse - 3.0).abs() < 1e-12);
    }

    #[test]
    fn r_squared_is_clamped() {
        let engine = StatisticsEngine::default();
        assert_eq!(engine.r_squared(&recipes(), &Constant(100.0)), 0.0);
        assert_eq!(engine.r_squared(&recipes(), &Untrained), 0.0);
        assert_eq!(engine.r_squared(&recipes()[..1], &Constant(20.0)), 0.0);
    }

    #[test]
    fn importance_rewards_significance() {
        let importance = StatisticsEngine::default().feature_importance(&recipes());
        assert_eq!(importance.len(), FEATURE_COUNT);
        let hydration = importance
            .iter()
            .find(|fi| fi.feature == "hydration_ratio")
            .unwrap();
        assert!(hydration.p_value < 0.05);
        assert!(hydration.importance > hydration.correlation.abs());
        assert!(importance.windows(2).all(|w| w[0].importance >= w[1].importance));
    }

    #[test]
    fn dashboard_serializes_every_section() {
        let dashboard = StatisticsEngine::default().dashboard(&recipes(), &Constant(24.0));
        let json = serde_json::to_value(&dashboard).unwrap();
        for key in [
            "training_stats",
            "r_squared",
            "confidence_intervals",
            "residuals",
            "feature_importance",
            "correlations",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }
}
