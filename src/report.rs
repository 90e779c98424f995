//! Plain-text reports for predictions, training runs, and feature statistics.

use std::fmt::Write;

use crate::analysis::{EngineeredRecipe, FEATURE_NAMES};
use crate::predict::{
    ModelInfo, ModelMetadata, PredictionResult, RecipeFactors, SimilarRecipe, TrainingStatus,
};
use crate::recipe::Recipe;
use crate::stats::FeatureCorrelation;

const WIDE_RULE: usize = 70;
const NARROW_RULE: usize = 50;
const IMPORTANCE_ROWS: usize = 15;
const BAR_WIDTH: usize = 40;

fn rule(ch: char, width: usize) -> String {
    ch.to_string().repeat(width)
}

/// Full account of one prediction, with the recipe's composition and process.
pub fn prediction_report(
    recipe: &Recipe,
    result: &PredictionResult,
    detail: Option<&EngineeredRecipe>,
) -> String {
    let info = &result.confidence_info;
    let mut out = String::new();
    let _ = writeln!(out, "\nPOROSITY PREDICTION REPORT");
    let _ = writeln!(out, "{}", rule('=', WIDE_RULE));
    let _ = writeln!(out, "Recipe: {}", recipe.name);
    let _ = writeln!(out, "Prediction Method: {}", info.method.label());
    let _ = writeln!(out, "\nPREDICTED POROSITY: {:.1}%", result.predicted_porosity);
    if let Some(uncertainty) = info.uncertainty {
        let _ = writeln!(out, "Prediction Uncertainty: ±{uncertainty:.1}%");
    }
    if let Some(alternate) = info.alternate_prediction {
        let _ = writeln!(out, "Correlation Estimate: {alternate:.1}%");
    }
    let _ = writeln!(out, "Training Samples: {}", info.training_samples);
    let _ = writeln!(out, "Confidence Level: {}", info.confidence_level);

    if let Some(explanation) = &info.explanation {
        let _ = writeln!(out, "\nKEY FACTORS:");
        let _ = writeln!(out, "{}", rule('-', WIDE_RULE));
        for factor in &explanation.factors {
            let _ = writeln!(out, "  • {factor}");
        }
    }

    if let Some(detail) = detail {
        let c = &detail.composition;
        let _ = writeln!(out, "\nINGREDIENT COMPOSITION:");
        let _ = writeln!(out, "{}", rule('-', WIDE_RULE));
        let _ = writeln!(out, "  Hydration Ratio: {:.2}", c.hydration_ratio);
        let _ = writeln!(out, "  Gluten Development Score: {:.2}", c.gluten_development_score);
        let _ = writeln!(out, "  Enzymatic Activity Score: {:.2}", c.enzymatic_activity_score);
        let _ = writeln!(out, "  Salt %: {:.2}%", c.salt_percentage);
        let _ = writeln!(out, "  Sugar %: {:.2}%", c.sugar_percentage);
        let _ = writeln!(out, "  Fat %: {:.2}%", c.fat_percentage);

        let i = &detail.instructions;
        let _ = writeln!(out, "\nPROCESS ANALYSIS:");
        let _ = writeln!(out, "{}", rule('-', WIDE_RULE));
        let _ = writeln!(out, "  Mixing Intensity: {:.2}", i.mixing_intensity);
        let _ = writeln!(
            out,
            "  Fermentation Temperature Factor: {:.2}",
            i.fermentation_temperature_factor
        );
        if i.has_bulk_ferment {
            let _ = writeln!(out, "  ✓ Has bulk fermentation");
        }
        if i.has_cold_ferment {
            let _ = writeln!(out, "  ✓ Has cold fermentation (slow fermentation = finer crumb)");
        }
        if i.has_stretch_fold {
            let _ = writeln!(out, "  ✓ Uses stretch and fold (develops gluten)");
        }
    }
    let _ = writeln!(out, "\n{}", rule('=', WIDE_RULE));
    out
}

/// Per-family cross-validation and training-set metrics.
pub fn training_report(metadata: &ModelMetadata) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "ML MODEL TRAINING REPORT");
    let _ = writeln!(out, "{}", rule('=', WIDE_RULE));
    let _ = writeln!(out, "Timestamp: {}", metadata.trained_at);
    let _ = writeln!(out, "Training Samples: {}", metadata.training_samples);
    let _ = writeln!(out, "Number of Features: {}", metadata.feature_names.len());
    let _ = writeln!(out, "\n{:^width$}", "MODEL PERFORMANCE", width = WIDE_RULE);
    let _ = writeln!(out, "{}", rule('-', WIDE_RULE));

    for (kind, report) in &metadata.models {
        let name = kind.as_str().to_uppercase();
        if !report.trained {
            let _ = writeln!(out, "\n{name}: Not trained");
            if let Some(error) = &report.error {
                let _ = writeln!(out, "  Error: {error}");
            }
            continue;
        }
        let _ = writeln!(out, "\n{name}");
        match &report.cross_validation {
            Some(cv) => {
                let _ = writeln!(out, "  Cross-Val R²:  {:.3} ± {:.3}", cv.r2_mean, cv.r2_std);
                let _ = writeln!(out, "  Cross-Val MAE: {:.2} ± {:.2}%", cv.mae_mean, cv.mae_std);
            }
            None => {
                let _ = writeln!(out, "  Cross-Val:     skipped (too few samples)");
            }
        }
        if let Some(training) = &report.training {
            let _ = writeln!(out, "  Train R²:      {:.3}", training.r2);
            let _ = writeln!(out, "  Train RMSE:    {:.2}%", training.rmse);
        }
    }
    out
}

/// Bar chart of the fifteen most important features.
pub fn feature_importance_report(importance: Option<&[f64]>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "FEATURE IMPORTANCE FOR POROSITY PREDICTION");
    let _ = writeln!(out, "{}", rule('=', WIDE_RULE));
    let Some(importance) = importance.filter(|values| !values.is_empty()) else {
        let _ = writeln!(out, "Feature importance not available");
        return out;
    };
    let mut order: Vec<usize> = (0..importance.len()).collect();
    order.sort_by(|&a, &b| importance[b].total_cmp(&importance[a]).then(a.cmp(&b)));
    for (rank, idx) in order.into_iter().take(IMPORTANCE_ROWS).enumerate() {
        let name = FEATURE_NAMES
            .get(idx)
            .map_or_else(|| format!("Feature {idx}"), |name| name.to_string());
        let pct = importance[idx] * 100.0;
        let filled = ((pct / 2.5).max(0.0) as usize).min(BAR_WIDTH);
        let bar = format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled));
        let _ = writeln!(out, "{:2}. {name:30} {pct:5.1}% {bar}", rank + 1);
    }
    out
}

/// Correlation table with `***` for p < 0.05 and `**` for p < 0.1.
pub fn correlations_report(correlations: &[FeatureCorrelation]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "FEATURE CORRELATIONS WITH POROSITY");
    let _ = writeln!(out, "{}", rule('=', NARROW_RULE));
    for fc in correlations {
        let r = fc.correlation.r;
        let p = fc.correlation.p_value;
        let stars = if p < 0.05 {
            "***"
        } else if p < 0.1 {
            "**"
        } else {
            ""
        };
        let _ = writeln!(out, "{:20} {r:+.3}  (p={p:.3}) {stars}", fc.feature);
    }
    let _ = writeln!(out, "\n*** p < 0.05 (significant)");
    let _ = writeln!(out, "**  p < 0.1  (marginally significant)");
    out
}

/// Hydration, time and oven notes for one recipe.
pub fn recipe_factors_report(factors: &RecipeFactors) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "RECIPE FACTORS");
    let _ = writeln!(out, "{}", rule('-', NARROW_RULE));
    match factors.hydration_ratio {
        Some(hydration) => {
            let _ = writeln!(out, "  Hydration Ratio: {hydration:.2}");
        }
        None => {
            let _ = writeln!(out, "  Hydration Ratio: n/a");
        }
    }
    let _ = writeln!(out, "  Total Time: {:.1} h", factors.total_time_hours);
    let _ = writeln!(out, "  Ingredients: {}", factors.ingredient_count);
    for note in &factors.notes {
        let _ = writeln!(out, "  • {note}");
    }
    out
}

/// Training state of both predictors and what they learned.
pub fn status_report(status: &TrainingStatus, info: &ModelInfo) -> String {
    let yes_no = |flag: bool| if flag { "yes" } else { "no" };
    let mut out = String::new();
    let _ = writeln!(out, "MODEL STATUS");
    let _ = writeln!(out, "{}", rule('=', NARROW_RULE));
    let _ = writeln!(
        out,
        "Measured Recipes: {} (minimum {}, sufficient: {})",
        status.measured_recipes,
        status.minimum_samples,
        yes_no(status.sufficient_data)
    );
    let _ = writeln!(out, "Correlation Trained: {}", yes_no(status.correlation_trained));
    if let Some(correlation) = &info.correlation {
        let _ = writeln!(
            out,
            "  {} samples, {} features, {} significant, mean porosity {:.1}%",
            correlation.training_samples,
            correlation.features_analyzed,
            correlation.significant_features,
            correlation.mean_porosity
        );
    }
    let _ = writeln!(out, "Ensemble Trained: {}", yes_no(status.ensemble_trained));
    if let Some(ensemble) = &info.ensemble {
        let families: Vec<&str> = ensemble.families.iter().map(|kind| kind.as_str()).collect();
        let _ = writeln!(out, "  Trained At: {}", ensemble.trained_at);
        let _ = writeln!(out, "  Samples: {}", ensemble.training_samples);
        let _ = writeln!(out, "  Families: {}", families.join(", "));
        if let Some(best) = ensemble.best_model {
            match ensemble.best_cv_r2 {
                Some(r2) => {
                    let _ = writeln!(out, "  Best Model: {} (CV R² {r2:.3})", best.as_str());
                }
                None => {
                    let _ = writeln!(out, "  Best Model: {}", best.as_str());
                }
            }
        }
    }
    out
}

/// Ranked list of recipes with similar hydration.
pub fn similar_report(recipe: &Recipe, similar: &[SimilarRecipe<'_>]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "RECIPES SIMILAR TO {}", recipe.name);
    let _ = writeln!(out, "{}", rule('=', NARROW_RULE));
    if similar.is_empty() {
        let _ = writeln!(out, "No recipes with similar hydration");
        return out;
    }
    for (rank, entry) in similar.iter().enumerate() {
        let porosity = entry
            .recipe
            .porosity()
            .map_or_else(|| "unmeasured".to_string(), |p| format!("{p:.1}%"));
        let _ = writeln!(
            out,
            "{:2}. {:30} similarity {:.2}  porosity {porosity}",
            rank + 1,
            entry.recipe.name,
            entry.similarity
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::FeatureEngineer;
    use crate::ml::{CvSummary, FitMetrics, RegressorKind};
    use crate::predict::{ConfidenceInfo, Explanation, ModelReport, PredictionMethod};
    use crate::stats::Correlation;
    use std::collections::BTreeMap;

    fn recipe() -> Recipe {
        Recipe {
            name: "Country loaf".into(),
            ingredients: BTreeMap::from([
                ("bread flour".into(), 500.0),
                ("water".into(), 375.0),
                ("salt".into(), 10.0),
            ]),
            mixing_time_min: Some(10.0),
            proof_time_min: Some(600.0),
            cook_time_min: Some(45.0),
            oven_temp_c: Some(245.0),
            instructions: Some(
                "Bulk ferment 4 hours with stretch and fold.\nRetard in fridge overnight.".into(),
            ),
            ..Recipe::default()
        }
    }

    #[test]
    fn prediction_report_lists_sections() {
        let recipe = recipe();
        let detail = FeatureEngineer::default().engineer_detailed(&recipe).unwrap();
        let mut info = ConfidenceInfo::new(PredictionMethod::Ensemble, 12, "High".into());
        info.uncertainty = Some(1.3);
        info.explanation = Some(Explanation {
            factors: vec!["High hydration → larger holes potential".into()],
            primary_factor: None,
        });
        let result = PredictionResult {
            predicted_porosity: 27.34,
            confidence_info: info,
        };
        let text = prediction_report(&recipe, &result, Some(&detail));
        assert!(text.contains("Recipe: Country loaf"));
        assert!(text.contains("PREDICTED POROSITY: 27.3%"));
        assert!(text.contains("Prediction Uncertainty: ±1.3%"));
        assert!(text.contains("  • High hydration → larger holes potential"));
        assert!(text.contains("Hydration Ratio: 0.75"));
        assert!(text.contains("✓ Uses stretch and fold"));
    }

    #[test]
    fn training_report_marks_failed_families() {
        let metadata = ModelMetadata {
            trained_at: "2026-01-01T00:00:00Z".into(),
            training_samples: 9,
            feature_names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
            schema_version: 1,
            models: BTreeMap::from([
                (
                    RegressorKind::Ridge,
                    ModelReport {
                        trained: true,
                        cross_validation: Some(CvSummary {
                            folds: 5,
                            r2_mean: 0.612,
                            ..CvSummary::default()
                        }),
                        training: Some(FitMetrics {
                            r2: 0.8,
                            mae: 1.0,
                            rmse: 1.5,
                        }),
                        error: None,
                    },
                ),
                (RegressorKind::Linear, ModelReport::failed("singular")),
            ]),
        };
        let text = training_report(&metadata);
        assert!(text.contains("Training Samples: 9"));
        assert!(text.contains("Number of Features: 20"));
        assert!(text.contains("RIDGE\n  Cross-Val R²:  0.612 ± 0.000"));
        assert!(text.contains("LINEAR: Not trained"));
    }

    #[test]
    fn importance_bars_are_fixed_width() {
        let mut importance = vec![0.0; FEATURE_NAMES.len()];
        importance[0] = 0.5;
        importance[3] = 0.25;
        let text = feature_importance_report(Some(&importance));
        let first = text.lines().nth(2).unwrap();
        assert!(first.starts_with(" 1. hydration_ratio"));
        assert!(first.contains(" 50.0% "));
        assert_eq!(first.chars().filter(|c| *c == '█').count(), 20);
        assert_eq!(first.chars().filter(|c| *c == '█' || *c == '░').count(), 40);
        assert_eq!(text.lines().count(), 2 + 15);
        assert!(feature_importance_report(None).contains("not available"));
    }

    #[test]
    fn correlation_rows_carry_significance_stars() {
        let rows = vec![
            FeatureCorrelation {
                feature: "hydration_ratio".into(),
                correlation: Correlation { r: 0.91, p_value: 0.01 },
            },
            FeatureCorrelation {
                feature: "salt_percentage".into(),
                correlation: Correlation { r: -0.4, p_value: 0.08 },
            },
        ];
        let text = correlations_report(&rows);
        assert!(text.contains("hydration_ratio      +0.910  (p=0.010) ***"));
        assert!(text.contains("salt_percentage      -0.400  (p=0.080) **"));
        assert!(text.ends_with("**  p < 0.1  (marginally significant)\n"));
    }

    #[test]
    fn factors_report_lists_notes() {
        let mut recipe = recipe();
        recipe.oven_temp_c = Some(260.0);
        let text = recipe_factors_report(&crate::predict::insight::recipe_factors(&recipe));
        assert!(text.contains("Hydration Ratio: 0.75"));
        assert!(text.contains("• High oven temperature may create larger holes"));
    }

    #[test]
    fn similar_report_marks_unmeasured_recipes() {
        let query = recipe();
        let mut measured = recipe();
        measured.name = "Sister loaf".into();
        measured.measured_porosity = Some(27.5);
        let unmeasured = recipe();
        let similar = [
            SimilarRecipe {
                recipe: &measured,
                similarity: 0.98,
            },
            SimilarRecipe {
                recipe: &unmeasured,
                similarity: 0.9,
            },
        ];
        let text = similar_report(&query, &similar);
        assert!(text.contains(" 1. Sister loaf"));
        assert!(text.contains("porosity 27.5%"));
        assert!(text.contains("porosity unmeasured"));
        assert!(similar_report(&query, &[]).contains("No recipes with similar hydration"));
    }

    #[test]
    fn status_report_shows_untrained_predictors() {
        let status = TrainingStatus {
            correlation_trained: false,
            ensemble_trained: false,
            measured_recipes: 2,
            minimum_samples: 3,
            sufficient_data: false,
            features_analyzed: None,
        };
        let text = status_report(&status, &ModelInfo::default());
        assert!(text.contains("Measured Recipes: 2 (minimum 3, sufficient: no)"));
        assert!(text.contains("Ensemble Trained: no"));
        assert!(!text.contains("Families"));
    }
}
