//! Recipe-level summaries that sit beside the predictors: rule-of-thumb
//! process notes, hydration similarity, and what the trained models know.

use serde::Serialize;

use crate::analysis::analyze_ingredients;
use crate::ml::RegressorKind;
use crate::recipe::Recipe;

/// Fewest measured recipes worth training on.
pub const MIN_TRAINING_SAMPLES: usize = 3;
/// Similarity a candidate must exceed to be reported.
pub const SIMILARITY_THRESHOLD: f64 = 0.7;

/// Plain-language notes on hydration, total time and oven heat.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeFactors {
    /// Water over flour; `None` when either is missing.
    pub hydration_ratio: Option<f64>,
    pub total_time_hours: f64,
    pub ingredient_count: usize,
    pub notes: Vec<String>,
}

pub fn recipe_factors(recipe: &Recipe) -> RecipeFactors {
    let hydration_ratio = hydration_of(recipe);
    let total_time_hours = recipe.total_time_hours();
    let mut notes = Vec::new();

    if let Some(hydration) = hydration_ratio {
        notes.push(
            if hydration < 0.6 {
                "Low hydration may result in denser crumb"
            } else if hydration > 0.8 {
                "High hydration may increase porosity"
            } else {
                "Hydration ratio is in optimal range"
            }
            .to_string(),
        );
    }
    if total_time_hours < 8.0 {
        notes.push("Short fermentation time may limit porosity development".to_string());
    } else if total_time_hours > 24.0 {
        notes.push("Long fermentation may increase porosity".to_string());
    }
    match recipe.oven_temp_c {
        Some(temp) if temp > 250.0 => {
            notes.push("High oven temperature may create larger holes".to_string());
        }
        Some(temp) if temp < 200.0 => {
            notes.push("Low oven temperature may result in denser crumb".to_string());
        }
        _ => {}
    }

    RecipeFactors {
        hydration_ratio,
        total_time_hours,
        ingredient_count: recipe.ingredients.len(),
        notes,
    }
}

fn hydration_of(recipe: &Recipe) -> Option<f64> {
    let ratio = analyze_ingredients(&recipe.ingredients).hydration_ratio;
    (ratio > 0.0 && ratio.is_finite()).then_some(ratio)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarRecipe<'a> {
    pub recipe: &'a Recipe,
    /// `1 − |Δ hydration|`.
    pub similarity: f64,
}

/// Candidates whose hydration is close to `recipe`'s, most similar first.
///
/// A candidate sharing `recipe`'s id is the recipe itself and is skipped.
pub fn similar_recipes<'a>(
    recipe: &Recipe,
    candidates: &'a [Recipe],
    limit: usize,
) -> Vec<SimilarRecipe<'a>> {
    let Some(hydration) = hydration_of(recipe) else {
        return Vec::new();
    };
    let mut similar: Vec<SimilarRecipe<'a>> = candidates
        .iter()
        .filter(|other| recipe.id.is_none() || other.id != recipe.id)
        .filter_map(|other| {
            let similarity = 1.0 - (hydration - hydration_of(other)?).abs();
            (similarity > SIMILARITY_THRESHOLD).then_some(SimilarRecipe {
                recipe: other,
                similarity,
            })
        })
        .collect();
    similar.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    similar.truncate(limit);
    similar
}

/// Whether the predictors are trained and whether there is enough data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingStatus {
    pub correlation_trained: bool,
    pub ensemble_trained: bool,
    /// Offered recipes that carry a measured porosity.
    pub measured_recipes: usize,
    pub minimum_samples: usize,
    pub sufficient_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features_analyzed: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationInfo {
    pub training_samples: usize,
    pub features_analyzed: usize,
    pub significant_features: usize,
    pub mean_porosity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleInfo {
    pub trained_at: String,
    pub training_samples: usize,
    pub families: Vec<RegressorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_model: Option<RegressorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_cv_r2: Option<f64>,
}

/// What each predictor has learned; `None` for an untrained one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelInfo {
    pub correlation: Option<CorrelationInfo>,
    pub ensemble: Option<EnsembleInfo>,
}
