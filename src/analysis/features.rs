//! Fixed-schema feature vector engineered from a recipe.
//!
//! Both predictors and every persisted model depend on the field order
//! defined by [`FEATURE_NAMES`]; bump [`FEATURE_SCHEMA_VERSION`] whenever a
//! formula or the order changes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ingredients::{CompositionAnalysis, analyze_ingredients};
use super::instructions::{InstructionAnalysis, InstructionAnalyzer};
use super::vessel::{DEFAULT_VESSEL_OPENNESS, vessel_openness};
use crate::recipe::{Recipe, RecipeError};

/// Feature layout version persisted alongside trained models.
pub const FEATURE_SCHEMA_VERSION: u32 = 1;
/// Number of engineered features.
pub const FEATURE_COUNT: usize = 20;

/// Ordered feature names; index `i` names element `i` of [`FeatureVector::to_array`].
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "hydration_ratio",
    "baker_percentage",
    "total_fermentation_hours",
    "bulk_fermentation_ratio",
    "fermentation_temperature_factor",
    "gluten_development_score",
    "hydrophilic_score",
    "enzymatic_activity_score",
    "salt_percentage",
    "starter_percentage",
    "sugar_percentage",
    "fat_percentage",
    "whole_grain_percentage",
    "mixing_intensity",
    "oven_temperature_norm",
    "cooking_vessel_openness",
    "total_cook_time_min",
    "dough_extensibility",
    "fermentation_power",
    "crumb_potential_score",
];

/// Flour weight assumed for baker's percentage when a recipe lists no flour.
pub const NOMINAL_FLOUR_WEIGHT_G: f64 = 500.0;
/// Room temperature assumed when none was recorded.
pub const DEFAULT_ROOM_TEMP_C: f64 = 21.0;
/// Fermentation temperature with the best rise.
pub const OPTIMAL_FERMENT_TEMP_C: f64 = 25.0;
/// Hydration treated as fully extensible dough.
pub const BASELINE_HYDRATION: f64 = 0.75;
/// Starter percentage treated as a full-strength leaven.
pub const BASELINE_STARTER_PCT: f64 = 20.0;
/// Fermentation hours at which the time contribution saturates.
pub const SATURATING_FERMENT_HOURS: f64 = 20.0;
/// Oven temperature range mapped onto [0, 1].
pub const OVEN_TEMP_RANGE: (f64, f64) = (325.0, 500.0);

/// Engineered features for one recipe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub hydration_ratio: f64,
    pub baker_percentage: f64,
    pub total_fermentation_hours: f64,
    pub bulk_fermentation_ratio: f64,
    pub fermentation_temperature_factor: f64,
    pub gluten_development_score: f64,
    pub hydrophilic_score: f64,
    pub enzymatic_activity_score: f64,
    pub salt_percentage: f64,
    pub starter_percentage: f64,
    pub sugar_percentage: f64,
    pub fat_percentage: f64,
    pub whole_grain_percentage: f64,
    pub mixing_intensity: f64,
    pub oven_temperature_norm: f64,
    pub cooking_vessel_openness: f64,
    pub total_cook_time_min: f64,
    pub dough_extensibility: f64,
    pub fermentation_power: f64,
    pub crumb_potential_score: f64,
}

impl FeatureVector {
    /// Values in [`FEATURE_NAMES`] order.
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.hydration_ratio,
            self.baker_percentage,
            self.total_fermentation_hours,
            self.bulk_fermentation_ratio,
            self.fermentation_temperature_factor,
            self.gluten_development_score,
            self.hydrophilic_score,
            self.enzymatic_activity_score,
            self.salt_percentage,
            self.starter_percentage,
            self.sugar_percentage,
            self.fat_percentage,
            self.whole_grain_percentage,
            self.mixing_intensity,
            self.oven_temperature_norm,
            self.cooking_vessel_openness,
            self.total_cook_time_min,
            self.dough_extensibility,
            self.fermentation_power,
            self.crumb_potential_score,
        ]
    }

    /// Named values in schema order.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> {
        FEATURE_NAMES.into_iter().zip(self.to_array())
    }

    /// Look up a feature by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|candidate| *candidate == name)
            .map(|idx| self.to_array()[idx])
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// Why a recipe could not be turned into features.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("Recipe '{recipe}': {source}")]
    InvalidRecipe {
        recipe: String,
        #[source]
        source: RecipeError,
    },
    #[error("Recipe '{recipe}' produced a non-finite feature `{feature}`")]
    NonFinite {
        recipe: String,
        feature: &'static str,
    },
}

/// Everything derived from a recipe on the way to its feature vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineeredRecipe {
    pub features: FeatureVector,
    pub composition: CompositionAnalysis,
    pub instructions: InstructionAnalysis,
}

/// Turns recipes into [`FeatureVector`]s.
#[derive(Debug, Clone, Default)]
pub struct FeatureEngineer {
    instructions: InstructionAnalyzer,
}

struct ProcessParams {
    mixing_min: f64,
    proof_min: f64,
    cook_min: f64,
    oven_c: f64,
    room_c: f64,
}

impl FeatureEngineer {
    pub fn new(instructions: InstructionAnalyzer) -> Self {
        Self { instructions }
    }

    /// Validate a recipe and compute its feature vector.
    pub fn engineer(&self, recipe: &Recipe) -> Result<FeatureVector, FeatureError> {
        self.engineer_detailed(recipe).map(|detail| detail.features)
    }

    /// Like [`FeatureEngineer::engineer`] but keeps the intermediate analyses.
    pub fn engineer_detailed(&self, recipe: &Recipe) -> Result<EngineeredRecipe, FeatureError> {
        let invalid = |source| FeatureError::InvalidRecipe {
            recipe: recipe.name.clone(),
            source,
        };
        for (name, &amount) in &recipe.ingredients {
            if !amount.is_finite() || amount < 0.0 {
                return Err(invalid(RecipeError::InvalidQuantity {
                    name: name.clone(),
                    amount,
                }));
            }
        }
        let params = process_params(recipe).map_err(invalid)?;

        let composition = analyze_ingredients(&recipe.ingredients);
        let instructions = self.instructions.analyze(recipe.instructions.as_deref());
        let vessel = recipe
            .cooking_vessel
            .as_deref()
            .map(vessel_openness)
            .unwrap_or(DEFAULT_VESSEL_OPENNESS);
        let features = combine(&composition, &instructions, &params, vessel);

        if let Some((feature, _)) = features.named().find(|(_, value)| !value.is_finite()) {
            return Err(FeatureError::NonFinite {
                recipe: recipe.name.clone(),
                feature,
            });
        }
        Ok(EngineeredRecipe {
            features,
            composition,
            instructions,
        })
    }
}

fn process_params(recipe: &Recipe) -> Result<ProcessParams, RecipeError> {
    fn required(
        value: Option<f64>,
        field: &'static str,
        valid: fn(f64) -> bool,
    ) -> Result<f64, RecipeError> {
        let value = value.ok_or(RecipeError::MissingField(field))?;
        if value.is_finite() && valid(value) {
            Ok(value)
        } else {
            Err(RecipeError::OutOfRange { field, value })
        }
    }
    let room_c = match recipe.room_temp_c {
        Some(value) if !value.is_finite() => {
            return Err(RecipeError::OutOfRange {
                field: "room_temp_c",
                value,
            });
        }
        Some(value) => value,
        None => DEFAULT_ROOM_TEMP_C,
    };
    Ok(ProcessParams {
        mixing_min: required(recipe.mixing_time_min, "mixing_time_min", |v| v >= 0.0)?,
        proof_min: required(recipe.proof_time_min, "proof_time_min", |v| v >= 0.0)?,
        cook_min: required(recipe.cook_time_min, "cook_time_min", |v| v >= 0.0)?,
        oven_c: required(recipe.oven_temp_c, "oven_temp_c", |v| v > 0.0)?,
        room_c,
    })
}

fn combine(
    composition: &CompositionAnalysis,
    instructions: &InstructionAnalysis,
    params: &ProcessParams,
    vessel_openness: f64,
) -> FeatureVector {
    let hydration = composition.hydration_ratio;
    let gluten = composition.gluten_development_score;
    let enzymatic = composition.enzymatic_activity_score;

    let total_fermentation_hours = params.proof_min / 60.0;
    let bulk_fermentation_ratio = if params.mixing_min > 0.0 {
        params.proof_min / params.mixing_min
    } else {
        0.0
    };
    let fermentation_temperature_factor =
        (1.0 - (params.room_c - OPTIMAL_FERMENT_TEMP_C).abs() * 0.02).clamp(0.3, 1.0);

    let dough_extensibility = (hydration / BASELINE_HYDRATION * gluten).min(1.0);
    let fermentation_power = (composition.starter_percentage / BASELINE_STARTER_PCT * 0.3
        + enzymatic * 0.4
        + (total_fermentation_hours / SATURATING_FERMENT_HOURS).min(1.0) * 0.3)
        .min(1.0);

    // Salt slows fermentation; fat shortens gluten strands.
    let salt_factor = (1.0 - composition.salt_percentage / 5.0).max(0.7);
    let sugar_factor = (1.0 + composition.sugar_percentage * 0.1).min(1.0);
    let fat_factor = (1.0 - composition.fat_percentage * 0.1).max(0.8);
    let crumb_potential_score = gluten * 0.3
        + fermentation_power * 0.3
        + dough_extensibility * 0.2
        + salt_factor * fat_factor * sugar_factor * 0.2;

    let (oven_lo, oven_hi) = OVEN_TEMP_RANGE;
    let oven_temperature_norm = ((params.oven_c - oven_lo) / (oven_hi - oven_lo)).clamp(0.0, 1.0);

    FeatureVector {
        hydration_ratio: hydration,
        baker_percentage: composition.baker_percentage(NOMINAL_FLOUR_WEIGHT_G),
        total_fermentation_hours,
        bulk_fermentation_ratio,
        fermentation_temperature_factor,
        gluten_development_score: gluten,
        hydrophilic_score: composition.hydrophilic_score,
        enzymatic_activity_score: enzymatic,
        salt_percentage: composition.salt_percentage,
        starter_percentage: composition.starter_percentage,
        sugar_percentage: composition.sugar_percentage,
        fat_percentage: composition.fat_percentage,
        whole_grain_percentage: composition.whole_grain_percentage,
        mixing_intensity: instructions.mixing_intensity,
        oven_temperature_norm,
        cooking_vessel_openness: vessel_openness,
        total_cook_time_min: params.cook_min + params.proof_min / 60.0,
        dough_extensibility,
        fermentation_power,
        crumb_potential_score,
    }
}
