//! Recipe analysis: ingredient composition, instruction keywords and feature engineering.

pub mod features;
pub mod ingredients;
pub mod instructions;
pub mod vessel;

pub use features::{
    EngineeredRecipe, FEATURE_COUNT, FEATURE_NAMES, FEATURE_SCHEMA_VERSION, FeatureEngineer,
    FeatureError, FeatureVector,
};
pub use ingredients::{CompositionAnalysis, IngredientCategory, analyze_ingredients};
pub use instructions::{InstructionAnalysis, InstructionAnalyzer};
