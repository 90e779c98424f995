//! Library exports for reuse in benchmarks and tests.
/// Ingredient, instruction and vessel analysis plus feature engineering.
pub mod analysis;
/// Application directory helpers.
pub mod app_dirs;
/// Engine settings persisted as TOML.
pub mod config;
/// Training sets built from measured recipes.
pub mod dataset;
/// Crash-safe file replacement.
pub mod fs_ops;
/// Logging setup.
pub mod logging;
/// Regression models, scaling, metrics and cross-validation.
pub mod ml;
/// Porosity predictors and the persisted model store.
pub mod predict;
/// Recipe records.
pub mod recipe;
/// Plain-text reports.
pub mod report;
/// Correlation statistics and diagnostics.
pub mod stats;
