//! Correlation tests, Student-t helpers, and the diagnostics engine.

pub mod correlation;
pub mod distribution;
pub mod engine;

pub use correlation::{Correlation, FeatureCorrelation, feature_correlations, pearson};
pub use engine::{
    ConfidenceIntervals, Dashboard, FeatureImportance, FeatureInterval, Interval, ResidualAnalysis,
    ResidualEntry, StatisticsEngine, TrainingSummary,
};
