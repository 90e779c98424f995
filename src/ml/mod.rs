//! Regression models used by the ensemble predictor.
//!
//! Everything here is dependency-light and deterministic: tree models are
//! seeded, linear models are solved in closed form, and every fitted model
//! round-trips through JSON.

pub mod cross_validation;
pub mod forest;
pub mod gbdt;
pub mod linear;
pub mod metrics;
pub mod regressor;
pub mod scaler;
pub mod tree;

pub use cross_validation::{Interrupted, KFold, TrainControl, fold_count};
pub use metrics::{CvSummary, FitMetrics};
pub use regressor::{CvError, Regressor, RegressorKind, RegressorParams};
pub use scaler::StandardScaler;
