//! Common interface over the regression model families.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::cross_validation::{Interrupted, KFold, TrainControl, take_rows};
use super::forest::{ForestOptions, RandomForest};
use super::gbdt::{BoostingOptions, GradientBoosting};
use super::linear::{LinearRegression, RidgeRegression};
use super::metrics::{CvSummary, FoldScores};

/// Cross-validation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CvError {
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
    #[error("fold {fold} failed to fit: {message}")]
    Fit { fold: usize, message: String },
}

/// A trainable single-output regression model.
///
/// Unfitted models predict 0; stores only ever hold fitted models.
pub trait Regressor: fmt::Debug + Send + Sync {
    fn kind(&self) -> RegressorKind;

    /// Fit on row-major `x` with targets `y`, replacing any previous fit.
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), String>;

    fn predict(&self, features: &[f64]) -> f64;

    /// Per-feature importance, for families that can report it.
    fn feature_importance(&self) -> Option<Vec<f64>> {
        None
    }

    /// Unfitted copy with the same hyperparameters.
    fn fresh(&self) -> Box<dyn Regressor>;

    fn to_json(&self) -> Result<Vec<u8>, serde_json::Error>;

    /// Fit a fresh copy on each training fold and score it on the held-out fold.
    fn cross_validate(
        &self,
        x: &[Vec<f64>],
        y: &[f64],
        folds: &KFold,
        control: &TrainControl,
    ) -> Result<CvSummary, CvError> {
        let mut scores = FoldScores::default();
        for (fold, (train, test)) in folds.splits(y.len()).into_iter().enumerate() {
            control.check()?;
            let mut model = self.fresh();
            model
                .fit(&take_rows(x, &train), &take_rows(y, &train))
                .map_err(|message| CvError::Fit { fold, message })?;
            let actual = take_rows(y, &test);
            let predicted: Vec<f64> = test.iter().map(|&i| model.predict(&x[i])).collect();
            scores.push(&actual, &predicted);
        }
        Ok(scores.summarize())
    }
}

/// Registered model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressorKind {
    RandomForest,
    GradientBoosting,
    Linear,
    Ridge,
}

impl RegressorKind {
    pub const ALL: [RegressorKind; 4] = [
        RegressorKind::RandomForest,
        RegressorKind::GradientBoosting,
        RegressorKind::Linear,
        RegressorKind::Ridge,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RegressorKind::RandomForest => "random_forest",
            RegressorKind::GradientBoosting => "gradient_boosting",
            RegressorKind::Linear => "linear",
            RegressorKind::Ridge => "ridge",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RegressorKind::RandomForest => "Random Forest",
            RegressorKind::GradientBoosting => "Gradient Boosting",
            RegressorKind::Linear => "Linear Regression",
            RegressorKind::Ridge => "Ridge Regression",
        }
    }

    /// Artifact file name inside a model directory.
    pub fn file_name(self) -> String {
        format!("{}.json", self.as_str())
    }

    /// Unfitted model configured from `params`.
    pub fn build(self, params: &RegressorParams) -> Box<dyn Regressor> {
        match self {
            RegressorKind::RandomForest => Box::new(RandomForest::new(params.random_forest)),
            RegressorKind::GradientBoosting => {
                Box::new(GradientBoosting::new(params.gradient_boosting))
            }
            RegressorKind::Linear => Box::new(LinearRegression::default()),
            RegressorKind::Ridge => Box::new(RidgeRegression::new(params.ridge_alpha)),
        }
    }

    /// Deserialize and validate a fitted model of this family.
    pub fn load(self, bytes: &[u8]) -> Result<Box<dyn Regressor>, String> {
        fn parse<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, String> {
            serde_json::from_slice(bytes).map_err(|err| err.to_string())
        }
        Ok(match self {
            RegressorKind::RandomForest => {
                let model: RandomForest = parse(bytes)?;
                model.validate()?;
                Box::new(model)
            }
            RegressorKind::GradientBoosting => {
                let model: GradientBoosting = parse(bytes)?;
                model.validate()?;
                Box::new(model)
            }
            RegressorKind::Linear => {
                let model: LinearRegression = parse(bytes)?;
                model.fitted.validate()?;
                Box::new(model)
            }
            RegressorKind::Ridge => {
                let model: RidgeRegression = parse(bytes)?;
                model.fitted.validate()?;
                Box::new(model)
            }
        })
    }
}

impl fmt::Display for RegressorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Hyperparameters for every family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressorParams {
    pub random_forest: ForestOptions,
    pub gradient_boosting: BoostingOptions,
    pub ridge_alpha: f64,
}

impl Default for RegressorParams {
    fn default() -> Self {
        Self {
            random_forest: ForestOptions::default(),
            gradient_boosting: BoostingOptions::default(),
            ridge_alpha: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_params() -> RegressorParams {
        let mut params = RegressorParams::default();
        params.random_forest.n_trees = 5;
        params.gradient_boosting.rounds = 5;
        params
    }

    fn dataset() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..15).map(|i| vec![i as f64, (i % 4) as f64]).collect();
        let y = x.iter().map(|r| 12.0 + r[0] * 1.2).collect();
        (x, y)
    }

    #[test]
    fn every_kind_fits_serializes_and_reloads() {
        let (x, y) = dataset();
        for kind in RegressorKind::ALL {
            let mut model = kind.build(&small_params());
            assert_eq!(model.kind(), kind);
            model.fit(&x, &y).unwrap();
            let bytes = model.to_json().unwrap();
            let loaded = kind.load(&bytes).unwrap();
            assert!((loaded.predict(&x[3]) - model.predict(&x[3])).abs() < 1e-12);
        }
    }

    #[test]
    fn loading_rejects_unfitted_artifacts() {
        let unfitted = RegressorKind::RandomForest.build(&small_params());
        let bytes = unfitted.to_json().unwrap();
        assert!(RegressorKind::RandomForest.load(&bytes).is_err());
    }

    #[test]
    fn cross_validation_scores_linear_data_well() {
        let (x, y) = dataset();
        let model = RegressorKind::Linear.build(&small_params());
        let summary = model
            .cross_validate(&x, &y, &KFold::new(5, 42), &TrainControl::new())
            .unwrap();
        assert_eq!(summary.folds, 5);
        assert!(summary.r2_mean > 0.99);
        assert!(summary.mae_mean < 1e-3);
    }

    #[test]
    fn cross_validation_honours_cancellation() {
        let (x, y) = dataset();
        let control = TrainControl::new();
        control.cancel();
        let err = RegressorKind::Ridge
            .build(&small_params())
            .cross_validate(&x, &y, &KFold::new(3, 0), &control)
            .unwrap_err();
        assert_eq!(err, CvError::Interrupted(Interrupted::Cancelled));
    }

    #[test]
    fn file_names_match_store_layout() {
        assert_eq!(RegressorKind::GradientBoosting.file_name(), "gradient_boosting.json");
        assert_eq!(RegressorKind::Ridge.to_string(), "Ridge Regression");
    }
}
