//! Gradient-boosted regression trees with squared-error loss.
//!
//! Starts from the target mean and fits each round's tree to the current
//! residuals, shrinking its contribution by the learning rate.

use serde::{Deserialize, Serialize};

use super::regressor::{Regressor, RegressorKind};
use super::tree::{BinnedMatrix, RegressionTree, TreeOptions};

/// Boosting hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingOptions {
    pub rounds: usize,
    pub learning_rate: f64,
    pub tree: TreeOptions,
}

impl Default for BoostingOptions {
    fn default() -> Self {
        Self {
            rounds: 100,
            learning_rate: 0.1,
            tree: TreeOptions {
                max_depth: 5,
                ..TreeOptions::default()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    pub options: BoostingOptions,
    pub feature_len: usize,
    pub init: f64,
    pub trees: Vec<RegressionTree>,
    pub importances: Vec<f64>,
}

impl GradientBoosting {
    pub fn new(options: BoostingOptions) -> Self {
        Self {
            options,
            feature_len: 0,
            init: 0.0,
            trees: Vec::new(),
            importances: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.init.is_finite() {
            return Err("Initial prediction must be finite".to_string());
        }
        if self.trees.is_empty() {
            return Err("Gradient boosting model has no trees".to_string());
        }
        for tree in &self.trees {
            tree.validate(self.feature_len)?;
        }
        Ok(())
    }
}

impl Regressor for GradientBoosting {
    fn kind(&self) -> RegressorKind {
        RegressorKind::GradientBoosting
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), String> {
        if x.len() != y.len() {
            return Err("Mismatched X/Y lengths".to_string());
        }
        if x.is_empty() {
            return Err("Empty dataset".to_string());
        }
        if self.options.learning_rate.is_nan() || self.options.learning_rate <= 0.0 {
            return Err("Learning rate must be positive".to_string());
        }
        let n = x.len();
        let data = BinnedMatrix::new(x, self.options.tree.bins);
        let rows: Vec<usize> = (0..n).collect();
        let init = y.iter().sum::<f64>() / n as f64;
        let mut raw = vec![init; n];
        let mut importance = vec![0.0; data.feature_len()];
        let rounds = self.options.rounds.max(1);
        let mut trees = Vec::with_capacity(rounds);
        for _round in 0..rounds {
            let residuals: Vec<f64> = y.iter().zip(&raw).map(|(t, p)| t - p).collect();
            let tree = RegressionTree::fit(
                &data,
                &residuals,
                &rows,
                &self.options.tree,
                &mut importance,
            )?;
            for (pred, row) in raw.iter_mut().zip(x) {
                *pred += self.options.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }
        let total: f64 = importance.iter().sum();
        if total > 0.0 {
            for v in &mut importance {
                *v /= total;
            }
        }
        self.feature_len = data.feature_len();
        self.init = init;
        self.trees = trees;
        self.importances = importance;
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> f64 {
        self.trees.iter().fold(self.init, |acc, tree| {
            acc + self.options.learning_rate * tree.predict(features)
        })
    }

    fn feature_importance(&self) -> Option<Vec<f64>> {
        Some(self.importances.clone())
    }

    fn fresh(&self) -> Box<dyn Regressor> {
        Box::new(Self::new(self.options))
    }

    fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}
