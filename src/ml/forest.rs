//! Bagged ensemble of regression trees.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::regressor::{Regressor, RegressorKind};
use super::tree::{BinnedMatrix, RegressionTree, TreeOptions};

/// Random forest hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestOptions {
    pub n_trees: usize,
    pub seed: u64,
    /// Draw each tree's rows with replacement; otherwise every tree sees all rows.
    pub bootstrap: bool,
    pub tree: TreeOptions,
}

impl Default for ForestOptions {
    fn default() -> Self {
        Self {
            n_trees: 100,
            seed: 42,
            bootstrap: true,
            tree: TreeOptions::default(),
        }
    }
}

/// Averaged bootstrap trees with impurity-based feature importance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub options: ForestOptions,
    pub feature_len: usize,
    pub trees: Vec<RegressionTree>,
    /// Normalized to sum to 1 (all zeros when no split was made).
    pub importances: Vec<f64>,
}

impl RandomForest {
    pub fn new(options: ForestOptions) -> Self {
        Self {
            options,
            feature_len: 0,
            trees: Vec::new(),
            importances: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("Random forest has no trees".to_string());
        }
        if self.importances.len() != self.feature_len {
            return Err("Importance length does not match feature length".to_string());
        }
        for tree in &self.trees {
            tree.validate(self.feature_len)?;
        }
        Ok(())
    }
}

impl Regressor for RandomForest {
    fn kind(&self) -> RegressorKind {
        RegressorKind::RandomForest
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), String> {
        if x.len() != y.len() {
            return Err("Mismatched X/Y lengths".to_string());
        }
        if x.is_empty() {
            return Err("Empty dataset".to_string());
        }
        let n_trees = self.options.n_trees.max(1);
        let data = BinnedMatrix::new(x, self.options.tree.bins);
        let mut rng = StdRng::seed_from_u64(self.options.seed);
        let mut importance = vec![0.0; data.feature_len()];
        let mut trees = Vec::with_capacity(n_trees);
        let n = x.len();
        for _ in 0..n_trees {
            let rows: Vec<usize> = if self.options.bootstrap {
                (0..n).map(|_| rng.random_range(0..n)).collect()
            } else {
                (0..n).collect()
            };
            trees.push(RegressionTree::fit(
                &data,
                y,
                &rows,
                &self.options.tree,
                &mut importance,
            )?);
        }
        let total: f64 = importance.iter().sum();
        if total > 0.0 {
            for v in &mut importance {
                *v /= total;
            }
        }
        self.feature_len = data.feature_len();
        self.trees = trees;
        self.importances = importance;
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(features)).sum();
        sum / self.trees.len() as f64
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

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let y = (0..40).map(|i| 10.0 + i as f64 * 0.5).collect();
        (x, y)
    }

    #[test]
    fn same_seed_gives_identical_forests() {
        let (x, y) = linear_data();
        let options = ForestOptions {
            n_trees: 10,
            ..ForestOptions::default()
        };
        let mut a = RandomForest::new(options);
        let mut b = RandomForest::new(options);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn tracks_monotone_target_and_ranks_informative_feature() {
        let (x, y) = linear_data();
        let mut forest = RandomForest::new(ForestOptions {
            n_trees: 20,
            ..ForestOptions::default()
        });
        forest.fit(&x, &y).unwrap();
        assert!(forest.predict(&[2.0, 2.0]) < forest.predict(&[37.0, 1.0]));
        let importance = forest.feature_importance().unwrap();
        assert!(importance[0] > importance[1]);
        assert!((importance.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        forest.validate().unwrap();
    }

    #[test]
    fn rejects_empty_input() {
        let mut forest = RandomForest::new(ForestOptions::default());
        assert!(forest.fit(&[], &[]).is_err());
    }
}
