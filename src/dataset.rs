//! Feature matrix + porosity targets built from historical recipes.

use serde::Serialize;
use tracing::warn;

use crate::analysis::{FEATURE_COUNT, FeatureEngineer, FeatureVector};
use crate::recipe::Recipe;

/// One recipe with a measured porosity, reduced to its features.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingSample {
    pub name: String,
    pub features: FeatureVector,
    pub porosity: f64,
}

/// Recipes usable for training, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrainingSet {
    pub samples: Vec<TrainingSample>,
    /// Recipes with a measurement that failed feature extraction.
    pub skipped: usize,
}

impl TrainingSet {
    /// Keep recipes that carry a measured porosity and engineer their features.
    ///
    /// Malformed recipes are logged and skipped rather than failing the set.
    pub fn from_recipes(recipes: &[Recipe], engineer: &FeatureEngineer) -> Self {
        let mut set = TrainingSet::default();
        for recipe in recipes {
            let Some(porosity) = recipe.porosity() else {
                continue;
            };
            match engineer.engineer(recipe) {
                Ok(features) => set.samples.push(TrainingSample {
                    name: recipe.name.clone(),
                    features,
                    porosity,
                }),
                Err(err) => {
                    warn!("Skipping training recipe: {err}");
                    set.skipped += 1;
                }
            }
        }
        set
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Row-major feature matrix.
    pub fn matrix(&self) -> Vec<Vec<f64>> {
        self.samples
            .iter()
            .map(|s| s.features.to_array().to_vec())
            .collect()
    }

    pub fn targets(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.porosity).collect()
    }

    /// Values of one feature across all samples.
    pub fn column(&self, feature_idx: usize) -> Vec<f64> {
        debug_assert!(feature_idx < FEATURE_COUNT);
        self.samples
            .iter()
            .map(|s| s.features.to_array()[feature_idx])
            .collect()
    }

    /// Samples whose porosity lies in `[lo, hi]`.
    pub fn within_targets(&self, lo: f64, hi: f64) -> TrainingSet {
        TrainingSet {
            samples: self
                .samples
                .iter()
                .filter(|s| (lo..=hi).contains(&s.porosity))
                .cloned()
                .collect(),
            skipped: self.skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn recipe(name: &str, water: f64, porosity: Option<f64>) -> Recipe {
        Recipe {
            name: name.into(),
            ingredients: BTreeMap::from([("bread flour".into(), 500.0), ("water".into(), water)]),
            mixing_time_min: Some(10.0),
            proof_time_min: Some(240.0),
            cook_time_min: Some(40.0),
            oven_temp_c: Some(230.0),
            measured_porosity: porosity,
            ..Recipe::default()
        }
    }

    #[test]
    fn keeps_only_measured_valid_recipes() {
        let mut broken = recipe("broken", 300.0, Some(20.0));
        broken.cook_time_min = None;
        let recipes = vec![
            recipe("a", 300.0, Some(18.0)),
            recipe("unmeasured", 320.0, None),
            broken,
            recipe("b", 400.0, Some(30.0)),
        ];
        let set = TrainingSet::from_recipes(&recipes, &FeatureEngineer::default());
        assert_eq!(set.len(), 2);
        assert_eq!(set.skipped, 1);
        assert_eq!(set.targets(), vec![18.0, 30.0]);
        assert_eq!(set.matrix()[1].len(), FEATURE_COUNT);
        assert!((set.column(0)[1] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn target_filter_is_inclusive() {
        let recipes = vec![
            recipe("low", 300.0, Some(5.0)),
            recipe("mid", 300.0, Some(25.0)),
            recipe("high", 300.0, Some(60.0)),
        ];
        let set = TrainingSet::from_recipes(&recipes, &FeatureEngineer::default());
        assert_eq!(set.within_targets(5.0, 50.0).len(), 2);
    }
}
