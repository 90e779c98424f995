//! Recipe records consumed by the prediction engine.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A bread recipe with process parameters and, for historical bakes, the
/// porosity measured from the finished loaf.
///
/// Process times are required for feature extraction but kept optional here
/// so incomplete records can still be loaded and reported on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub id: Option<u64>,
    pub name: String,
    /// Ingredient name to quantity in grams.
    #[serde(default)]
    pub ingredients: BTreeMap<String, f64>,
    #[serde(default)]
    pub mixing_time_min: Option<f64>,
    #[serde(default)]
    pub proof_time_min: Option<f64>,
    #[serde(default)]
    pub cook_time_min: Option<f64>,
    #[serde(default)]
    pub oven_temp_c: Option<f64>,
    #[serde(default)]
    pub cooking_vessel: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub room_temp_c: Option<f64>,
    #[serde(default)]
    pub room_humidity_pct: Option<f64>,
    /// Porosity percentage measured from a crumb image, if the loaf was analyzed.
    #[serde(default)]
    pub measured_porosity: Option<f64>,
    #[serde(default)]
    pub altitude_m: Option<f64>,
    #[serde(default)]
    pub parent_recipe_id: Option<u64>,
    #[serde(default)]
    pub notes: String,
}

/// Structural problems found in a recipe record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecipeError {
    #[error("Recipe name cannot be empty")]
    EmptyName,
    #[error("Recipe must have at least one ingredient")]
    NoIngredients,
    #[error("Ingredient '{name}' amount must be a finite, non-negative number (got {amount})")]
    InvalidQuantity { name: String, amount: f64 },
    #[error("Missing required field `{0}`")]
    MissingField(&'static str),
    #[error("Field `{field}` is out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("Cooking vessel cannot be empty")]
    EmptyVessel,
}

/// Failure to read a recipe file.
#[derive(Debug, Error)]
pub enum RecipeLoadError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid recipe JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl Recipe {
    /// Run every structural check and return all problems found.
    pub fn validate(&self) -> Vec<RecipeError> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(RecipeError::EmptyName);
        }
        if self.ingredients.is_empty() {
            errors.push(RecipeError::NoIngredients);
        }
        for (name, &amount) in &self.ingredients {
            if !amount.is_finite() || amount < 0.0 {
                errors.push(RecipeError::InvalidQuantity {
                    name: name.clone(),
                    amount,
                });
            }
        }
        let checks: [(&'static str, Option<f64>, fn(f64) -> bool); 4] = [
            ("mixing_time_min", self.mixing_time_min, |v| v >= 0.0),
            ("proof_time_min", self.proof_time_min, |v| v >= 0.0),
            ("oven_temp_c", self.oven_temp_c, |v| v > 0.0),
            ("cook_time_min", self.cook_time_min, |v| v > 0.0),
        ];
        for (field, value, in_range) in checks {
            match value {
                None => errors.push(RecipeError::MissingField(field)),
                Some(v) if !v.is_finite() || !in_range(v) => {
                    errors.push(RecipeError::OutOfRange { field, value: v })
                }
                Some(_) => {}
            }
        }
        if self
            .cooking_vessel
            .as_deref()
            .is_none_or(|vessel| vessel.trim().is_empty())
        {
            errors.push(RecipeError::EmptyVessel);
        }
        if let Some(porosity) = self.measured_porosity
            && !(0.0..=100.0).contains(&porosity)
        {
            errors.push(RecipeError::OutOfRange {
                field: "measured_porosity",
                value: porosity,
            });
        }
        errors
    }

    /// Measured porosity when present and finite.
    pub fn porosity(&self) -> Option<f64> {
        self.measured_porosity.filter(|p| p.is_finite())
    }

    /// Mixing, proofing and cooking time combined, in hours.
    pub fn total_time_hours(&self) -> f64 {
        let minutes = self.mixing_time_min.unwrap_or(0.0)
            + self.proof_time_min.unwrap_or(0.0)
            + self.cook_time_min.unwrap_or(0.0);
        minutes / 60.0
    }

    /// Create a scaled variant; process times do not scale with batch size.
    pub fn scale(&self, factor: f64) -> Recipe {
        let ingredients = self
            .ingredients
            .iter()
            .map(|(name, amount)| (name.clone(), amount * factor))
            .collect();
        let mut notes = self.notes.clone();
        if !notes.is_empty() {
            notes.push('\n');
        }
        notes.push_str(&format!("Scaled ×{factor} from recipe {}", self.name));
        Recipe {
            id: None,
            name: format!("{} (×{factor})", self.name),
            ingredients,
            parent_recipe_id: self.id,
            notes,
            ..self.clone()
        }
    }
}

/// Recipes that carry a usable porosity measurement.
pub fn with_measured_porosity(recipes: &[Recipe]) -> Vec<&Recipe> {
    recipes.iter().filter(|r| r.porosity().is_some()).collect()
}

/// Load recipes from a JSON file holding either an array or a single object.
pub fn load_recipes(path: &Path) -> Result<Vec<Recipe>, RecipeLoadError> {
    let bytes = std::fs::read(path).map_err(|source| RecipeLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<Recipe>),
        One(Box<Recipe>),
    }
    let parsed: OneOrMany =
        serde_json::from_slice(&bytes).map_err(|source| RecipeLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(match parsed {
        OneOrMany::Many(recipes) => recipes,
        OneOrMany::One(recipe) => vec![*recipe],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> Recipe {
        Recipe {
            name: "Country loaf".into(),
            ingredients: BTreeMap::from([("bread flour".into(), 500.0), ("water".into(), 350.0)]),
            mixing_time_min: Some(15.0),
            proof_time_min: Some(480.0),
            cook_time_min: Some(45.0),
            oven_temp_c: Some(250.0),
            cooking_vessel: Some("dutch oven".into()),
            ..Recipe::default()
        }
    }

    #[test]
    fn complete_recipe_validates() {
        assert!(complete().validate().is_empty());
    }

    #[test]
    fn validation_reports_every_problem() {
        let mut recipe = complete();
        recipe.name = "  ".into();
        recipe.ingredients.insert("salt".into(), -2.0);
        recipe.cook_time_min = None;
        recipe.measured_porosity = Some(140.0);
        let errors = recipe.validate();
        assert!(errors.contains(&RecipeError::EmptyName));
        assert!(errors.contains(&RecipeError::MissingField("cook_time_min")));
        assert!(errors.iter().any(|e| matches!(e, RecipeError::InvalidQuantity { .. })));
        assert!(errors.iter().any(|e| matches!(
            e,
            RecipeError::OutOfRange {
                field: "measured_porosity",
                ..
            }
        )));
    }

    #[test]
    fn scale_keeps_times_and_links_parent() {
        let mut recipe = complete();
        recipe.id = Some(7);
        let scaled = recipe.scale(2.0);
        assert_eq!(scaled.ingredients["bread flour"], 1000.0);
        assert_eq!(scaled.proof_time_min, Some(480.0));
        assert_eq!(scaled.parent_recipe_id, Some(7));
        assert!(scaled.name.contains("×2"));
    }

    #[test]
    fn parses_partial_json_records() {
        let json = r#"{"name": "Sparse", "ingredients": {"flour": 100}}"#;
        let recipe: Recipe = serde_json::from_str(json).unwrap();
        assert_eq!(recipe.mixing_time_min, None);
        assert_eq!(recipe.ingredients["flour"], 100.0);
    }

    #[test]
    fn total_time_sums_known_stages() {
        let mut recipe = complete();
        assert!((recipe.total_time_hours() - 9.0).abs() < 1e-12);
        recipe.cook_time_min = None;
        assert!((recipe.total_time_hours() - 8.25).abs() < 1e-12);
    }

    #[test]
    fn measured_filter_drops_missing_and_non_finite() {
        let mut measured = complete();
        measured.measured_porosity = Some(24.0);
        let mut broken = complete();
        broken.measured_porosity = Some(f64::NAN);
        let recipes = vec![complete(), measured.clone(), broken];
        assert_eq!(with_measured_porosity(&recipes), vec![&measured]);
    }
}
