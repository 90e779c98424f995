use std::collections::BTreeMap;
use std::path::Path;

use crumbcast::predict::EnsembleSettings;
use crumbcast::recipe::Recipe;

pub fn loaf(name: &str, ingredients: &[(&str, f64)], porosity: Option<f64>) -> Recipe {
    Recipe {
        name: name.to_string(),
        ingredients: ingredients
            .iter()
            .map(|(name, grams)| (name.to_string(), *grams))
            .collect::<BTreeMap<_, _>>(),
        mixing_time_min: Some(15.0),
        proof_time_min: Some(360.0),
        cook_time_min: Some(45.0),
        oven_temp_c: Some(240.0),
        cooking_vessel: Some("dutch oven".to_string()),
        instructions: Some(
            "Autolyse 30 minutes.\nStretch and fold during bulk ferment.".to_string(),
        ),
        measured_porosity: porosity,
        ..Recipe::default()
    }
}

/// Flour/water loaf whose only varying input is the water weight.
pub fn hydration_loaf(water: f64, porosity: Option<f64>) -> Recipe {
    loaf(
        &format!("hydration {water}"),
        &[("bread flour", 500.0), ("water", water), ("salt", 10.0)],
        porosity,
    )
}

/// Twenty measured loaves spanning hydration, starter and proof time.
pub fn measured_history() -> Vec<Recipe> {
    (0..20)
        .map(|i| {
            let water = 320.0 + (i % 10) as f64 * 10.0;
            let starter = 60.0 + (i / 10) as f64 * 60.0;
            let mut recipe = loaf(
                &format!("bake {i}"),
                &[
                    ("bread flour", 450.0),
                    ("whole wheat flour", 50.0),
                    ("water", water),
                    ("salt", 10.0),
                    ("sourdough starter", starter),
                ],
                None,
            );
            recipe.proof_time_min = Some(300.0 + (i % 4) as f64 * 120.0);
            let hydration = water / 500.0;
            recipe.measured_porosity = Some(8.0 + hydration * 25.0 + (i / 10) as f64 * 2.0);
            recipe
        })
        .collect()
}

pub fn write_recipes(path: &Path, recipes: &[Recipe]) {
    let json = serde_json::to_vec_pretty(recipes).expect("serialize recipes");
    std::fs::write(path, json).expect("write recipes");
}

/// Small forests so integration tests stay fast.
pub fn fast_ensemble() -> EnsembleSettings {
    let mut settings = EnsembleSettings::default();
    settings.params.random_forest.n_trees = 12;
    settings.params.gradient_boosting.rounds = 25;
    settings
}
