//! Ingredient composition analysis.
//!
//! Maps ingredient names onto a small property table (gluten potential, water
//! absorption, fermentation potential) and aggregates them, weighted by
//! quantity, into the ratios bakers reason about: hydration and percentages of
//! flour for salt, sugar, fat and leaven.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Role an ingredient plays in the dough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngredientCategory {
    Flour,
    Leaven,
    Salt,
    Fat,
    Sugar,
    Additive,
    Water,
    Unknown,
}

/// Composition scores for a single ingredient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IngredientProperties {
    /// Contribution to gluten network strength.
    pub gluten: f64,
    /// Water-binding capacity.
    pub water_absorption: f64,
    /// Fermentation potential; negative for inhibitors such as salt.
    pub fermentation: f64,
    pub category: IngredientCategory,
    pub whole_grain: bool,
}

impl IngredientProperties {
    /// Mid-range scores used for anything not in the table.
    pub const NEUTRAL: IngredientProperties = IngredientProperties {
        gluten: 0.5,
        water_absorption: 0.5,
        fermentation: 0.5,
        category: IngredientCategory::Unknown,
        whole_grain: false,
    };

    const fn new(
        gluten: f64,
        water_absorption: f64,
        fermentation: f64,
        category: IngredientCategory,
    ) -> Self {
        Self {
            gluten,
            water_absorption,
            fermentation,
            category,
            whole_grain: false,
        }
    }

    const fn whole_grain(mut self) -> Self {
        self.whole_grain = true;
        self
    }
}

use IngredientCategory as C;

/// Known ingredients, in lookup priority order.
pub const INGREDIENT_TABLE: &[(&str, IngredientProperties)] = &[
    ("bread flour", IngredientProperties::new(0.95, 0.65, 0.7, C::Flour)),
    ("all-purpose flour", IngredientProperties::new(0.80, 0.60, 0.6, C::Flour)),
    ("whole wheat", IngredientProperties::new(0.70, 0.75, 0.8, C::Flour).whole_grain()),
    ("rye", IngredientProperties::new(0.50, 0.80, 0.9, C::Flour).whole_grain()),
    ("spelt", IngredientProperties::new(0.75, 0.70, 0.65, C::Flour).whole_grain()),
    ("einkorn", IngredientProperties::new(0.60, 0.68, 0.7, C::Flour).whole_grain()),
    ("ancient grain", IngredientProperties::new(0.65, 0.72, 0.75, C::Flour).whole_grain()),
    ("pastry flour", IngredientProperties::new(0.65, 0.55, 0.5, C::Flour)),
    ("cake flour", IngredientProperties::new(0.50, 0.50, 0.45, C::Flour)),
    ("sourdough starter", IngredientProperties::new(0.0, 0.0, 1.0, C::Leaven)),
    ("yeast", IngredientProperties::new(0.0, 0.0, 0.9, C::Leaven)),
    ("commercial yeast", IngredientProperties::new(0.0, 0.0, 0.85, C::Leaven)),
    ("bakers yeast", IngredientProperties::new(0.0, 0.0, 0.85, C::Leaven)),
    ("wild yeast", IngredientProperties::new(0.0, 0.0, 0.8, C::Leaven)),
    ("levain", IngredientProperties::new(0.0, 0.0, 0.95, C::Leaven)),
    ("preferment", IngredientProperties::new(0.0, 0.0, 0.85, C::Leaven)),
    ("salt", IngredientProperties::new(0.0, 0.1, -0.3, C::Salt)),
    ("sea salt", IngredientProperties::new(0.0, 0.1, -0.3, C::Salt)),
    ("butter", IngredientProperties::new(0.0, 0.05, -0.2, C::Fat)),
    ("oil", IngredientProperties::new(0.0, 0.02, -0.1, C::Fat)),
    ("olive oil", IngredientProperties::new(0.0, 0.02, -0.1, C::Fat)),
    ("vegetable oil", IngredientProperties::new(0.0, 0.02, -0.1, C::Fat)),
    ("sugar", IngredientProperties::new(0.0, 0.2, 0.5, C::Sugar)),
    ("honey", IngredientProperties::new(0.0, 0.3, 0.6, C::Sugar)),
    ("malt", IngredientProperties::new(0.0, 0.25, 0.7, C::Sugar)),
    ("diastatic malt", IngredientProperties::new(0.0, 0.25, 0.85, C::Sugar)),
    ("vital wheat gluten", IngredientProperties::new(1.0, 0.3, 0.4, C::Additive)),
    ("ascorbic acid", IngredientProperties::new(0.0, 0.0, 0.3, C::Additive)),
];

const WATER_NAMES: &[&str] = &["water", "aqua"];
/// Queries shorter than this never match as a fragment of a known name.
const MIN_PARTIAL_QUERY_LEN: usize = 3;

/// Lower-case, trim and collapse internal whitespace.
pub fn normalize_ingredient_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Resolve an ingredient name to its properties.
///
/// Lookup order: exact match, the longest known name contained in the query
/// ("whole wheat flour" → "whole wheat"), the first known name containing the
/// query ("flour" → "bread flour"), plain water, then neutral defaults.
pub fn ingredient_properties(name: &str) -> IngredientProperties {
    let normalized = normalize_ingredient_name(name);
    if normalized.is_empty() {
        return IngredientProperties::NEUTRAL;
    }
    if let Some((_, props)) = INGREDIENT_TABLE.iter().find(|(known, _)| *known == normalized) {
        return *props;
    }
    if let Some((_, props)) = INGREDIENT_TABLE
        .iter()
        .filter(|(known, _)| normalized.contains(known))
        .max_by_key(|(known, _)| known.len())
    {
        return *props;
    }
    if normalized.len() >= MIN_PARTIAL_QUERY_LEN
        && let Some((_, props)) = INGREDIENT_TABLE
            .iter()
            .find(|(known, _)| known.contains(normalized.as_str()))
    {
        return *props;
    }
    if is_water(&normalized) {
        return IngredientProperties {
            category: IngredientCategory::Water,
            ..IngredientProperties::NEUTRAL
        };
    }
    tracing::debug!("Unknown ingredient '{name}', using neutral defaults");
    IngredientProperties::NEUTRAL
}

fn is_water(normalized: &str) -> bool {
    normalized
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| WATER_NAMES.contains(&word))
}

/// Per-ingredient breakdown kept for reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientDetail {
    pub amount: f64,
    /// Share of total recipe weight, in [0, 1].
    pub share: f64,
    pub properties: IngredientProperties,
}

/// Aggregate composition of a recipe's ingredient list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositionAnalysis {
    pub total_weight: f64,
    pub flour_weight: f64,
    pub water_weight: f64,
    pub ingredients: BTreeMap<String, IngredientDetail>,
    /// Share of total weight per category.
    pub category_shares: BTreeMap<IngredientCategory, f64>,
    pub gluten_development_score: f64,
    pub hydrophilic_score: f64,
    pub enzymatic_activity_score: f64,
    /// Water weight over flour weight; 0 when there is no flour.
    pub hydration_ratio: f64,
    pub salt_percentage: f64,
    pub sugar_percentage: f64,
    pub fat_percentage: f64,
    pub starter_percentage: f64,
    pub whole_grain_percentage: f64,
}

impl CompositionAnalysis {
    /// Total weight over flour weight, as a percentage.
    ///
    /// Falls back to `nominal_flour_weight` when the recipe has no flour.
    pub fn baker_percentage(&self, nominal_flour_weight: f64) -> f64 {
        let flour = if self.flour_weight > 0.0 {
            self.flour_weight
        } else {
            nominal_flour_weight
        };
        if flour > 0.0 {
            self.total_weight / flour * 100.0
        } else {
            0.0
        }
    }
}

/// Aggregate ingredient quantities into composition scores and ratios.
///
/// Zero and negative quantities are skipped rather than rejected.
pub fn analyze_ingredients(ingredients: &BTreeMap<String, f64>) -> CompositionAnalysis {
    let usable: Vec<(&String, f64)> = ingredients
        .iter()
        .filter(|(_, amount)| amount.is_finite() && **amount > 0.0)
        .map(|(name, amount)| (name, *amount))
        .collect();
    let total_weight: f64 = usable.iter().map(|(_, amount)| amount).sum();

    let mut analysis = CompositionAnalysis {
        total_weight,
        ..CompositionAnalysis::default()
    };
    if total_weight <= 0.0 {
        return analysis;
    }

    let mut salt = 0.0;
    let mut sugar = 0.0;
    let mut fat = 0.0;
    let mut leaven = 0.0;
    let mut whole_grain = 0.0;

    for (name, amount) in usable {
        let props = ingredient_properties(name);
        let share = amount / total_weight;
        *analysis.category_shares.entry(props.category).or_insert(0.0) += share;
        analysis.gluten_development_score += props.gluten * share;
        analysis.hydrophilic_score += props.water_absorption * share;
        analysis.enzymatic_activity_score += props.fermentation * share;

        match props.category {
            IngredientCategory::Flour => {
                analysis.flour_weight += amount;
                if props.whole_grain {
                    whole_grain += amount;
                }
            }
            IngredientCategory::Water => analysis.water_weight += amount,
            IngredientCategory::Salt => salt += amount,
            IngredientCategory::Sugar => sugar += amount,
            IngredientCategory::Fat => fat += amount,
            IngredientCategory::Leaven => leaven += amount,
            IngredientCategory::Additive | IngredientCategory::Unknown => {}
        }
        analysis.ingredients.insert(
            name.clone(),
            IngredientDetail {
                amount,
                share,
                properties: props,
            },
        );
    }

    let flour = analysis.flour_weight;
    if flour > 0.0 {
        analysis.hydration_ratio = analysis.water_weight / flour;
        analysis.salt_percentage = salt / flour * 100.0;
        analysis.sugar_percentage = sugar / flour * 100.0;
        analysis.fat_percentage = fat / flour * 100.0;
        analysis.starter_percentage = leaven / flour * 100.0;
        analysis.whole_grain_percentage = whole_grain / flour * 100.0;
    }
    analysis
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(items: &[(&str, f64)]) -> BTreeMap<String, f64> {
        items
            .iter()
            .map(|(name, amount)| (name.to_string(), *amount))
            .collect()
    }

    #[test]
    fn country_loaf_ratios() {
        let analysis = analyze_ingredients(&recipe(&[
            ("bread flour", 500.0),
            ("water", 350.0),
            ("salt", 10.0),
            ("sourdough starter", 100.0),
        ]));
        assert!((analysis.hydration_ratio - 0.70).abs() < 1e-12);
        assert!((analysis.starter_percentage - 20.0).abs() < 1e-12);
        assert!((analysis.salt_percentage - 2.0).abs() < 1e-12);
        assert_eq!(analysis.total_weight, 960.0);
    }

    #[test]
    fn no_flour_means_zero_ratios() {
        let analysis = analyze_ingredients(&recipe(&[
            ("water", 300.0),
            ("salt", 5.0),
            ("sugar", 20.0),
            ("butter", 40.0),
            ("yeast", 7.0),
        ]));
        assert_eq!(analysis.flour_weight, 0.0);
        assert_eq!(analysis.hydration_ratio, 0.0);
        assert_eq!(analysis.salt_percentage, 0.0);
        assert_eq!(analysis.sugar_percentage, 0.0);
        assert_eq!(analysis.fat_percentage, 0.0);
        assert_eq!(analysis.starter_percentage, 0.0);
        assert_eq!(analysis.whole_grain_percentage, 0.0);
    }

    #[test]
    fn non_positive_quantities_are_skipped() {
        let analysis = analyze_ingredients(&recipe(&[
            ("bread flour", 500.0),
            ("water", 0.0),
            ("salt", -4.0),
        ]));
        assert_eq!(analysis.total_weight, 500.0);
        assert_eq!(analysis.ingredients.len(), 1);
        assert_eq!(analysis.hydration_ratio, 0.0);
    }

    #[test]
    fn empty_ingredients_are_all_zero() {
        let analysis = analyze_ingredients(&BTreeMap::new());
        assert_eq!(analysis, CompositionAnalysis::default());
    }

    #[test]
    fn lookup_prefers_exact_then_longest_contained_name() {
        assert_eq!(ingredient_properties("  Bread   FLOUR ").gluten, 0.95);
        let whole = ingredient_properties("whole wheat flour");
        assert!(whole.whole_grain);
        assert_eq!(whole.category, IngredientCategory::Flour);
        assert_eq!(ingredient_properties("diastatic malt powder").fermentation, 0.85);
        assert_eq!(
            ingredient_properties("extra virgin olive oil").category,
            IngredientCategory::Fat
        );
    }

    #[test]
    fn lookup_falls_back_to_names_containing_query() {
        assert_eq!(ingredient_properties("flour").category, IngredientCategory::Flour);
    }

    #[test]
    fn water_is_recognized_by_name() {
        assert_eq!(ingredient_properties("Warm water").category, IngredientCategory::Water);
        assert_eq!(ingredient_properties("water").gluten, 0.5);
    }

    #[test]
    fn unknown_ingredient_gets_neutral_scores() {
        assert_eq!(ingredient_properties("sunflower seeds"), IngredientProperties::NEUTRAL);
    }

    #[test]
    fn whole_grain_percentage_tracks_whole_grain_flours() {
        let analysis = analyze_ingredients(&recipe(&[
            ("bread flour", 400.0),
            ("whole wheat flour", 100.0),
            ("water", 375.0),
        ]));
        assert!((analysis.whole_grain_percentage - 20.0).abs() < 1e-12);
        assert!((analysis.hydration_ratio - 0.75).abs() < 1e-12);
    }

    #[test]
    fn baker_percentage_uses_nominal_flour_when_absent() {
        let with_flour = analyze_ingredients(&recipe(&[("bread flour", 500.0), ("water", 350.0)]));
        assert!((with_flour.baker_percentage(500.0) - 170.0).abs() < 1e-9);
        let without = analyze_ingredients(&recipe(&[("water", 250.0)]));
        assert!((without.baker_percentage(500.0) - 50.0).abs() < 1e-9);
    }
}
