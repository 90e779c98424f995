//! Keyword analysis of free-text baking instructions.

use serde::{Deserialize, Serialize};

/// Neutral mixing intensity when instructions say nothing about mixing.
pub const DEFAULT_MIXING_INTENSITY: f64 = 0.5;
/// Neutral fermentation-temperature factor (room temperature).
pub const DEFAULT_TEMPERATURE_FACTOR: f64 = 0.6;
/// Number of instruction lines that counts as a fully complex process.
pub const COMPLEXITY_LINE_CAP: usize = 10;

/// Which score a keyword table feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordTarget {
    MixingIntensity,
    TemperatureFactor,
}

/// How a matched keyword's weight turns into a score increment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Increment {
    /// Adds `weight × gain`.
    Scaled { gain: f64 },
    /// Adds `(weight − pivot) × gain`; weights are target levels around `pivot`.
    Relative { pivot: f64, gain: f64 },
}

impl Increment {
    fn apply(self, weight: f64) -> f64 {
        match self {
            Increment::Scaled { gain } => weight * gain,
            Increment::Relative { pivot, gain } => (weight - pivot) * gain,
        }
    }
}

/// Keyword → weight mapping feeding one score.
#[derive(Debug, Clone, Copy)]
pub struct KeywordTable {
    pub name: &'static str,
    pub target: KeywordTarget,
    pub increment: Increment,
    /// Matched keywords are listed in [`InstructionAnalysis::fermentation_steps`].
    pub records_steps: bool,
    pub entries: &'static [(&'static str, f64)],
}

pub const FERMENTATION_KEYWORDS: KeywordTable = KeywordTable {
    name: "fermentation",
    target: KeywordTarget::TemperatureFactor,
    increment: Increment::Scaled { gain: 0.15 },
    records_steps: true,
    entries: &[
        ("bulk ferment", 1.0),
        ("bulk fermentation", 1.0),
        ("first rise", 0.8),
        ("bulk rise", 0.9),
        ("overnight", 0.9),
        ("cold ferment", 0.8),
        ("room temperature", 0.7),
        ("ambient", 0.6),
        ("proof", 0.7),
        ("proofing", 0.7),
        ("rise", 0.6),
        ("rising", 0.6),
    ],
};

pub const MIXING_KEYWORDS: KeywordTable = KeywordTable {
    name: "mixing",
    target: KeywordTarget::MixingIntensity,
    increment: Increment::Scaled { gain: 0.15 },
    records_steps: false,
    entries: &[
        ("knead", 0.7),
        ("kneading", 0.7),
        ("massage", 0.6),
        ("rubaud", 0.5),
        ("autolyse", 0.4),
        ("rest", 0.3),
        ("fold", 0.5),
        ("folding", 0.5),
        ("coil fold", 0.6),
        ("stretch and fold", 0.7),
        ("slap and fold", 0.8),
        ("high-speed", 0.9),
        ("machine", 0.8),
    ],
};

pub const TEMPERATURE_KEYWORDS: KeywordTable = KeywordTable {
    name: "temperature",
    target: KeywordTarget::TemperatureFactor,
    increment: Increment::Relative {
        pivot: DEFAULT_TEMPERATURE_FACTOR,
        gain: 0.5,
    },
    records_steps: false,
    entries: &[
        ("warm", 0.7),
        ("cool", 0.4),
        ("cold", 0.3),
        ("room temperature", 0.6),
        ("warm water", 0.75),
        ("cool water", 0.35),
        ("ambient", 0.6),
    ],
};

/// Built-in tables, scanned in this order.
pub const DEFAULT_KEYWORD_TABLES: &[KeywordTable] =
    &[FERMENTATION_KEYWORDS, MIXING_KEYWORDS, TEMPERATURE_KEYWORDS];

/// Process scores derived from the instruction text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionAnalysis {
    pub mixing_intensity: f64,
    pub fermentation_temperature_factor: f64,
    /// Fraction of [`COMPLEXITY_LINE_CAP`] non-blank lines.
    pub process_complexity: f64,
    pub has_autolyse: bool,
    pub has_bulk_ferment: bool,
    pub has_cold_ferment: bool,
    pub has_stretch_fold: bool,
    /// Fermentation keywords found, in table order.
    pub fermentation_steps: Vec<String>,
}

impl Default for InstructionAnalysis {
    fn default() -> Self {
        Self {
            mixing_intensity: DEFAULT_MIXING_INTENSITY,
            fermentation_temperature_factor: DEFAULT_TEMPERATURE_FACTOR,
            process_complexity: 0.0,
            has_autolyse: false,
            has_bulk_ferment: false,
            has_cold_ferment: false,
            has_stretch_fold: false,
            fermentation_steps: Vec::new(),
        }
    }
}

/// Scans instruction text against a set of keyword tables.
#[derive(Debug, Clone)]
pub struct InstructionAnalyzer {
    tables: Vec<KeywordTable>,
}

impl Default for InstructionAnalyzer {
    fn default() -> Self {
        Self::with_tables(DEFAULT_KEYWORD_TABLES.to_vec())
    }
}

impl InstructionAnalyzer {
    pub fn with_tables(tables: Vec<KeywordTable>) -> Self {
        Self { tables }
    }

    /// Analyze optional instruction text; blank input yields neutral defaults.
    pub fn analyze(&self, instructions: Option<&str>) -> InstructionAnalysis {
        let mut analysis = InstructionAnalysis::default();
        let Some(text) = instructions.filter(|text| !text.trim().is_empty()) else {
            return analysis;
        };
        let lower = text.to_lowercase();

        for table in &self.tables {
            for &(keyword, weight) in table.entries {
                if !lower.contains(keyword) {
                    continue;
                }
                let delta = table.increment.apply(weight);
                match table.target {
                    KeywordTarget::MixingIntensity => analysis.mixing_intensity += delta,
                    KeywordTarget::TemperatureFactor => {
                        analysis.fermentation_temperature_factor += delta
                    }
                }
                if table.records_steps {
                    analysis.fermentation_steps.push(keyword.to_string());
                }
            }
        }
        analysis.mixing_intensity = analysis.mixing_intensity.clamp(0.0, 1.0);
        analysis.fermentation_temperature_factor =
            analysis.fermentation_temperature_factor.clamp(0.0, 1.0);

        analysis.has_autolyse = lower.contains("autolyse");
        analysis.has_stretch_fold =
            lower.contains("stretch and fold") || lower.contains("coil fold");
        analysis.has_cold_ferment = lower.contains("cold") || lower.contains("overnight");
        analysis.has_bulk_ferment = lower.contains("bulk");

        let steps = lower.lines().filter(|line| !line.trim().is_empty()).count();
        analysis.process_complexity =
            steps.min(COMPLEXITY_LINE_CAP) as f64 / COMPLEXITY_LINE_CAP as f64;
        analysis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_text_uses_defaults() {
        let analyzer = InstructionAnalyzer::default();
        assert_eq!(analyzer.analyze(None), InstructionAnalysis::default());
        assert_eq!(analyzer.analyze(Some("  \n ")), InstructionAnalysis::default());
    }

    #[test]
    fn technique_flags_follow_substrings() {
        let analysis = InstructionAnalyzer::default().analyze(Some(
            "Autolyse 1 hour.\nStretch and fold every 30 minutes during bulk.\nRetard overnight in the fridge.",
        ));
        assert!(analysis.has_autolyse);
        assert!(analysis.has_stretch_fold);
        assert!(analysis.has_bulk_ferment);
        assert!(analysis.has_cold_ferment);
        assert!((analysis.process_complexity - 0.3).abs() < 1e-12);
        assert!(analysis.fermentation_steps.contains(&"overnight".to_string()));
    }

    #[test]
    fn mixing_keywords_raise_intensity() {
        let analysis = InstructionAnalyzer::default().analyze(Some("Knead in the machine"));
        // knead 0.7 and machine 0.8, each scaled by 0.15.
        assert!((analysis.mixing_intensity - (0.5 + 0.105 + 0.12)).abs() < 1e-12);
    }

    #[test]
    fn scores_are_clamped_to_unit_interval() {
        let text = "knead kneading massage slap and fold stretch and fold coil fold high-speed machine \
                    bulk fermentation bulk rise first rise proofing rising overnight warm water";
        let analysis = InstructionAnalyzer::default().analyze(Some(text));
        assert_eq!(analysis.mixing_intensity, 1.0);
        assert_eq!(analysis.fermentation_temperature_factor, 1.0);
    }

    #[test]
    fn cold_keywords_lower_temperature_factor() {
        let analysis = InstructionAnalyzer::default().analyze(Some("use cold water"));
        // "cold" pulls 0.3 below neutral by half.
        assert!(analysis.fermentation_temperature_factor < DEFAULT_TEMPERATURE_FACTOR);
        assert!(analysis.has_cold_ferment);
    }

    #[test]
    fn complexity_caps_at_ten_lines() {
        let text = (0..25).map(|i| format!("step {i}")).collect::<Vec<_>>().join("\n");
        let analysis = InstructionAnalyzer::default().analyze(Some(&text));
        assert_eq!(analysis.process_complexity, 1.0);
    }

    #[test]
    fn custom_tables_extend_without_code_changes() {
        const LAMINATION: KeywordTable = KeywordTable {
            name: "lamination",
            target: KeywordTarget::MixingIntensity,
            increment: Increment::Scaled { gain: 0.1 },
            records_steps: false,
            entries: &[("laminate", 1.0)],
        };
        let analyzer = InstructionAnalyzer::with_tables(vec![LAMINATION]);
        let analysis = analyzer.analyze(Some("Laminate the dough"));
        assert!((analysis.mixing_intensity - 0.6).abs() < 1e-12);
        assert!(analysis.fermentation_steps.is_empty());
    }

    #[test]
    fn step_recording_follows_the_table_flag() {
        let retard = KeywordTable {
            name: "retard",
            records_steps: true,
            entries: &[("retard", 0.5)],
            ..MIXING_KEYWORDS
        };
        let text = Some("Knead, then retard in the fridge");
        let analysis =
            InstructionAnalyzer::with_tables(vec![retard, MIXING_KEYWORDS]).analyze(text);
        assert_eq!(analysis.fermentation_steps, vec!["retard".to_string()]);

        let renamed = KeywordTable {
            name: "bulk",
            ..FERMENTATION_KEYWORDS
        };
        let analysis = InstructionAnalyzer::with_tables(vec![renamed]).analyze(Some("bulk rise"));
        assert_eq!(
            analysis.fermentation_steps,
            vec!["bulk rise".to_string(), "rise".to_string()]
        );
    }
}
