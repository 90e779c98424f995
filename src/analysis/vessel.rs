//! Cooking-vessel openness encoding (0 = fully enclosed, 1 = fully open).

/// Score used for vessels not in [`VESSEL_OPENNESS`].
pub const DEFAULT_VESSEL_OPENNESS: f64 = 0.5;

/// Known vessels and how much steam they let escape.
pub const VESSEL_OPENNESS: &[(&str, f64)] = &[
    ("dutch oven", 0.3),
    ("loaf pan", 0.2),
    ("baking stone", 0.7),
    ("banneton", 0.5),
    ("bread cloche", 0.4),
    ("cloche", 0.35),
    ("covered", 0.35),
    ("oven", 0.6),
    ("cast iron", 0.5),
    ("air fryer", 0.4),
];

/// Encode a vessel name: exact match, then the first key contained in the name.
pub fn vessel_openness(vessel: &str) -> f64 {
    let lower = vessel.trim().to_lowercase();
    if lower.is_empty() {
        return DEFAULT_VESSEL_OPENNESS;
    }
    VESSEL_OPENNESS
        .iter()
        .find(|(key, _)| *key == lower)
        .or_else(|| VESSEL_OPENNESS.iter().find(|(key, _)| lower.contains(key)))
        .map(|(_, score)| *score)
        .unwrap_or(DEFAULT_VESSEL_OPENNESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_partial_matches() {
        assert_eq!(vessel_openness("Dutch Oven"), 0.3);
        assert_eq!(vessel_openness("preheated baking stone"), 0.7);
        assert_eq!(vessel_openness("enamel dutch oven"), 0.3);
    }

    #[test]
    fn unknown_vessels_default() {
        assert_eq!(vessel_openness("wok"), DEFAULT_VESSEL_OPENNESS);
        assert_eq!(vessel_openness(""), DEFAULT_VESSEL_OPENNESS);
    }
}
