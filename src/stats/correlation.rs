//! Pearson correlation with a two-sided significance test.

use serde::{Deserialize, Serialize};

use super::distribution::students_t_two_sided_p;
use crate::analysis::FEATURE_NAMES;
use crate::dataset::TrainingSet;

/// Correlation coefficient and its p-value under the null of no correlation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub r: f64,
    pub p_value: f64,
}

impl Correlation {
    /// Value used wherever the coefficient is undefined.
    pub const UNDEFINED: Correlation = Correlation { r: 0.0, p_value: 1.0 };

    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// Pearson's r between `x` and `y`.
///
/// Fewer than two pairs, a constant input, or any non-finite value give
/// [`Correlation::UNDEFINED`]. Two pairs give a p-value of 1.
pub fn pearson(x: &[f64], y: &[f64]) -> Correlation {
    let n = x.len().min(y.len());
    if n < 2 || x[..n].iter().chain(&y[..n]).any(|v| !v.is_finite()) {
        return Correlation::UNDEFINED;
    }
    let nf = n as f64;
    let mean_x = x[..n].iter().sum::<f64>() / nf;
    let mean_y = y[..n].iter().sum::<f64>() / nf;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= f64::EPSILON || syy <= f64::EPSILON {
        return Correlation::UNDEFINED;
    }
    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    if n == 2 {
        return Correlation { r, p_value: 1.0 };
    }
    let df = nf - 2.0;
    let denom = 1.0 - r * r;
    let p_value = if denom <= f64::EPSILON {
        0.0
    } else {
        let t = r * (df / denom).sqrt();
        students_t_two_sided_p(t, df)
    };
    if !p_value.is_finite() {
        return Correlation::UNDEFINED;
    }
    Correlation { r, p_value }
}

/// Correlation of one engineered feature with measured porosity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCorrelation {
    pub feature: String,
    #[serde(flatten)]
    pub correlation: Correlation,
}

/// Correlate every feature column with the porosity targets, in schema order.
pub fn feature_correlations(set: &TrainingSet) -> Vec<FeatureCorrelation> {
    let targets = set.targets();
    FEATURE_NAMES
        .iter()
        .enumerate()
        .map(|(idx, name)| FeatureCorrelation {
            feature: (*name).to_string(),
            correlation: pearson(&set.column(idx), &targets),
        })
        .collect()
}
