//! Per-feature standardization to zero mean and unit variance.

use serde::{Deserialize, Serialize};

/// Feature-wise `(x - mean) / std` transform fitted on a training matrix.
///
/// Constant features get a unit scale so they map to 0 instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit means and population standard deviations column by column.
    pub fn fit(x: &[Vec<f64>]) -> Result<Self, String> {
        let Some(first) = x.first() else {
            return Err("Cannot fit scaler on an empty matrix".to_string());
        };
        let d = first.len();
        if x.iter().any(|row| row.len() != d) {
            return Err("All rows must have the same length".to_string());
        }
        let n = x.len() as f64;
        let mut mean = vec![0.0; d];
        for row in x {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut mean {
            *m /= n;
        }
        let mut var = vec![0.0; d];
        for row in x {
            for ((acc, v), m) in var.iter_mut().zip(row).zip(&mean) {
                *acc += (v - m).powi(2);
            }
        }
        let scale = var
            .into_iter()
            .map(|v| {
                let std = (v / n).sqrt();
                if std > 1e-12 { std } else { 1.0 }
            })
            .collect();
        Ok(Self { mean, scale })
    }

    pub fn feature_len(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }

    pub fn transform_all(&self, x: &[Vec<f64>]) -> Vec<Vec<f64>> {
        x.iter().map(|row| self.transform(row)).collect()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.mean.len() != self.scale.len() {
            return Err("Scaler mean/scale length mismatch".to_string());
        }
        if self.scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err("Scaler has a non-positive scale".to_string());
        }
        Ok(())
    }
}
