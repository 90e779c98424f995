//! Evaluation metrics for regression models.

use serde::{Deserialize, Serialize};

/// Coefficient of determination, unclamped.
///
/// Returns 0 when the targets have no variance or fewer than two samples
/// are given, since the ratio is undefined there.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n < 2 {
        return 0.0;
    }
    let mean = actual[..n].iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = actual[..n].iter().map(|y| (y - mean).powi(2)).sum();
    if ss_tot <= f64::EPSILON {
        return 0.0;
    }
    let ss_res: f64 = actual[..n]
        .iter()
        .zip(predicted)
        .map(|(y, p)| (y - p).powi(2))
        .sum();
    1.0 - ss_res / ss_tot
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(actual.iter().zip(predicted).map(|(y, p)| (y - p).abs()))
}

pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(actual.iter().zip(predicted).map(|(y, p)| (y - p).powi(2)))
}

pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    mean_squared_error(actual, predicted).sqrt()
}

/// Mean and population standard deviation; `(0, 0)` for an empty slice.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    (m, var.sqrt())
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Fit quality on the data a model was trained on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FitMetrics {
    pub r2: f64,
    pub mae: f64,
    pub rmse: f64,
}

impl FitMetrics {
    pub fn evaluate(actual: &[f64], predicted: &[f64]) -> Self {
        Self {
            r2: r2_score(actual, predicted),
            mae: mean_absolute_error(actual, predicted),
            rmse: root_mean_squared_error(actual, predicted),
        }
    }
}

/// Per-fold scores from one cross-validation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FoldScores {
    pub r2: Vec<f64>,
    pub mae: Vec<f64>,
    pub mse: Vec<f64>,
}

impl FoldScores {
    pub fn push(&mut self, actual: &[f64], predicted: &[f64]) {
        self.r2.push(r2_score(actual, predicted));
        self.mae.push(mean_absolute_error(actual, predicted));
        self.mse.push(mean_squared_error(actual, predicted));
    }

    pub fn summarize(&self) -> CvSummary {
        let (r2_mean, r2_std) = mean_std(&self.r2);
        let (mae_mean, mae_std) = mean_std(&self.mae);
        let (mse_mean, mse_std) = mean_std(&self.mse);
        CvSummary {
            folds: self.r2.len(),
            r2_mean,
            r2_std,
            mae_mean,
            mae_std,
            mse_mean,
            mse_std,
        }
    }
}

/// Cross-validated metrics for one model family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CvSummary {
    pub folds: usize,
    pub r2_mean: f64,
    pub r2_std: f64,
    pub mae_mean: f64,
    pub mae_std: f64,
    pub mse_mean: f64,
    pub mse_std: f64,
}
