//! Least-squares linear models solved through the normal equations.

use serde::{Deserialize, Serialize};

use super::regressor::{Regressor, RegressorKind};

/// Penalty per sample added to the ordinary least-squares system so collinear
/// or constant columns still yield a positive-definite matrix.
const OLS_JITTER: f64 = 1e-8;

/// Fitted `y = intercept + coefficients · x`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearCoefficients {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearCoefficients {
    pub fn predict(&self, features: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(w, v)| w * v)
                .sum::<f64>()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.coefficients.is_empty() {
            return Err("Linear model has no coefficients".to_string());
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|w| !w.is_finite()) {
            return Err("Linear model has non-finite coefficients".to_string());
        }
        Ok(())
    }
}

/// Ordinary least squares with an unpenalized intercept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    #[serde(flatten)]
    pub fitted: LinearCoefficients,
}

/// L2-penalized least squares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeRegression {
    pub alpha: f64,
    #[serde(flatten)]
    pub fitted: LinearCoefficients,
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            fitted: LinearCoefficients::default(),
        }
    }
}

impl Regressor for LinearRegression {
    fn kind(&self) -> RegressorKind {
        RegressorKind::Linear
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), String> {
        let penalty = OLS_JITTER * x.len().max(1) as f64;
        self.fitted = fit_penalized(x, y, penalty)?;
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> f64 {
        self.fitted.predict(features)
    }

    fn fresh(&self) -> Box<dyn Regressor> {
        Box::new(Self::default())
    }

    fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

impl Regressor for RidgeRegression {
    fn kind(&self) -> RegressorKind {
        RegressorKind::Ridge
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), String> {
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(format!("Ridge alpha must be non-negative, got {}", self.alpha));
        }
        let penalty = self.alpha.max(OLS_JITTER * x.len().max(1) as f64);
        self.fitted = fit_penalized(x, y, penalty)?;
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> f64 {
        self.fitted.predict(features)
    }

    fn fresh(&self) -> Box<dyn Regressor> {
        Box::new(Self::new(self.alpha))
    }

    fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

/// Solve `(XcᵀXc + λI) w = Xcᵀyc` on centered data, then recover the intercept.
fn fit_penalized(x: &[Vec<f64>], y: &[f64], penalty: f64) -> Result<LinearCoefficients, String> {
    if x.len() != y.len() {
        return Err("Mismatched X/Y lengths".to_string());
    }
    let Some(first) = x.first() else {
        return Err("Empty dataset".to_string());
    };
    let d = first.len();
    if d == 0 || x.iter().any(|row| row.len() != d) {
        return Err("Rows must share a non-zero feature length".to_string());
    }
    let n = x.len() as f64;
    let mut x_mean = vec![0.0; d];
    for row in x {
        for (m, v) in x_mean.iter_mut().zip(row) {
            *m += v / n;
        }
    }
    let y_mean = y.iter().sum::<f64>() / n;

    let mut gram = vec![vec![0.0; d]; d];
    let mut rhs = vec![0.0; d];
    for (row, &target) in x.iter().zip(y) {
        let centered: Vec<f64> = row.iter().zip(&x_mean).map(|(v, m)| v - m).collect();
        let yc = target - y_mean;
        for i in 0..d {
            rhs[i] += centered[i] * yc;
            for j in 0..=i {
                gram[i][j] += centered[i] * centered[j];
            }
        }
    }
    for i in 0..d {
        gram[i][i] += penalty;
        for j in 0..i {
            gram[j][i] = gram[i][j];
        }
    }
    let coefficients = cholesky_solve(gram, &rhs)?;
    let intercept = y_mean
        - coefficients
            .iter()
            .zip(&x_mean)
            .map(|(w, m)| w * m)
            .sum::<f64>();
    let fitted = LinearCoefficients {
        intercept,
        coefficients,
    };
    fitted.validate()?;
    Ok(fitted)
}

/// Solve `A x = b` for symmetric positive-definite `A`.
fn cholesky_solve(mut a: Vec<Vec<f64>>, b: &[f64]) -> Result<Vec<f64>, String> {
    let d = b.len();
    // In-place lower-triangular factor.
    for j in 0..d {
        let mut diag = a[j][j];
        for k in 0..j {
            diag -= a[j][k] * a[j][k];
        }
        if !diag.is_finite() || diag <= 0.0 {
            return Err("Normal equations are not positive definite".to_string());
        }
        let diag = diag.sqrt();
        a[j][j] = diag;
        for i in (j + 1)..d {
            let mut v = a[i][j];
            for k in 0..j {
                v -= a[i][k] * a[j][k];
            }
            a[i][j] = v / diag;
        }
    }
    let mut z = vec![0.0; d];
    for i in 0..d {
        let mut v = b[i];
        for k in 0..i {
            v -= a[i][k] * z[k];
        }
        z[i] = v / a[i][i];
    }
    let mut x = vec![0.0; d];
    for i in (0..d).rev() {
        let mut v = z[i];
        for k in (i + 1)..d {
            v -= a[k][i] * x[k];
        }
        x[i] = v / a[i][i];
    }
    Ok(x)
}
