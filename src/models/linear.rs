//! Linear models: OLS baseline, Ridge, Lasso and ElasticNet

use super::{check_fit_input, check_predict_input, Regressor};
use crate::error::{AutoMlError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Solve a symmetric positive semi-definite system `a x = b` by Cholesky.
///
/// Singular systems (collinear columns) are retried with a diagonal jitter that grows
/// tenfold each attempt, which converges on the minimum-norm solution.
pub(crate) fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n == 0 {
        return Some(Array1::zeros(0));
    }
    let scale = (a.diag().iter().map(|v| v.abs()).sum::<f64>() / n as f64).max(1e-12);

    let mut jitter = 0.0;
    for _ in 0..12 {
        if let Some(x) = cholesky_attempt(a, b, jitter, scale) {
            return Some(x);
        }
        jitter = if jitter == 0.0 { 1e-10 * scale } else { jitter * 10.0 };
    }
    None
}

fn cholesky_attempt(a: &Array2<f64>, b: &Array1<f64>, jitter: f64, scale: f64) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] + jitter - sum;
                if diag <= 1e-13 * scale {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // L^T x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

fn soft_threshold(x: f64, lambda: f64) -> f64 {
    if x > lambda {
        x - lambda
    } else if x < -lambda {
        x + lambda
    } else {
        0.0
    }
}

/// Regularization applied to the least-squares objective
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Penalty {
    None,
    L2 { alpha: f64 },
    L1 { alpha: f64 },
    ElasticNet { alpha: f64, l1_ratio: f64 },
}

/// Linear regression with an intercept and optional penalty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub penalty: Penalty,
    pub max_iter: usize,
    pub tol: f64,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
}

impl LinearModel {
    pub fn new(penalty: Penalty) -> Self {
        Self {
            penalty,
            max_iter: 1000,
            tol: 1e-6,
            coefficients: None,
            intercept: 0.0,
        }
    }

    /// Ordinary least squares, the deterministic fallback estimator
    pub fn ols() -> Self {
        Self::new(Penalty::None)
    }

    pub fn ridge(alpha: f64) -> Self {
        Self::new(Penalty::L2 { alpha })
    }

    pub fn lasso(alpha: f64) -> Self {
        Self::new(Penalty::L1 { alpha })
    }

    pub fn elastic_net(alpha: f64, l1_ratio: f64) -> Self {
        Self::new(Penalty::ElasticNet { alpha, l1_ratio })
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    fn solve_closed_form(&self, x_c: &Array2<f64>, y_c: &Array1<f64>, alpha: f64) -> Result<Array1<f64>> {
        let mut xtx = x_c.t().dot(x_c);
        for i in 0..xtx.nrows() {
            xtx[[i, i]] += alpha;
        }
        let xty = x_c.t().dot(y_c);
        cholesky_solve(&xtx, &xty)
            .ok_or_else(|| AutoMlError::TrainingError("normal equations are not solvable".to_string()))
    }

    /// Coordinate descent on `1/(2n)||y - Xw||^2 + a*r*|w|_1 + a*(1-r)/2*||w||^2`
    fn solve_coordinate_descent(
        &self,
        x_c: &Array2<f64>,
        y_c: &Array1<f64>,
        alpha: f64,
        l1_ratio: f64,
    ) -> Array1<f64> {
        let n_samples = x_c.nrows() as f64;
        let n_features = x_c.ncols();
        let l1 = alpha * l1_ratio * n_samples;
        let l2 = alpha * (1.0 - l1_ratio) * n_samples;

        let col_norms: Vec<f64> = (0..n_features)
            .map(|j| x_c.column(j).mapv(|v| v * v).sum())
            .collect();

        let mut w = Array1::<f64>::zeros(n_features);
        let mut r = y_c.clone();

        for _ in 0..self.max_iter {
            let mut max_delta = 0.0f64;
            for j in 0..n_features {
                if col_norms[j] < 1e-15 {
                    continue;
                }
                let old = w[j];
                let rho = x_c.column(j).dot(&r) + col_norms[j] * old;
                w[j] = soft_threshold(rho, l1) / (col_norms[j] + l2);
                let delta = old - w[j];
                if delta != 0.0 {
                    r.scaled_add(delta, &x_c.column(j));
                }
                max_delta = max_delta.max(delta.abs());
            }
            if max_delta < self.tol {
                break;
            }
        }
        w
    }
}

impl Regressor for LinearModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| AutoMlError::TrainingError("empty feature matrix".to_string()))?;
        let y_mean = y.mean().unwrap_or(0.0);
        let x_c = x - &x_mean.clone().insert_axis(Axis(0));
        let y_c = y - y_mean;

        let w = match self.penalty {
            Penalty::None => self.solve_closed_form(&x_c, &y_c, 0.0)?,
            Penalty::L2 { alpha } => self.solve_closed_form(&x_c, &y_c, alpha)?,
            Penalty::L1 { alpha } => self.solve_coordinate_descent(&x_c, &y_c, alpha, 1.0),
            Penalty::ElasticNet { alpha, l1_ratio } => {
                self.solve_coordinate_descent(&x_c, &y_c, alpha, l1_ratio)
            }
        };

        self.intercept = y_mean - w.dot(&x_mean);
        self.coefficients = Some(w);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let w = self.coefficients.as_ref().ok_or(AutoMlError::NotFitted)?;
        check_predict_input(x, w.len())?;
        Ok(x.dot(w) + self.intercept)
    }

    fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn line() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| 3.0 * v + 2.0);
        (x, y)
    }

    #[test]
    fn test_ols_recovers_line() {
        let (x, y) = line();
        let mut model = LinearModel::ols();
        model.fit(&x, &y).unwrap();

        assert!((model.coefficients().unwrap()[0] - 3.0).abs() < 1e-8);
        assert!((model.intercept() - 2.0).abs() < 1e-8);
    }

    #[test]
    fn test_ols_handles_collinear_columns() {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| i as f64 + 20.0 * j as f64);
        let y = Array1::from_shape_fn(20, |i| i as f64);
        let mut model = LinearModel::ols();
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-4);
        }
    }

    #[test]
    fn test_ridge_shrinks() {
        let (x, y) = line();
        let mut ols = LinearModel::ols();
        let mut ridge = LinearModel::ridge(100.0);
        ols.fit(&x, &y).unwrap();
        ridge.fit(&x, &y).unwrap();

        assert!(ridge.coefficients().unwrap()[0].abs() < ols.coefficients().unwrap()[0].abs());
    }

    #[test]
    fn test_lasso_zeroes_noise_feature() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| {
            if j == 0 { i as f64 } else { ((i * 7) % 5) as f64 * 0.01 }
        });
        let y = x.column(0).mapv(|v| 2.0 * v);
        let mut model = LinearModel::lasso(0.5);
        model.fit(&x, &y).unwrap();

        let w = model.coefficients().unwrap();
        assert!(w[0] > 1.5);
        assert_eq!(w[1], 0.0);
    }

    #[test]
    fn test_elastic_net_fits() {
        let (x, y) = line();
        let mut model = LinearModel::elastic_net(0.01, 0.5);
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        assert!((pred[9] - y[9]).abs() < 1.0);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = LinearModel::ols();
        assert!(matches!(model.predict(&array![[1.0]]), Err(AutoMlError::NotFitted)));
    }
}
