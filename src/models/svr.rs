//! Epsilon-insensitive support vector regression
//!
//! Solved in the primal by kernel subgradient descent on standardized features and target.
//! Large training sets are subsampled to at most `max_support` rows.

use super::{check_fit_input, check_predict_input, Regressor};
use crate::error::{AutoMlError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Kernel {
    Rbf { gamma: f64 },
    Linear,
}

impl Kernel {
    fn eval(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self {
            Kernel::Linear => a.dot(&b),
            Kernel::Rbf { gamma } => {
                let d2: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
                (-gamma * d2).exp()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SvrState {
    kernel: Kernel,
    support: Array2<f64>,
    alpha: Array1<f64>,
    bias: f64,
    x_mean: Array1<f64>,
    x_scale: Array1<f64>,
    y_mean: f64,
    y_scale: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelSvr {
    pub c: f64,
    pub epsilon: f64,
    /// "rbf" or "linear"
    pub kernel: String,
    pub max_iter: usize,
    pub max_support: usize,
    pub random_state: u64,
    state: Option<SvrState>,
}

impl KernelSvr {
    pub fn new(c: f64, epsilon: f64, kernel: &str, seed: u64) -> Self {
        Self {
            c: c.max(1e-6),
            epsilon: epsilon.max(0.0),
            kernel: kernel.to_string(),
            max_iter: 200,
            max_support: 500,
            random_state: seed,
            state: None,
        }
    }

    pub fn n_support(&self) -> usize {
        self.state
            .as_ref()
            .map(|s| s.alpha.iter().filter(|a| a.abs() > 1e-12).count())
            .unwrap_or(0)
    }
}

fn standardize(x: &Array2<f64>) -> (Array1<f64>, Array1<f64>) {
    let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
    let scale = x
        .std_axis(Axis(0), 0.0)
        .mapv(|s| if s > 1e-12 { s } else { 1.0 });
    (mean, scale)
}

impl Regressor for KernelSvr {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let (n, p) = x.dim();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.random_state);

        let rows: Vec<usize> = if n > self.max_support {
            let mut idx: Vec<usize> = (0..n).collect();
            idx.shuffle(&mut rng);
            idx.truncate(self.max_support);
            idx
        } else {
            (0..n).collect()
        };
        let x_sub = x.select(Axis(0), &rows);
        let y_sub = y.select(Axis(0), &rows);

        let (x_mean, x_scale) = standardize(&x_sub);
        let xs = (&x_sub - &x_mean.clone().insert_axis(Axis(0))) / &x_scale.clone().insert_axis(Axis(0));
        let y_mean = y_sub.mean().unwrap_or(0.0);
        let y_scale = {
            let s = y_sub.std(0.0);
            if s > 1e-12 { s } else { 1.0 }
        };
        let ys = (&y_sub - y_mean) / y_scale;

        let kernel = match self.kernel.as_str() {
            "linear" => Kernel::Linear,
            _ => Kernel::Rbf { gamma: 1.0 / p.max(1) as f64 },
        };

        let m = xs.nrows();
        let gram = Array2::from_shape_fn((m, m), |(i, j)| kernel.eval(xs.row(i), xs.row(j)));
        let lambda = 1.0 / (self.c * m as f64);

        let mut alpha = Array1::<f64>::zeros(m);
        let mut bias = 0.0;
        for t in 0..self.max_iter {
            let f = gram.dot(&alpha) + bias;
            let sub: Array1<f64> = (&ys - &f).mapv(|r| {
                if r > self.epsilon {
                    -1.0
                } else if r < -self.epsilon {
                    1.0
                } else {
                    0.0
                }
            });
            let eta = 1.0 / ((t + 1) as f64).sqrt();
            alpha = &alpha * (1.0 - eta * lambda) - &(&sub * (eta / m as f64));
            bias -= eta * sub.mean().unwrap_or(0.0);
        }

        if !alpha.iter().all(|a| a.is_finite()) || !bias.is_finite() {
            return Err(AutoMlError::TrainingError("SVR diverged".to_string()));
        }

        self.state = Some(SvrState {
            kernel,
            support: xs,
            alpha,
            bias,
            x_mean,
            x_scale,
            y_mean,
            y_scale,
        });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let state = self.state.as_ref().ok_or(AutoMlError::NotFitted)?;
        check_predict_input(x, state.x_mean.len())?;

        let xs = (x - &state.x_mean.clone().insert_axis(Axis(0))) / &state.x_scale.clone().insert_axis(Axis(0));
        let out = xs
            .rows()
            .into_iter()
            .map(|row| {
                let f: f64 = state
                    .support
                    .rows()
                    .into_iter()
                    .zip(state.alpha.iter())
                    .filter(|(_, a)| **a != 0.0)
                    .map(|(sv, a)| a * state.kernel.eval(sv, row))
                    .sum();
                (f + state.bias) * state.y_scale + state.y_mean
            })
            .collect();
        Ok(out)
    }

    fn is_fitted(&self) -> bool {
        self.state.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::metrics::r2_score;

    #[test]
    fn test_linear_kernel_fits_line() {
        let x = Array2::from_shape_fn((30, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| 0.5 * v + 1.0);
        let mut model = KernelSvr::new(10.0, 0.05, "linear", 0);
        model.fit(&x, &y).unwrap();
        assert!(r2_score(&y, &model.predict(&x).unwrap()) > 0.8);
    }

    #[test]
    fn test_rbf_kernel_is_finite() {
        let x = Array2::from_shape_fn((25, 2), |(i, j)| ((i + j) % 7) as f64);
        let y = Array1::from_shape_fn(25, |i| (i as f64).cos());
        let mut model = KernelSvr::new(1.0, 0.1, "rbf", 0);
        model.fit(&x, &y).unwrap();
        assert!(model.predict(&x).unwrap().iter().all(|v| v.is_finite()));
        assert!(model.n_support() > 0);
    }

    #[test]
    fn test_subsamples_support_rows() {
        let x = Array2::from_shape_fn((40, 1), |(i, _)| i as f64);
        let y = x.column(0).to_owned();
        let mut model = KernelSvr::new(1.0, 0.1, "linear", 0);
        model.max_support = 10;
        model.fit(&x, &y).unwrap();
        assert!(model.n_support() <= 10);
    }
}
