//! PCA - Principal Component Analysis
//!
//! Computes the top-k eigenvectors of the covariance matrix
//! using power iteration with deflation.

use super::{check_width, Transformer};
use crate::error::{AutoMlError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PcaState {
    mean: Array1<f64>,
    /// n_features x n_components
    components: Array2<f64>,
    explained_variance: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pca {
    /// Fraction of input features kept as components
    pub n_components: f64,
    pub random_state: u64,
    state: Option<PcaState>,
}

impl Pca {
    pub fn new(n_components: f64, seed: u64) -> Self {
        Self {
            n_components: n_components.clamp(0.0, 1.0),
            random_state: seed,
            state: None,
        }
    }

    pub fn explained_variance(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.explained_variance.as_slice())
    }

    fn power_iteration(&self, cov: &Array2<f64>, k: usize) -> (Vec<f64>, Array2<f64>) {
        let d = cov.nrows();
        let max_iter = 300;
        let tol = 1e-10;
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);

        let mut work = cov.clone();
        let mut eigenvalues = Vec::with_capacity(k);
        let mut components = Array2::zeros((d, k));

        for c in 0..k {
            let mut v: Array1<f64> = (0..d).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let norm = v.dot(&v).sqrt().max(1e-12);
            v /= norm;

            let mut eigenvalue = 0.0f64;
            for _ in 0..max_iter {
                let w = work.dot(&v);
                let new_eigenvalue = v.dot(&w);
                let w_norm = w.dot(&w).sqrt();
                if w_norm < 1e-12 {
                    eigenvalue = 0.0;
                    break;
                }
                let new_v = w / w_norm;
                let diff = (&new_v - &v).mapv(|x| x * x).sum().sqrt();
                v = new_v;
                eigenvalue = new_eigenvalue;
                if diff < tol {
                    break;
                }
            }

            let eigenvalue = eigenvalue.max(0.0);
            eigenvalues.push(eigenvalue);
            components.column_mut(c).assign(&v);

            // Deflate: A = A - lambda * v * v^T
            for i in 0..d {
                for j in 0..d {
                    work[[i, j]] -= eigenvalue * v[i] * v[j];
                }
            }
        }

        (eigenvalues, components)
    }
}

impl Transformer for Pca {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let (n, d) = x.dim();
        if n < 2 {
            return Err(AutoMlError::DataError("PCA requires at least 2 samples".to_string()));
        }
        let k = ((self.n_components * d as f64).ceil() as usize).clamp(1, d);

        let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(d));
        let centered = x - &mean.view().insert_axis(Axis(0));
        let cov = centered.t().dot(&centered) / (n - 1) as f64;

        let (explained_variance, components) = self.power_iteration(&cov, k);
        self.state = Some(PcaState {
            mean,
            components,
            explained_variance,
        });
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let state = self.state.as_ref().ok_or(AutoMlError::NotFitted)?;
        check_width(x, state.mean.len())?;
        Ok((x - &state.mean.view().insert_axis(Axis(0))).dot(&state.components))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_pca_finds_primary_axis() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0], [5.0, 10.0]];
        let mut pca = Pca::new(0.5, 42);
        let out = pca.fit_transform(&x).unwrap();

        assert_eq!(out.ncols(), 1);
        let ev = pca.explained_variance().unwrap();
        assert!((ev[0] - 12.5).abs() < 1e-6);
    }

    #[test]
    fn test_component_count_rounds_up() {
        let x = Array2::from_shape_fn((10, 3), |(i, j)| ((i + 1) * (j + 2) % 7) as f64);
        let mut pca = Pca::new(0.5, 0);
        assert_eq!(pca.fit_transform(&x).unwrap().ncols(), 2);
    }

    #[test]
    fn test_too_few_samples() {
        let mut pca = Pca::new(1.0, 0);
        assert!(pca.fit(&array![[1.0, 2.0]]).is_err());
    }
}
