//! AdaBoost.R2 regressor over shallow trees

use super::tree::{RegressionTree, TreeParams};
use super::{check_fit_input, check_predict_input, Regressor};
use crate::error::{AutoMlError, Result};
use ndarray::{Array1, Array2};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Per-sample loss used to reweight the training rows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AdaLoss {
    Linear,
    Square,
    Exponential,
}

impl AdaLoss {
    pub fn from_name(name: &str) -> Self {
        match name {
            "square" => AdaLoss::Square,
            "exponential" => AdaLoss::Exponential,
            _ => AdaLoss::Linear,
        }
    }

    fn apply(&self, normalized_error: f64) -> f64 {
        match self {
            AdaLoss::Linear => normalized_error,
            AdaLoss::Square => normalized_error * normalized_error,
            AdaLoss::Exponential => 1.0 - (-normalized_error).exp(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostRegressor {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub loss: AdaLoss,
    pub max_depth: usize,
    pub random_state: u64,
    estimators: Vec<RegressionTree>,
    estimator_weights: Vec<f64>,
    n_features: usize,
}

impl AdaBoostRegressor {
    pub fn new(n_estimators: usize, learning_rate: f64, loss: AdaLoss, seed: u64) -> Self {
        Self {
            n_estimators: n_estimators.max(1),
            learning_rate,
            loss,
            max_depth: 3,
            random_state: seed,
            estimators: Vec::new(),
            estimator_weights: Vec::new(),
            n_features: 0,
        }
    }

    pub fn n_estimators_fitted(&self) -> usize {
        self.estimators.len()
    }
}

impl Regressor for AdaBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n = x.nrows();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.random_state);
        let params = TreeParams::default().with_max_depth(self.max_depth);

        self.estimators.clear();
        self.estimator_weights.clear();
        self.n_features = x.ncols();
        let mut weights = vec![1.0 / n as f64; n];

        for round in 0..self.n_estimators {
            let dist = WeightedIndex::new(&weights)
                .map_err(|e| AutoMlError::TrainingError(format!("sample weights: {}", e)))?;
            let rows: Vec<usize> = (0..n).map(|_| dist.sample(&mut rng)).collect();
            let tree = RegressionTree::fit(x, y, &rows, &params, &mut rng)?;

            let errors: Vec<f64> = (tree.predict(x) - y).mapv(f64::abs).to_vec();
            let max_error = errors.iter().cloned().fold(0.0, f64::max);
            if max_error <= 0.0 {
                self.estimators.push(tree);
                self.estimator_weights.push(1.0);
                break;
            }

            let losses: Vec<f64> = errors.iter().map(|e| self.loss.apply(e / max_error)).collect();
            let avg_loss: f64 = losses.iter().zip(&weights).map(|(l, w)| l * w).sum();
            if avg_loss >= 0.5 {
                if round == 0 {
                    self.estimators.push(tree);
                    self.estimator_weights.push(1.0);
                }
                break;
            }

            let beta = avg_loss / (1.0 - avg_loss);
            self.estimators.push(tree);
            self.estimator_weights.push(self.learning_rate * (1.0 / beta.max(1e-300)).ln());

            for (w, l) in weights.iter_mut().zip(&losses) {
                *w *= beta.powf((1.0 - l) * self.learning_rate);
            }
            let total: f64 = weights.iter().sum();
            if total <= 0.0 || !total.is_finite() {
                break;
            }
            weights.iter_mut().for_each(|w| *w /= total);
        }
        Ok(())
    }

    /// Weighted median of the estimators' predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.estimators.is_empty() {
            return Err(AutoMlError::NotFitted);
        }
        check_predict_input(x, self.n_features)?;

        let preds: Vec<Array1<f64>> = self.estimators.iter().map(|t| t.predict(x)).collect();
        let half = self.estimator_weights.iter().sum::<f64>() / 2.0;

        let out = (0..x.nrows())
            .map(|i| {
                let mut votes: Vec<(f64, f64)> = preds
                    .iter()
                    .zip(&self.estimator_weights)
                    .map(|(p, &w)| (p[i], w))
                    .collect();
                votes.sort_by(|a, b| a.0.total_cmp(&b.0));
                let mut acc = 0.0;
                for (value, w) in &votes {
                    acc += w;
                    if acc >= half {
                        return *value;
                    }
                }
                votes.last().map(|v| v.0).unwrap_or(0.0)
            })
            .collect();
        Ok(out)
    }

    fn is_fitted(&self) -> bool {
        !self.estimators.is_empty()
    }
}
