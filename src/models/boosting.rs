//! Gradient boosted trees on squared error
//!
//! One implementation serves three families: classic gradient boosting (row
//! subsampling, depth-wise trees), XGBoost-style (L2 leaf penalty, split gain threshold,
//! per-tree column sampling) and LightGBM-style (leaf-wise growth capped by leaf count).

use super::tree::{RegressionTree, TreeParams};
use super::{check_fit_input, check_predict_input, Regressor};
use crate::error::{AutoMlError, Result};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostedTrees {
    pub n_estimators: usize,
    pub learning_rate: f64,
    /// Fraction of rows drawn without replacement per round
    pub subsample: f64,
    /// Fraction of columns drawn per tree
    pub colsample: f64,
    pub tree_params: TreeParams,
    pub random_state: u64,
    base_score: f64,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl BoostedTrees {
    pub fn gradient_boosting(n_estimators: usize, learning_rate: f64, max_depth: usize, subsample: f64, seed: u64) -> Self {
        Self::new(
            n_estimators,
            learning_rate,
            TreeParams::default().with_max_depth(max_depth),
            seed,
        )
        .with_subsample(subsample)
    }

    pub fn xgboost(
        n_estimators: usize,
        learning_rate: f64,
        max_depth: usize,
        reg_lambda: f64,
        gamma: f64,
        colsample_bytree: f64,
        seed: u64,
    ) -> Self {
        let params = TreeParams::default()
            .with_max_depth(max_depth)
            .with_lambda(reg_lambda)
            .with_gamma(gamma);
        let mut model = Self::new(n_estimators, learning_rate, params, seed);
        model.colsample = colsample_bytree.clamp(0.05, 1.0);
        model
    }

    pub fn lightgbm(
        n_estimators: usize,
        learning_rate: f64,
        num_leaves: usize,
        min_child_samples: usize,
        reg_lambda: f64,
        seed: u64,
    ) -> Self {
        let params = TreeParams::default()
            .with_max_depth(32)
            .with_max_leaves(num_leaves)
            .with_min_samples_leaf(min_child_samples)
            .with_lambda(reg_lambda);
        Self::new(n_estimators, learning_rate, params, seed)
    }

    fn new(n_estimators: usize, learning_rate: f64, tree_params: TreeParams, seed: u64) -> Self {
        Self {
            n_estimators: n_estimators.max(1),
            learning_rate,
            subsample: 1.0,
            colsample: 1.0,
            tree_params,
            random_state: seed,
            base_score: 0.0,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_subsample(mut self, subsample: f64) -> Self {
        self.subsample = subsample.clamp(0.05, 1.0);
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for BoostedTrees {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let (n, p) = x.dim();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.random_state);

        self.base_score = y.mean().unwrap_or(0.0);
        self.n_features = p;
        self.trees.clear();

        let mut pred = Array1::from_elem(n, self.base_score);
        let hess = vec![1.0; n];
        let all_rows: Vec<usize> = (0..n).collect();
        let all_features: Vec<usize> = (0..p).collect();
        let n_rows = ((n as f64 * self.subsample).round() as usize).clamp(1, n);
        let n_cols = ((p as f64 * self.colsample).round() as usize).clamp(1, p);

        for _ in 0..self.n_estimators {
            let grad: Vec<f64> = pred.iter().zip(y.iter()).map(|(p, t)| p - t).collect();

            let rows: Vec<usize> = if n_rows < n {
                all_rows.choose_multiple(&mut rng, n_rows).copied().collect()
            } else {
                all_rows.clone()
            };
            let features: Option<Vec<usize>> = if n_cols < p {
                Some(all_features.choose_multiple(&mut rng, n_cols).copied().collect())
            } else {
                None
            };

            let tree = RegressionTree::grow(x, &rows, &grad, &hess, features.as_deref(), &self.tree_params, &mut rng)?;
            pred.scaled_add(self.learning_rate, &tree.predict(x));
            self.trees.push(tree);
        }
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(AutoMlError::NotFitted);
        }
        check_predict_input(x, self.n_features)?;

        let mut pred = Array1::from_elem(x.nrows(), self.base_score);
        for tree in &self.trees {
            pred.scaled_add(self.learning_rate, &tree.predict(x));
        }
        Ok(pred)
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::metrics::r2_score;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((50, 2), |(i, j)| ((i * (j + 3)) % 17) as f64);
        let y = Array1::from_shape_fn(50, |i| x[[i, 0]] * 2.0 - x[[i, 1]]);
        (x, y)
    }

    #[test]
    fn test_gradient_boosting_fits() {
        let (x, y) = data();
        let mut model = BoostedTrees::gradient_boosting(100, 0.1, 3, 1.0, 0);
        model.fit(&x, &y).unwrap();
        assert!(r2_score(&y, &model.predict(&x).unwrap()) > 0.9);
    }

    #[test]
    fn test_xgboost_fits_with_column_sampling() {
        let (x, y) = data();
        let mut model = BoostedTrees::xgboost(100, 0.2, 4, 1.0, 0.0, 0.5, 1);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.n_trees(), 100);
        assert!(r2_score(&y, &model.predict(&x).unwrap()) > 0.8);
    }

    #[test]
    fn test_lightgbm_fits() {
        let (x, y) = data();
        let mut model = BoostedTrees::lightgbm(100, 0.1, 8, 2, 0.1, 2);
        model.fit(&x, &y).unwrap();
        assert!(r2_score(&y, &model.predict(&x).unwrap()) > 0.9);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = BoostedTrees::gradient_boosting(10, 0.1, 2, 1.0, 0);
        assert!(matches!(model.predict(&Array2::zeros((1, 2))), Err(AutoMlError::NotFitted)));
    }
}
