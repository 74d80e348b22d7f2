//! Random forest and extra-trees regressors

use super::tree::{MaxFeatures, RegressionTree, TreeParams};
use super::{check_fit_input, check_predict_input, Regressor};
use crate::error::{AutoMlError, Result};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Averaged ensemble of independently grown trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestRegressor {
    pub n_estimators: usize,
    pub tree_params: TreeParams,
    /// Sample rows with replacement per tree (random forest) or use every row (extra trees)
    pub bootstrap: bool,
    pub random_state: u64,
    trees: Vec<RegressionTree>,
}

impl ForestRegressor {
    pub fn random_forest(n_estimators: usize, max_depth: usize, max_features: MaxFeatures, seed: u64) -> Self {
        Self {
            n_estimators: n_estimators.max(1),
            tree_params: TreeParams::default()
                .with_max_depth(max_depth)
                .with_max_features(max_features),
            bootstrap: true,
            random_state: seed,
            trees: Vec::new(),
        }
    }

    pub fn extra_trees(n_estimators: usize, max_depth: usize, max_features: MaxFeatures, seed: u64) -> Self {
        Self {
            n_estimators: n_estimators.max(1),
            tree_params: TreeParams::default()
                .with_max_depth(max_depth)
                .with_max_features(max_features)
                .with_random_splits(true),
            bootstrap: false,
            random_state: seed,
            trees: Vec::new(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for ForestRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n = x.nrows();

        let trees: Result<Vec<RegressionTree>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|i| {
                let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.random_state.wrapping_add(i as u64));
                let rows: Vec<usize> = if self.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                RegressionTree::fit(x, y, &rows, &self.tree_params, &mut rng)
            })
            .collect();

        self.trees = trees?;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let first = self.trees.first().ok_or(AutoMlError::NotFitted)?;
        check_predict_input(x, first.n_features())?;

        let mut sum = Array1::<f64>::zeros(x.nrows());
        for tree in &self.trees {
            sum += &tree.predict(x);
        }
        Ok(sum / self.trees.len() as f64)
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}
