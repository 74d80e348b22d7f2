//! Native regression estimators behind each model family

mod adaboost;
mod boosting;
mod forest;
mod linear;
mod mlp;
mod svr;
pub mod tree;

pub use adaboost::{AdaBoostRegressor, AdaLoss};
pub use boosting::BoostedTrees;
pub use forest::ForestRegressor;
pub use linear::{LinearModel, Penalty};
pub use mlp::{Activation, MlpRegressor};
pub use svr::KernelSvr;
pub use tree::{MaxFeatures, RegressionTree, TreeParams};

use crate::catalog::ModelFamily;
use crate::error::{AutoMlError, Result};
use crate::optimizer::search_space::{ParamsExt, TrialParams};
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Common interface of every estimator
pub trait Regressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    fn is_fitted(&self) -> bool;
}

pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(AutoMlError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(AutoMlError::TrainingError(format!(
            "cannot fit on a {}x{} matrix",
            x.nrows(),
            x.ncols()
        )));
    }
    Ok(())
}

pub(crate) fn check_predict_input(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(AutoMlError::ShapeError {
            expected: format!("{} features", n_features),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// Closed set of estimators, one variant per implementation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "estimator", content = "state")]
pub enum Estimator {
    Linear(LinearModel),
    Svr(KernelSvr),
    Tree(DecisionTreeRegressor),
    Forest(ForestRegressor),
    Boosting(BoostedTrees),
    AdaBoost(AdaBoostRegressor),
    Mlp(MlpRegressor),
}

impl Estimator {
    /// The deterministic OLS baseline
    pub fn baseline() -> Self {
        Estimator::Linear(LinearModel::ols())
    }

    /// Build an unfitted estimator for `family` from sampled hyperparameters
    pub fn for_family(family: ModelFamily, params: &TrialParams, seed: u64) -> Self {
        match family {
            ModelFamily::Ridge => Estimator::Linear(LinearModel::ridge(params.float_or("alpha", 1.0))),
            ModelFamily::Lasso => Estimator::Linear(LinearModel::lasso(params.float_or("alpha", 0.1))),
            ModelFamily::ElasticNet => Estimator::Linear(LinearModel::elastic_net(
                params.float_or("alpha", 0.1),
                params.float_or("l1_ratio", 0.5),
            )),
            ModelFamily::Svr => Estimator::Svr(KernelSvr::new(
                params.float_or("c", 1.0),
                params.float_or("epsilon", 0.1),
                params.str_or("kernel", "rbf"),
                seed,
            )),
            ModelFamily::DecisionTree => Estimator::Tree(DecisionTreeRegressor::new(
                TreeParams::default()
                    .with_max_depth(params.usize_or("max_depth", 6))
                    .with_min_samples_leaf(params.usize_or("min_samples_leaf", 1)),
                seed,
            )),
            ModelFamily::RandomForest => Estimator::Forest(ForestRegressor::random_forest(
                params.usize_or("n_estimators", 100),
                params.usize_or("max_depth", 8),
                MaxFeatures::from_name(params.str_or("max_features", "all")),
                seed,
            )),
            ModelFamily::ExtraTrees => Estimator::Forest(ForestRegressor::extra_trees(
                params.usize_or("n_estimators", 100),
                params.usize_or("max_depth", 8),
                MaxFeatures::from_name(params.str_or("max_features", "all")),
                seed,
            )),
            ModelFamily::GradientBoosting => Estimator::Boosting(BoostedTrees::gradient_boosting(
                params.usize_or("n_estimators", 100),
                params.float_or("learning_rate", 0.1),
                params.usize_or("max_depth", 3),
                params.float_or("subsample", 1.0),
                seed,
            )),
            ModelFamily::AdaBoost => Estimator::AdaBoost(AdaBoostRegressor::new(
                params.usize_or("n_estimators", 50),
                params.float_or("learning_rate", 1.0),
                AdaLoss::from_name(params.str_or("loss", "linear")),
                seed,
            )),
            ModelFamily::Mlp => Estimator::Mlp(
                MlpRegressor::new(
                    params.usize_or("hidden_units", 32),
                    params.usize_or("n_layers", 1),
                    Activation::from_name(params.str_or("activation", "relu")),
                    seed,
                )
                .with_learning_rate(params.float_or("learning_rate", 1e-3))
                .with_alpha(params.float_or("alpha", 1e-4))
                .with_max_iter(params.usize_or("max_iter", 200)),
            ),
            ModelFamily::XGBoost => Estimator::Boosting(BoostedTrees::xgboost(
                params.usize_or("n_estimators", 100),
                params.float_or("learning_rate", 0.1),
                params.usize_or("max_depth", 6),
                params.float_or("reg_lambda", 1.0),
                params.float_or("gamma", 0.0),
                params.float_or("colsample_bytree", 1.0),
                seed,
            )),
            ModelFamily::LightGBM => Estimator::Boosting(BoostedTrees::lightgbm(
                params.usize_or("n_estimators", 100),
                params.float_or("learning_rate", 0.1),
                params.usize_or("num_leaves", 31),
                params.usize_or("min_child_samples", 20),
                params.float_or("reg_lambda", 0.0),
                seed,
            )),
        }
    }

    fn inner(&self) -> &dyn Regressor {
        match self {
            Estimator::Linear(m) => m,
            Estimator::Svr(m) => m,
            Estimator::Tree(m) => m,
            Estimator::Forest(m) => m,
            Estimator::Boosting(m) => m,
            Estimator::AdaBoost(m) => m,
            Estimator::Mlp(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Regressor {
        match self {
            Estimator::Linear(m) => m,
            Estimator::Svr(m) => m,
            Estimator::Tree(m) => m,
            Estimator::Forest(m) => m,
            Estimator::Boosting(m) => m,
            Estimator::AdaBoost(m) => m,
            Estimator::Mlp(m) => m,
        }
    }
}

impl Regressor for Estimator {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn is_fitted(&self) -> bool {
        self.inner().is_fitted()
    }
}

/// Single CART tree on squared error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    pub params: TreeParams,
    pub random_state: u64,
    tree: Option<RegressionTree>,
}

impl DecisionTreeRegressor {
    pub fn new(params: TreeParams, seed: u64) -> Self {
        Self {
            params,
            random_state: seed,
            tree: None,
        }
    }
}

impl Regressor for DecisionTreeRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let rows: Vec<usize> = (0..x.nrows()).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.random_state);
        self.tree = Some(RegressionTree::fit(x, y, &rows, &self.params, &mut rng)?);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let tree = self.tree.as_ref().ok_or(AutoMlError::NotFitted)?;
        check_predict_input(x, tree.n_features())?;
        Ok(tree.predict(x))
    }

    fn is_fitted(&self) -> bool {
        self.tree.is_some()
    }
}
