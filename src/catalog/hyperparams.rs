//! Per-family hyperparameter catalogs

use super::{ModelFamily, PreprocessorKind};
use crate::optimizer::search_space::SearchSpace;

pub(super) fn model_space(family: ModelFamily) -> SearchSpace {
    match family {
        ModelFamily::Ridge => SearchSpace::new().log_float("alpha", 1e-3, 100.0),
        ModelFamily::Lasso => SearchSpace::new().log_float("alpha", 1e-4, 10.0),
        ModelFamily::ElasticNet => SearchSpace::new()
            .log_float("alpha", 1e-4, 10.0)
            .float("l1_ratio", 0.05, 0.95),
        ModelFamily::Svr => SearchSpace::new()
            .log_float("c", 0.1, 100.0)
            .float("epsilon", 0.01, 0.5)
            .categorical("kernel", &["rbf", "linear"]),
        ModelFamily::DecisionTree => SearchSpace::new()
            .int("max_depth", 2, 12)
            .int("min_samples_leaf", 1, 10),
        ModelFamily::RandomForest | ModelFamily::ExtraTrees => SearchSpace::new()
            .int("n_estimators", 20, 200)
            .int("max_depth", 3, 16)
            .categorical("max_features", &["sqrt", "third", "all"]),
        ModelFamily::GradientBoosting => SearchSpace::new()
            .int("n_estimators", 20, 300)
            .log_float("learning_rate", 0.01, 0.3)
            .int("max_depth", 2, 6)
            .float("subsample", 0.5, 1.0),
        ModelFamily::AdaBoost => SearchSpace::new()
            .int("n_estimators", 10, 150)
            .log_float("learning_rate", 0.01, 1.0)
            .categorical("loss", &["linear", "square", "exponential"]),
        ModelFamily::Mlp => SearchSpace::new()
            .log_int("hidden_units", 8, 128)
            .int("n_layers", 1, 2)
            .log_float("learning_rate", 1e-4, 1e-2)
            .log_float("alpha", 1e-6, 1e-2)
            .int("max_iter", 50, 300)
            .categorical("activation", &["relu", "tanh"]),
        ModelFamily::XGBoost => SearchSpace::new()
            .int("n_estimators", 20, 300)
            .log_float("learning_rate", 0.01, 0.3)
            .int("max_depth", 2, 8)
            .log_float("reg_lambda", 0.1, 10.0)
            .float("gamma", 0.0, 1.0)
            .float("colsample_bytree", 0.5, 1.0),
        ModelFamily::LightGBM => SearchSpace::new()
            .int("n_estimators", 20, 300)
            .log_float("learning_rate", 0.01, 0.3)
            .int("num_leaves", 4, 64)
            .int("min_child_samples", 2, 30)
            .log_float("reg_lambda", 0.01, 10.0),
    }
}

pub(super) fn preprocessor_space(kind: PreprocessorKind) -> SearchSpace {
    match kind {
        PreprocessorKind::Pca => SearchSpace::new().float("n_components", 0.5, 1.0),
        PreprocessorKind::RobustScaler => {
            SearchSpace::new().categorical("quantile_range", &["25_75", "10_90", "5_95"])
        }
        PreprocessorKind::StandardScaler => SearchSpace::new().boolean("with_mean"),
        PreprocessorKind::QuantileTransform => SearchSpace::new()
            .int("n_quantiles", 10, 1000)
            .categorical("output_distribution", &["uniform", "normal"]),
        PreprocessorKind::KMeansOutlier => SearchSpace::new()
            .int("n_clusters", 2, 8)
            .float("contamination", 0.01, 0.1),
        PreprocessorKind::IsolationForest => SearchSpace::new()
            .int("n_estimators", 50, 200)
            .float("contamination", 0.01, 0.1),
        PreprocessorKind::LocalOutlierFactor => SearchSpace::new()
            .int("n_neighbors", 5, 35)
            .float("contamination", 0.01, 0.1),
    }
}
