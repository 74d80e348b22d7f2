//! Closed catalogs of model families, preprocessing steps and metrics
//!
//! Every name a run may request resolves to exactly one variant here.
//! Lookups are case-sensitive.

mod hyperparams;

use crate::error::AutoMlError;
use crate::evaluation::metrics;
use crate::optimizer::config::OptimizeDirection;
use crate::optimizer::search_space::SearchSpace;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Regression model families the search backends may choose from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelFamily {
    Ridge,
    Lasso,
    ElasticNet,
    #[serde(rename = "SVR")]
    Svr,
    DecisionTree,
    RandomForest,
    ExtraTrees,
    GradientBoosting,
    AdaBoost,
    #[serde(rename = "MLP")]
    Mlp,
    XGBoost,
    LightGBM,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 12] = [
        ModelFamily::Ridge,
        ModelFamily::Lasso,
        ModelFamily::ElasticNet,
        ModelFamily::Svr,
        ModelFamily::DecisionTree,
        ModelFamily::RandomForest,
        ModelFamily::ExtraTrees,
        ModelFamily::GradientBoosting,
        ModelFamily::AdaBoost,
        ModelFamily::Mlp,
        ModelFamily::XGBoost,
        ModelFamily::LightGBM,
    ];

    /// Catalog name
    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::Ridge => "Ridge",
            ModelFamily::Lasso => "Lasso",
            ModelFamily::ElasticNet => "ElasticNet",
            ModelFamily::Svr => "SVR",
            ModelFamily::DecisionTree => "DecisionTree",
            ModelFamily::RandomForest => "RandomForest",
            ModelFamily::ExtraTrees => "ExtraTrees",
            ModelFamily::GradientBoosting => "GradientBoosting",
            ModelFamily::AdaBoost => "AdaBoost",
            ModelFamily::Mlp => "MLP",
            ModelFamily::XGBoost => "XGBoost",
            ModelFamily::LightGBM => "LightGBM",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.name() == name)
    }

    /// Hyperparameter catalog for this family
    pub fn search_space(&self) -> SearchSpace {
        hyperparams::model_space(*self)
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelFamily {
    type Err = AutoMlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| AutoMlError::UnknownNames {
            kind: "model family",
            names: vec![s.to_string()],
        })
    }
}

/// Preprocessing steps allowed in the optional first pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PreprocessorKind {
    #[serde(rename = "PCA")]
    Pca,
    RobustScaler,
    StandardScaler,
    QuantileTransform,
    KMeansOutlier,
    IsolationForest,
    LocalOutlierFactor,
}

impl PreprocessorKind {
    pub const ALL: [PreprocessorKind; 7] = [
        PreprocessorKind::Pca,
        PreprocessorKind::RobustScaler,
        PreprocessorKind::StandardScaler,
        PreprocessorKind::QuantileTransform,
        PreprocessorKind::KMeansOutlier,
        PreprocessorKind::IsolationForest,
        PreprocessorKind::LocalOutlierFactor,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PreprocessorKind::Pca => "PCA",
            PreprocessorKind::RobustScaler => "RobustScaler",
            PreprocessorKind::StandardScaler => "StandardScaler",
            PreprocessorKind::QuantileTransform => "QuantileTransform",
            PreprocessorKind::KMeansOutlier => "KMeansOutlier",
            PreprocessorKind::IsolationForest => "IsolationForest",
            PreprocessorKind::LocalOutlierFactor => "LocalOutlierFactor",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }

    /// Outlier blocks remove training rows instead of transforming columns
    pub fn is_outlier_filter(&self) -> bool {
        matches!(
            self,
            PreprocessorKind::KMeansOutlier
                | PreprocessorKind::IsolationForest
                | PreprocessorKind::LocalOutlierFactor
        )
    }

    /// Hyperparameter catalog for this step
    pub fn search_space(&self) -> SearchSpace {
        hyperparams::preprocessor_space(*self)
    }
}

impl fmt::Display for PreprocessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PreprocessorKind {
    type Err = AutoMlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| AutoMlError::UnknownNames {
            kind: "preprocessing step",
            names: vec![s.to_string()],
        })
    }
}

/// Scoring metric for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Metric {
    #[default]
    #[serde(rename = "r2")]
    R2,
    #[serde(rename = "neg_mean_squared_error")]
    NegMeanSquaredError,
    #[serde(rename = "neg_root_mean_squared_error")]
    NegRootMeanSquaredError,
    #[serde(rename = "neg_mean_absolute_error")]
    NegMeanAbsoluteError,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::R2,
        Metric::NegMeanSquaredError,
        Metric::NegRootMeanSquaredError,
        Metric::NegMeanAbsoluteError,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::R2 => "r2",
            Metric::NegMeanSquaredError => "neg_mean_squared_error",
            Metric::NegRootMeanSquaredError => "neg_root_mean_squared_error",
            Metric::NegMeanAbsoluteError => "neg_mean_absolute_error",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.name() == name)
    }

    /// Higher is better for r2, lower is better for the error metrics
    pub fn direction(&self) -> OptimizeDirection {
        match self {
            Metric::R2 => OptimizeDirection::Maximize,
            _ => OptimizeDirection::Minimize,
        }
    }

    /// Score predictions in natural form (r2 value or the positive error)
    pub fn score(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
        match self {
            Metric::R2 => metrics::r2_score(y_true, y_pred),
            Metric::NegMeanSquaredError => metrics::mean_squared_error(y_true, y_pred),
            Metric::NegRootMeanSquaredError => metrics::root_mean_squared_error(y_true, y_pred),
            Metric::NegMeanAbsoluteError => metrics::mean_absolute_error(y_true, y_pred),
        }
    }

    /// Whether `a` beats `b` under this metric
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        self.direction().is_better(a, b)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = AutoMlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| AutoMlError::UnknownNames {
            kind: "metric",
            names: vec![s.to_string()],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for family in ModelFamily::ALL {
            assert_eq!(ModelFamily::from_name(family.name()), Some(family));
        }
        for kind in PreprocessorKind::ALL {
            assert_eq!(kind.name().parse::<PreprocessorKind>().unwrap(), kind);
        }
        for metric in Metric::ALL {
            assert_eq!(metric.name().parse::<Metric>().unwrap(), metric);
        }
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        assert!(ModelFamily::from_name("ridge").is_none());
        assert!(PreprocessorKind::from_name("pca").is_none());
        assert!("R2".parse::<Metric>().is_err());
    }

    #[test]
    fn test_metric_direction() {
        assert!(Metric::R2.is_better(0.8, 0.6));
        assert!(Metric::NegMeanSquaredError.is_better(1.0, 2.0));
        assert!(!Metric::NegMeanAbsoluteError.is_better(2.0, 1.0));
    }

    #[test]
    fn test_every_entry_has_hyperparameters() {
        for family in ModelFamily::ALL {
            assert!(!family.search_space().is_empty(), "{} has no catalog", family);
        }
        for kind in PreprocessorKind::ALL {
            assert!(!kind.search_space().is_empty(), "{} has no catalog", kind);
        }
    }

    #[test]
    fn test_serde_uses_catalog_names() {
        let json = serde_json::to_string(&ModelFamily::Svr).unwrap();
        assert_eq!(json, "\"SVR\"");
        let metric: Metric = serde_json::from_str("\"neg_mean_absolute_error\"").unwrap();
        assert_eq!(metric, Metric::NegMeanAbsoluteError);
    }
}
