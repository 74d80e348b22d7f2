//! Preprocessing blocks for the optional first pipeline stage
//!
//! Feature transforms (scalers, quantile transform, PCA) are fit on training rows only and
//! applied to every later input. Outlier filters drop flagged training rows and pass
//! inputs through unchanged at predict time.

mod outliers;
mod pca;
mod quantile;
mod scaler;

pub use outliers::{OutlierFilter, OutlierMethod};
pub use pca::Pca;
pub use quantile::{OutputDistribution, QuantileTransformer};
pub use scaler::{Scaler, ScalerType};

use crate::catalog::PreprocessorKind;
use crate::error::{AutoMlError, Result};
use crate::optimizer::search_space::{ParamsExt, TrialParams};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Fit-then-transform feature block
pub trait Transformer {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}

pub(crate) fn check_width(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(AutoMlError::ShapeError {
            expected: format!("{} features", n_features),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// Preprocessing stage of a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "block", content = "state")]
pub enum Preprocessor {
    Scaler(Scaler),
    Quantile(QuantileTransformer),
    Pca(Pca),
    Outlier(OutlierFilter),
}

impl Preprocessor {
    /// Build an unfitted block for `kind` from sampled hyperparameters
    pub fn for_kind(kind: PreprocessorKind, params: &TrialParams, seed: u64) -> Self {
        match kind {
            PreprocessorKind::StandardScaler => Preprocessor::Scaler(Scaler::new(ScalerType::Standard {
                with_mean: params.bool_or("with_mean", true),
            })),
            PreprocessorKind::RobustScaler => Preprocessor::Scaler(Scaler::new(ScalerType::robust_from_range(
                params.str_or("quantile_range", "25_75"),
            ))),
            PreprocessorKind::QuantileTransform => Preprocessor::Quantile(QuantileTransformer::new(
                params.usize_or("n_quantiles", 1000),
                OutputDistribution::from_name(params.str_or("output_distribution", "uniform")),
            )),
            PreprocessorKind::Pca => Preprocessor::Pca(Pca::new(params.float_or("n_components", 1.0), seed)),
            PreprocessorKind::KMeansOutlier => Preprocessor::Outlier(OutlierFilter::new(
                OutlierMethod::KMeans {
                    n_clusters: params.usize_or("n_clusters", 3),
                },
                params.float_or("contamination", 0.05),
                seed,
            )),
            PreprocessorKind::IsolationForest => Preprocessor::Outlier(OutlierFilter::new(
                OutlierMethod::IsolationForest {
                    n_estimators: params.usize_or("n_estimators", 100),
                },
                params.float_or("contamination", 0.05),
                seed,
            )),
            PreprocessorKind::LocalOutlierFactor => Preprocessor::Outlier(OutlierFilter::new(
                OutlierMethod::LocalOutlierFactor {
                    n_neighbors: params.usize_or("n_neighbors", 20),
                },
                params.float_or("contamination", 0.05),
                seed,
            )),
        }
    }

    /// Fit on training rows and return the rows the model stage should see
    pub fn fit_resample(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(Array2<f64>, Array1<f64>)> {
        match self {
            Preprocessor::Outlier(filter) => filter.fit_resample(x, y),
            Preprocessor::Scaler(t) => Ok((t.fit_transform(x)?, y.clone())),
            Preprocessor::Quantile(t) => Ok((t.fit_transform(x)?, y.clone())),
            Preprocessor::Pca(t) => Ok((t.fit_transform(x)?, y.clone())),
        }
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            Preprocessor::Outlier(filter) => filter.transform(x),
            Preprocessor::Scaler(t) => t.transform(x),
            Preprocessor::Quantile(t) => t.transform(x),
            Preprocessor::Pca(t) => t.transform(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 3), |(i, j)| ((i as f64) * 0.3 + j as f64).sin() * (j + 1) as f64);
        let y = Array1::from_shape_fn(40, |i| i as f64);
        (x, y)
    }

    #[test]
    fn test_every_kind_round_trips_shapes() {
        let (x, y) = data();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        for kind in PreprocessorKind::ALL {
            let params = kind.search_space().sample(&mut rng);
            let mut block = Preprocessor::for_kind(kind, &params, 1);
            let (xt, yt) = block.fit_resample(&x, &y).unwrap();
            assert_eq!(xt.nrows(), yt.len(), "{}", kind);

            if kind.is_outlier_filter() {
                assert!(xt.nrows() >= 36, "{} dropped too many rows", kind);
                assert_eq!(block.transform(&x).unwrap(), x);
            } else {
                assert_eq!(xt.nrows(), 40);
                assert_eq!(block.transform(&x).unwrap().nrows(), 40);
            }
        }
    }

    #[test]
    fn test_transform_before_fit_is_not_fitted() {
        let block = Preprocessor::for_kind(PreprocessorKind::StandardScaler, &TrialParams::new(), 0);
        assert!(matches!(block.transform(&Array2::zeros((2, 2))), Err(AutoMlError::NotFitted)));
    }

    #[test]
    fn test_width_mismatch() {
        let (x, y) = data();
        let mut block = Preprocessor::for_kind(PreprocessorKind::RobustScaler, &TrialParams::new(), 0);
        block.fit_resample(&x, &y).unwrap();
        assert!(matches!(
            block.transform(&Array2::zeros((2, 5))),
            Err(AutoMlError::ShapeError { .. })
        ));
    }
}
