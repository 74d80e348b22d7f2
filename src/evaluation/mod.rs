//! Model evaluation: regression metrics and cross-validated scoring of pipelines

pub mod cross_validation;
pub mod metrics;

pub use cross_validation::{CVResults, CVSplit, CVStrategy, CrossValidator};
pub use metrics::RegressionMetrics;

use crate::catalog::Metric;
use crate::error::{AutoMlError, Result};
use crate::pipeline::{Pipeline, PipelineSpec};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Mean fold score of `spec` under `metric`
///
/// `train_fraction` below 1 fits each fold on a prefix of its (shuffled) training rows,
/// never fewer than `min(n_train, 5)`.
pub fn cross_val_score(
    spec: &PipelineSpec,
    x: &Array2<f64>,
    y: &Array1<f64>,
    metric: Metric,
    splits: &[CVSplit],
    train_fraction: f64,
    seed: u64,
) -> Result<f64> {
    if splits.is_empty() {
        return Err(AutoMlError::DataError("no cross-validation splits".to_string()));
    }

    let mut total = 0.0;
    for split in splits {
        let n_train = split.train_indices.len();
        let n_sub = ((train_fraction.clamp(0.0, 1.0) * n_train as f64).ceil() as usize).max(n_train.min(5));
        let train = &split.train_indices[..n_sub.min(n_train)];

        let mut pipeline = Pipeline::new(spec.clone(), seed);
        pipeline.fit(&x.select(Axis(0), train), &y.select(Axis(0), train))?;
        let pred = pipeline.predict(&x.select(Axis(0), &split.test_indices))?;
        total += metric.score(&y.select(Axis(0), &split.test_indices), &pred);
    }
    Ok(total / splits.len() as f64)
}

/// Out-of-fold evaluation of one pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    /// Mean fold score under the requested metric
    pub score: f64,
    /// Mean fold r2 / rmse / mae
    pub metrics: RegressionMetrics,
    /// Per-fold scores under the requested metric
    pub cv: CVResults,
}

const EVAL_SPLITS: usize = 5;
const EVAL_REPEATS: usize = 3;

/// Score `spec` with seeded repeated k-fold (5 splits capped by rows, 3 repeats)
///
/// The first repeat always runs. Later repeats only start while the mean repeat cost still
/// fits inside `time_limit`, so a slow pipeline is scored on fewer repeats.
pub fn evaluate_pipeline(
    spec: &PipelineSpec,
    x: &Array2<f64>,
    y: &Array1<f64>,
    metric: Metric,
    seed: u64,
    time_limit: Duration,
) -> Result<Evaluation> {
    let splits = CrossValidator::repeated_k_fold(EVAL_SPLITS, EVAL_REPEATS, x.nrows(), seed).split(x.nrows())?;
    let per_repeat = (splits.len() / EVAL_REPEATS).max(1);
    let started = Instant::now();

    let mut scores = Vec::with_capacity(splits.len());
    let (mut r2, mut rmse, mut mae) = (0.0, 0.0, 0.0);
    for (i, split) in splits.iter().enumerate() {
        if i > 0 && i % per_repeat == 0 {
            let repeats_done = (i / per_repeat) as f64;
            let elapsed = started.elapsed().as_secs_f64();
            if elapsed + elapsed / repeats_done > time_limit.as_secs_f64() {
                tracing::debug!(repeats = repeats_done, elapsed_secs = elapsed, "evaluation cut short by budget");
                break;
            }
        }
        let mut pipeline = Pipeline::new(spec.clone(), seed);
        pipeline.fit(
            &x.select(Axis(0), &split.train_indices),
            &y.select(Axis(0), &split.train_indices),
        )?;
        let y_test = y.select(Axis(0), &split.test_indices);
        let pred = pipeline.predict(&x.select(Axis(0), &split.test_indices))?;

        let fold = RegressionMetrics::compute(&y_test, &pred);
        r2 += fold.r2;
        rmse += fold.rmse;
        mae += fold.mae;
        scores.push(metric.score(&y_test, &pred));
    }

    let n = scores.len() as f64;
    let cv = CVResults::from_scores(scores);
    Ok(Evaluation {
        score: cv.mean_score,
        metrics: RegressionMetrics {
            r2: r2 / n,
            rmse: rmse / n,
            mae: mae / n,
        },
        cv,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ModelFamily;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| ((i * 7 + j * 3) % 11) as f64 + 0.1 * i as f64);
        let y = Array1::from_shape_fn(40, |i| 3.0 * x[[i, 0]] - 2.0 * x[[i, 1]] + 0.5);
        (x, y)
    }

    #[test]
    fn test_cross_val_score_linear_target() {
        let (x, y) = data();
        let splits = CrossValidator::k_fold(3, 40, 0).split(40).unwrap();
        let score = cross_val_score(&PipelineSpec::baseline(), &x, &y, Metric::R2, &splits, 1.0, 0).unwrap();
        assert!(score > 0.999);
    }

    #[test]
    fn test_subsampled_folds_still_score() {
        let (x, y) = data();
        let splits = CrossValidator::k_fold(3, 40, 1).split(40).unwrap();
        let spec = PipelineSpec::new(None, ModelFamily::Ridge);
        let score = cross_val_score(&spec, &x, &y, Metric::NegMeanAbsoluteError, &splits, 1.0 / 9.0, 0).unwrap();
        assert!(score.is_finite());
        assert!(score >= 0.0);
    }

    #[test]
    fn test_evaluate_pipeline_uses_fifteen_folds() {
        let (x, y) = data();
        let eval =
            evaluate_pipeline(&PipelineSpec::baseline(), &x, &y, Metric::R2, 3, Duration::from_secs(3600)).unwrap();
        assert_eq!(eval.cv.scores.len(), 15);
        assert!((eval.score - eval.metrics.r2).abs() < 1e-12);
        assert!(eval.metrics.rmse < 1e-6);
    }

    #[test]
    fn test_exhausted_budget_keeps_first_repeat() {
        let (x, y) = data();
        let eval = evaluate_pipeline(&PipelineSpec::baseline(), &x, &y, Metric::R2, 3, Duration::ZERO).unwrap();
        assert_eq!(eval.cv.scores.len(), 5);
        assert!(eval.score > 0.999);
    }

    #[test]
    fn test_empty_splits() {
        let (x, y) = data();
        assert!(cross_val_score(&PipelineSpec::baseline(), &x, &y, Metric::R2, &[], 1.0, 0).is_err());
    }
}
