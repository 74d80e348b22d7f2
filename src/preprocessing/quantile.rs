//! Quantile transform to a uniform or normal output distribution

use super::{check_width, Transformer};
use crate::error::{AutoMlError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

const CLIP: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OutputDistribution {
    Uniform,
    Normal,
}

impl OutputDistribution {
    pub fn from_name(name: &str) -> Self {
        match name {
            "normal" => OutputDistribution::Normal,
            _ => OutputDistribution::Uniform,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantileTransformer {
    pub n_quantiles: usize,
    pub output_distribution: OutputDistribution,
    /// Per-column reference values at evenly spaced quantile levels
    references: Option<Vec<Vec<f64>>>,
}

impl QuantileTransformer {
    pub fn new(n_quantiles: usize, output_distribution: OutputDistribution) -> Self {
        Self {
            n_quantiles: n_quantiles.max(2),
            output_distribution,
            references: None,
        }
    }

    /// Quantile levels in use after fit (capped by the number of training rows)
    pub fn n_levels(&self) -> Option<usize> {
        self.references.as_ref().and_then(|r| r.first().map(|c| c.len()))
    }
}

/// Position of `v` in `refs` mapped to [0, 1]; ties resolve to the middle of the run
fn rank_fraction(refs: &[f64], v: f64) -> f64 {
    let last = refs.len() - 1;
    if v <= refs[0] {
        return 0.0;
    }
    if v >= refs[last] {
        return 1.0;
    }
    let upper = refs.partition_point(|r| *r <= v);
    let lower = refs.partition_point(|r| *r < v);
    let pos = if lower < upper {
        (lower + upper - 1) as f64 / 2.0
    } else {
        let (a, b) = (refs[upper - 1], refs[upper]);
        (upper - 1) as f64 + (v - a) / (b - a)
    };
    pos / last as f64
}

/// Inverse of the standard normal CDF (Acklam's rational approximation)
pub(crate) fn norm_ppf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    let p_low = 0.02425;

    if p < p_low {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - p_low {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -norm_ppf(1.0 - p)
    }
}

impl Transformer for QuantileTransformer {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let n_levels = self.n_quantiles.min(x.nrows()).max(2);
        let refs = x
            .columns()
            .into_iter()
            .map(|col| {
                let mut sorted = col.to_vec();
                sorted.sort_by(f64::total_cmp);
                (0..n_levels)
                    .map(|k| super::scaler::sorted_quantile(&sorted, k as f64 / (n_levels - 1) as f64))
                    .collect()
            })
            .collect();
        self.references = Some(refs);
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let refs = self.references.as_ref().ok_or(AutoMlError::NotFitted)?;
        check_width(x, refs.len())?;

        let mut out = x.clone();
        for (j, mut col) in out.columns_mut().into_iter().enumerate() {
            let r = &refs[j];
            col.mapv_inplace(|v| {
                let u = rank_fraction(r, v);
                match self.output_distribution {
                    OutputDistribution::Uniform => u,
                    OutputDistribution::Normal => norm_ppf(u.clamp(CLIP, 1.0 - CLIP)),
                }
            });
        }
        Ok(out)
    }
}
