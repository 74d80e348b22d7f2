//! Feature scaling implementations

use super::{check_width, Transformer};
use crate::error::{AutoMlError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard { with_mean: bool },
    /// Robust scaling: (x - median) / (q_high - q_low)
    Robust { q_low: f64, q_high: f64 },
}

impl ScalerType {
    /// Parse a robust quantile range such as `"25_75"`
    pub fn robust_from_range(range: &str) -> Self {
        let (lo, hi) = match range {
            "10_90" => (0.10, 0.90),
            "5_95" => (0.05, 0.95),
            _ => (0.25, 0.75),
        };
        ScalerType::Robust { q_low: lo, q_high: hi }
    }
}

/// Parameters for a fitted scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScalerParams {
    center: Array1<f64>,
    scale: Array1<f64>,
}

/// Column-wise feature scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: Option<ScalerParams>,
}

/// Linear-interpolated quantile of already sorted values
pub(crate) fn sorted_quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

impl Scaler {
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: None,
        }
    }

    pub fn scaler_type(&self) -> ScalerType {
        self.scaler_type
    }

    fn compute_params(&self, x: &Array2<f64>) -> ScalerParams {
        let p = x.ncols();
        match self.scaler_type {
            ScalerType::Standard { with_mean } => {
                let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(p));
                let std = x.std_axis(Axis(0), 0.0);
                ScalerParams {
                    center: if with_mean { mean } else { Array1::zeros(p) },
                    scale: std.mapv(|s| if s == 0.0 { 1.0 } else { s }),
                }
            }
            ScalerType::Robust { q_low, q_high } => {
                let mut center = Array1::zeros(p);
                let mut scale = Array1::ones(p);
                for (j, col) in x.columns().into_iter().enumerate() {
                    let mut sorted = col.to_vec();
                    sorted.sort_by(f64::total_cmp);
                    center[j] = sorted_quantile(&sorted, 0.5);
                    let iqr = sorted_quantile(&sorted, q_high) - sorted_quantile(&sorted, q_low);
                    scale[j] = if iqr == 0.0 { 1.0 } else { iqr };
                }
                ScalerParams { center, scale }
            }
        }
    }
}

impl Transformer for Scaler {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        self.params = Some(self.compute_params(x));
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let params = self.params.as_ref().ok_or(AutoMlError::NotFitted)?;
        check_width(x, params.center.len())?;
        Ok((x - &params.center.view().insert_axis(Axis(0))) / &params.scale.view().insert_axis(Axis(0)))
    }
}
