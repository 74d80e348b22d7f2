//! Multi-layer perceptron regressor trained with full-batch Adam

use super::{check_fit_input, check_predict_input, Regressor};
use crate::error::{AutoMlError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Activation {
    Relu,
    Tanh,
}

impl Activation {
    pub fn from_name(name: &str) -> Self {
        match name {
            "tanh" => Activation::Tanh,
            _ => Activation::Relu,
        }
    }

    fn apply(&self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Relu => z.mapv(|v| v.max(0.0)),
            Activation::Tanh => z.mapv(f64::tanh),
        }
    }

    /// Derivative expressed through the activation output
    fn derivative(&self, a: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Relu => a.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Tanh => a.mapv(|v| 1.0 - v * v),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Layer {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MlpState {
    layers: Vec<Layer>,
    x_mean: Array1<f64>,
    x_scale: Array1<f64>,
    y_mean: f64,
    y_scale: f64,
}

struct Adam {
    m: Vec<(Array2<f64>, Array1<f64>)>,
    v: Vec<(Array2<f64>, Array1<f64>)>,
    t: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpRegressor {
    pub hidden_units: usize,
    pub n_layers: usize,
    pub activation: Activation,
    pub learning_rate: f64,
    /// L2 penalty on weights
    pub alpha: f64,
    pub max_iter: usize,
    pub random_state: u64,
    state: Option<MlpState>,
}

impl MlpRegressor {
    pub fn new(hidden_units: usize, n_layers: usize, activation: Activation, seed: u64) -> Self {
        Self {
            hidden_units: hidden_units.max(1),
            n_layers: n_layers.max(1),
            activation,
            learning_rate: 1e-3,
            alpha: 1e-4,
            max_iter: 200,
            random_state: seed,
            state: None,
        }
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter.max(1);
        self
    }

    fn forward(&self, layers: &[Layer], x: &Array2<f64>) -> Vec<Array2<f64>> {
        let mut activations = vec![x.clone()];
        for (i, layer) in layers.iter().enumerate() {
            let z = activations[i].dot(&layer.weights) + &layer.bias;
            let a = if i + 1 < layers.len() { self.activation.apply(&z) } else { z };
            activations.push(a);
        }
        activations
    }
}

impl Regressor for MlpRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let (n, p) = x.dim();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.random_state);

        let x_mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(p));
        let x_scale = x.std_axis(Axis(0), 0.0).mapv(|s| if s > 1e-12 { s } else { 1.0 });
        let y_mean = y.mean().unwrap_or(0.0);
        let y_scale = {
            let s = y.std(0.0);
            if s > 1e-12 { s } else { 1.0 }
        };
        let xs = (x - &x_mean.clone().insert_axis(Axis(0))) / &x_scale.clone().insert_axis(Axis(0));
        let ys = ((y - y_mean) / y_scale).insert_axis(Axis(1));

        let mut sizes = vec![p];
        sizes.extend(std::iter::repeat(self.hidden_units).take(self.n_layers));
        sizes.push(1);

        let mut layers: Vec<Layer> = sizes
            .windows(2)
            .map(|w| {
                let bound = (6.0 / (w[0] + w[1]) as f64).sqrt();
                Layer {
                    weights: Array2::from_shape_fn((w[0], w[1]), |_| rng.gen_range(-bound..bound)),
                    bias: Array1::zeros(w[1]),
                }
            })
            .collect();

        let mut adam = Adam {
            m: layers.iter().map(|l| (Array2::zeros(l.weights.dim()), Array1::zeros(l.bias.len()))).collect(),
            v: layers.iter().map(|l| (Array2::zeros(l.weights.dim()), Array1::zeros(l.bias.len()))).collect(),
            t: 0,
        };
        let (beta1, beta2, eps): (f64, f64, f64) = (0.9, 0.999, 1e-8);

        for _ in 0..self.max_iter {
            let acts = self.forward(&layers, &xs);
            let out = &acts[acts.len() - 1];
            let mut delta = (out - &ys) / n as f64;

            adam.t += 1;
            let bc1 = 1.0 - beta1.powi(adam.t);
            let bc2 = 1.0 - beta2.powi(adam.t);

            for i in (0..layers.len()).rev() {
                let grad_w = acts[i].t().dot(&delta) + &(&layers[i].weights * self.alpha);
                let grad_b = delta.sum_axis(Axis(0));

                let next_delta = if i > 0 {
                    Some(delta.dot(&layers[i].weights.t()) * self.activation.derivative(&acts[i]))
                } else {
                    None
                };

                let (mw, mb) = &mut adam.m[i];
                let (vw, vb) = &mut adam.v[i];
                *mw = &*mw * beta1 + &(&grad_w * (1.0 - beta1));
                *mb = &*mb * beta1 + &(&grad_b * (1.0 - beta1));
                *vw = &*vw * beta2 + &(grad_w.mapv(|g| g * g) * (1.0 - beta2));
                *vb = &*vb * beta2 + &(grad_b.mapv(|g| g * g) * (1.0 - beta2));

                let lr = self.learning_rate;
                ndarray::Zip::from(&mut layers[i].weights)
                    .and(&*mw)
                    .and(&*vw)
                    .for_each(|w, &m, &v| *w -= lr * (m / bc1) / ((v / bc2).sqrt() + eps));
                ndarray::Zip::from(&mut layers[i].bias)
                    .and(&*mb)
                    .and(&*vb)
                    .for_each(|b, &m, &v| *b -= lr * (m / bc1) / ((v / bc2).sqrt() + eps));

                if let Some(d) = next_delta {
                    delta = d;
                }
            }
        }

        let diverged = layers
            .iter()
            .any(|l| !l.weights.iter().chain(l.bias.iter()).all(|v| v.is_finite()));
        if diverged {
            return Err(AutoMlError::TrainingError("MLP weights diverged".to_string()));
        }

        self.state = Some(MlpState {
            layers,
            x_mean,
            x_scale,
            y_mean,
            y_scale,
        });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let state = self.state.as_ref().ok_or(AutoMlError::NotFitted)?;
        check_predict_input(x, state.x_mean.len())?;

        let xs = (x - &state.x_mean.clone().insert_axis(Axis(0))) / &state.x_scale.clone().insert_axis(Axis(0));
        let acts = self.forward(&state.layers, &xs);
        let out = acts[acts.len() - 1].column(0).to_owned();
        Ok(out * state.y_scale + state.y_mean)
    }

    fn is_fitted(&self) -> bool {
        self.state.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::metrics::r2_score;

    #[test]
    fn test_mlp_learns_linear_map() {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| ((i * (j + 2)) % 11) as f64);
        let y = Array1::from_shape_fn(40, |i| x[[i, 0]] - 0.5 * x[[i, 1]]);
        let mut model = MlpRegressor::new(16, 1, Activation::Tanh, 0)
            .with_learning_rate(1e-2)
            .with_max_iter(300);
        model.fit(&x, &y).unwrap();
        assert!(r2_score(&y, &model.predict(&x).unwrap()) > 0.6);
    }

    #[test]
    fn test_two_hidden_layers() {
        let x = Array2::from_shape_fn((20, 3), |(i, j)| (i + j) as f64);
        let y = Array1::from_shape_fn(20, |i| i as f64);
        let mut model = MlpRegressor::new(8, 2, Activation::Relu, 1).with_max_iter(50);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap().len(), 20);
    }
}
