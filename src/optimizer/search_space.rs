//! Search space definition for hyperparameters

use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Type of parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterType {
    /// Continuous float parameter
    Float {
        low: f64,
        high: f64,
        log_scale: bool,
    },
    /// Integer parameter
    Int {
        low: i64,
        high: i64,
        log_scale: bool,
    },
    /// Categorical parameter
    Categorical {
        choices: Vec<String>,
    },
    /// Boolean parameter
    Boolean,
}

/// A single hyperparameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: ParameterType,
}

impl Parameter {
    /// Create a float parameter
    pub fn float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float { low, high, log_scale: false },
        }
    }

    /// Create a log-scale float parameter
    pub fn log_float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float { low, high, log_scale: true },
        }
    }

    /// Create an integer parameter
    pub fn int(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Int { low, high, log_scale: false },
        }
    }

    /// Create a log-scale integer parameter
    pub fn log_int(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Int { low, high, log_scale: true },
        }
    }

    /// Create a categorical parameter
    pub fn categorical(name: impl Into<String>, choices: &[&str]) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Categorical {
                choices: choices.iter().map(|c| c.to_string()).collect(),
            },
        }
    }

    /// Create a boolean parameter
    pub fn boolean(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Boolean,
        }
    }

    /// Sample a random value
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        match &self.param_type {
            ParameterType::Categorical { choices } => {
                let idx = rng.gen_range(0..choices.len());
                ParameterValue::String(choices[idx].clone())
            }
            ParameterType::Boolean => ParameterValue::Bool(rng.gen()),
            _ => self.from_unit(rng.gen::<f64>()),
        }
    }

    /// Number of categories for categorical/boolean parameters
    pub fn n_choices(&self) -> Option<usize> {
        match &self.param_type {
            ParameterType::Categorical { choices } => Some(choices.len()),
            ParameterType::Boolean => Some(2),
            _ => None,
        }
    }

    /// Index of a value among the categories of a categorical/boolean parameter
    pub fn choice_index(&self, value: &ParameterValue) -> Option<usize> {
        match (&self.param_type, value) {
            (ParameterType::Categorical { choices }, ParameterValue::String(s)) => {
                choices.iter().position(|c| c == s)
            }
            (ParameterType::Boolean, ParameterValue::Bool(b)) => Some(usize::from(*b)),
            _ => None,
        }
    }

    /// Value of the category at `idx`
    pub fn choice_at(&self, idx: usize) -> Option<ParameterValue> {
        match &self.param_type {
            ParameterType::Categorical { choices } => {
                choices.get(idx).map(|c| ParameterValue::String(c.clone()))
            }
            ParameterType::Boolean => Some(ParameterValue::Bool(idx == 1)),
            _ => None,
        }
    }

    /// Map a numeric value into [0, 1], honoring log scale
    pub fn to_unit(&self, value: &ParameterValue) -> Option<f64> {
        let (low, high, log_scale) = match &self.param_type {
            ParameterType::Float { low, high, log_scale } => (*low, *high, *log_scale),
            ParameterType::Int { low, high, log_scale } => (*low as f64, *high as f64, *log_scale),
            _ => return None,
        };
        let v = value.as_float()?;
        if high <= low {
            return Some(0.5);
        }
        let u = if log_scale {
            (v.ln() - low.ln()) / (high.ln() - low.ln())
        } else {
            (v - low) / (high - low)
        };
        Some(u.clamp(0.0, 1.0))
    }

    /// Map a point of [0, 1] back into the parameter's range
    pub fn from_unit(&self, u: f64) -> ParameterValue {
        let u = u.clamp(0.0, 1.0);
        match &self.param_type {
            ParameterType::Float { low, high, log_scale } => {
                let val = if *log_scale {
                    (u * (high.ln() - low.ln()) + low.ln()).exp()
                } else {
                    u * (high - low) + low
                };
                ParameterValue::Float(val.clamp(*low, *high))
            }
            ParameterType::Int { low, high, log_scale } => {
                let (lo, hi) = (*low as f64, *high as f64);
                let val = if *log_scale {
                    (u * ((hi + 1.0).ln() - lo.ln()) + lo.ln()).exp().floor()
                } else {
                    (u * (hi - lo + 1.0) + lo).floor()
                };
                ParameterValue::Int((val as i64).clamp(*low, *high))
            }
            ParameterType::Categorical { choices } => {
                let idx = ((u * choices.len() as f64) as usize).min(choices.len() - 1);
                ParameterValue::String(choices[idx].clone())
            }
            ParameterType::Boolean => ParameterValue::Bool(u >= 0.5),
        }
    }
}

/// Sampled parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ParameterValue {
    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as int
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(v) => Some(v.round() as i64),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            ParameterValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Float(v) => write!(f, "{:.4}", v),
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::String(v) => write!(f, "{}", v),
            ParameterValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// Search space for hyperparameter optimization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    /// Create a new empty search space
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter to the search space
    pub fn add(mut self, param: Parameter) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::float(name, low, high))
    }

    pub fn log_float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::log_float(name, low, high))
    }

    pub fn int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(Parameter::int(name, low, high))
    }

    pub fn log_int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(Parameter::log_int(name, low, high))
    }

    pub fn categorical(self, name: impl Into<String>, choices: &[&str]) -> Self {
        self.add(Parameter::categorical(name, choices))
    }

    pub fn boolean(self, name: impl Into<String>) -> Self {
        self.add(Parameter::boolean(name))
    }

    /// Get all parameters
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Look up a parameter by name
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Sample a random configuration
    pub fn sample(&self, rng: &mut impl Rng) -> TrialParams {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.sample(rng)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

/// Sampled configuration, ordered by parameter name
pub type TrialParams = BTreeMap<String, ParameterValue>;

/// Typed reads with defaults over a sampled configuration
pub trait ParamsExt {
    fn float_or(&self, name: &str, default: f64) -> f64;
    fn usize_or(&self, name: &str, default: usize) -> usize;
    fn str_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str;
    fn bool_or(&self, name: &str, default: bool) -> bool;
}

impl ParamsExt for TrialParams {
    fn float_or(&self, name: &str, default: f64) -> f64 {
        self.get(name).and_then(|v| v.as_float()).unwrap_or(default)
    }

    fn usize_or(&self, name: &str, default: usize) -> usize {
        self.get(name)
            .and_then(|v| v.as_int())
            .map(|v| v.max(0) as usize)
            .unwrap_or(default)
    }

    fn str_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).and_then(|v| v.as_string()).unwrap_or(default)
    }

    fn bool_or(&self, name: &str, default: bool) -> bool {
        self.get(name).and_then(|v| v.as_bool()).unwrap_or(default)
    }
}

/// Render a configuration as `k=v, k=v`
pub fn format_params(params: &TrialParams) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_search_space_builder() {
        let space = SearchSpace::new()
            .float("learning_rate", 0.001, 0.1)
            .int("n_estimators", 10, 1000)
            .categorical("kernel", &["rbf", "linear"])
            .boolean("with_mean");

        assert_eq!(space.len(), 4);
        assert!(space.get("kernel").is_some());
    }

    #[test]
    fn test_log_scale_sampling() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let param = Parameter::log_float("lr", 0.0001, 0.1);

        for _ in 0..100 {
            let v = param.sample(&mut rng).as_float().unwrap();
            assert!((0.0001..=0.1).contains(&v));
        }
    }

    #[test]
    fn test_int_sampling_covers_bounds() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let param = Parameter::int("depth", 2, 4);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(param.sample(&mut rng).as_int().unwrap());
        }
        assert_eq!(seen.len(), 3);
        assert!(seen.contains(&2) && seen.contains(&4));
    }

    #[test]
    fn test_unit_mapping_is_monotone() {
        let param = Parameter::log_float("alpha", 0.01, 100.0);
        let lo = param.to_unit(&ParameterValue::Float(0.1)).unwrap();
        let hi = param.to_unit(&ParameterValue::Float(10.0)).unwrap();
        assert!(lo < hi);
        let back = param.from_unit(hi).as_float().unwrap();
        assert!((back - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_params_ext_defaults() {
        let mut params = TrialParams::new();
        params.insert("alpha".to_string(), ParameterValue::Float(0.5));
        params.insert("depth".to_string(), ParameterValue::Int(3));

        assert_eq!(params.float_or("alpha", 1.0), 0.5);
        assert_eq!(params.usize_or("depth", 1), 3);
        assert_eq!(params.str_or("kernel", "rbf"), "rbf");
        assert_eq!(format_params(&params), "alpha=0.5000, depth=3");
    }
}
