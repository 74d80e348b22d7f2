//! Two-stage candidate pipelines
//!
//! A pipeline is an optional preprocessing block followed by a mandatory model stage.
//! [`PipelineSpec`] is the searchable description; [`Pipeline`] owns the fitted blocks.

use crate::catalog::{ModelFamily, PreprocessorKind};
use crate::error::{AutoMlError, Result};
use crate::models::{Estimator, Regressor};
use crate::optimizer::search_space::{format_params, TrialParams};
use crate::preprocessing::Preprocessor;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Model stage of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelStage {
    /// Ordinary least squares, used as the fallback estimator
    Baseline,
    Family(ModelFamily),
}

impl ModelStage {
    pub fn name(&self) -> &'static str {
        match self {
            ModelStage::Baseline => "LinearRegression",
            ModelStage::Family(f) => f.name(),
        }
    }
}

impl fmt::Display for ModelStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Searchable description of a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub preprocessor: Option<PreprocessorKind>,
    #[serde(default)]
    pub preprocessor_params: TrialParams,
    pub model: ModelStage,
    #[serde(default)]
    pub model_params: TrialParams,
}

impl PipelineSpec {
    pub fn baseline() -> Self {
        Self {
            preprocessor: None,
            preprocessor_params: TrialParams::new(),
            model: ModelStage::Baseline,
            model_params: TrialParams::new(),
        }
    }

    pub fn new(preprocessor: Option<PreprocessorKind>, model: ModelFamily) -> Self {
        Self {
            preprocessor,
            preprocessor_params: TrialParams::new(),
            model: ModelStage::Family(model),
            model_params: TrialParams::new(),
        }
    }

    pub fn with_model_params(mut self, params: TrialParams) -> Self {
        self.model_params = params;
        self
    }

    pub fn with_preprocessor_params(mut self, params: TrialParams) -> Self {
        self.preprocessor_params = params;
        self
    }

    /// Name of the preprocessing stage, `"none"` when absent
    pub fn preprocessor_name(&self) -> &'static str {
        self.preprocessor.map(|p| p.name()).unwrap_or("none")
    }

    /// Every chosen hyperparameter, prefixed by its stage
    pub fn hyperparameters(&self) -> TrialParams {
        let mut all = TrialParams::new();
        if let Some(p) = self.preprocessor {
            for (k, v) in &self.preprocessor_params {
                all.insert(format!("{}__{}", p.name(), k), v.clone());
            }
        }
        for (k, v) in &self.model_params {
            all.insert(format!("{}__{}", self.model.name(), k), v.clone());
        }
        all
    }
}

impl fmt::Display for PipelineSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = self.preprocessor {
            write!(f, "{}({}) -> ", p, format_params(&self.preprocessor_params))?;
        }
        write!(f, "{}({})", self.model, format_params(&self.model_params))
    }
}

/// A fitted (or fittable) pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    spec: PipelineSpec,
    preprocessor: Option<Preprocessor>,
    estimator: Estimator,
    seed: u64,
    fitted: bool,
}

impl Pipeline {
    pub fn new(spec: PipelineSpec, seed: u64) -> Self {
        let preprocessor = spec
            .preprocessor
            .map(|kind| Preprocessor::for_kind(kind, &spec.preprocessor_params, seed));
        let estimator = match spec.model {
            ModelStage::Baseline => Estimator::baseline(),
            ModelStage::Family(family) => Estimator::for_family(family, &spec.model_params, seed),
        };
        Self {
            spec,
            preprocessor,
            estimator,
            seed,
            fitted: false,
        }
    }

    pub fn spec(&self) -> &PipelineSpec {
        &self.spec
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    /// Human-readable description of the stages and their parameters
    pub fn describe(&self) -> String {
        self.spec.to_string()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let (xt, yt) = match self.preprocessor.as_mut() {
            Some(block) => block.fit_resample(x, y)?,
            None => (x.clone(), y.clone()),
        };
        self.estimator.fit(&xt, &yt)?;
        self.fitted = true;
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.fitted {
            return Err(AutoMlError::NotFitted);
        }
        match &self.preprocessor {
            Some(block) => self.estimator.predict(&block.transform(x)?),
            None => self.estimator.predict(x),
        }
    }

    /// Save the fitted pipeline as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if !self.fitted {
            return Err(AutoMlError::NotFitted);
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a pipeline saved by [`Pipeline::save`]
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AutoMlError::FileNotFound(path.display().to_string()));
        }
        let json = std::fs::read_to_string(path)?;
        let pipeline: Self = serde_json::from_str(&json)?;
        Ok(pipeline)
    }
}
