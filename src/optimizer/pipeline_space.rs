//! Conditional search space over two-stage pipelines
//!
//! The model family and preprocessing stage are categorical choices; each choice then
//! owns its own hyperparameter catalog.

use crate::catalog::{ModelFamily, PreprocessorKind};
use crate::error::{AutoMlError, Result};
use crate::pipeline::{ModelStage, PipelineSpec};
use rand::prelude::*;

/// Permitted model families and preprocessing stages (`None` is "no preprocessing")
#[derive(Debug, Clone)]
pub struct PipelineSpace {
    models: Vec<ModelFamily>,
    preprocessors: Vec<Option<PreprocessorKind>>,
}

impl PipelineSpace {
    pub fn new(models: Vec<ModelFamily>, preprocessors: Vec<Option<PreprocessorKind>>) -> Result<Self> {
        if models.is_empty() {
            return Err(AutoMlError::Configuration("search space has no model families".to_string()));
        }
        if preprocessors.is_empty() {
            return Err(AutoMlError::Configuration(
                "search space has no preprocessing choices".to_string(),
            ));
        }
        Ok(Self { models, preprocessors })
    }

    /// Every family, every preprocessor plus "none"
    pub fn full() -> Self {
        let mut preprocessors = vec![None];
        preprocessors.extend(PreprocessorKind::ALL.iter().copied().map(Some));
        Self {
            models: ModelFamily::ALL.to_vec(),
            preprocessors,
        }
    }

    pub fn models(&self) -> &[ModelFamily] {
        &self.models
    }

    pub fn preprocessors(&self) -> &[Option<PreprocessorKind>] {
        &self.preprocessors
    }

    /// Draw a pipeline uniformly over stages and their hyperparameters
    pub fn sample(&self, rng: &mut impl Rng) -> PipelineSpec {
        let model = self.models[rng.gen_range(0..self.models.len())];
        let preprocessor = self.preprocessors[rng.gen_range(0..self.preprocessors.len())];
        self.sample_with(preprocessor, model, rng)
    }

    /// Draw hyperparameters for fixed stages
    pub fn sample_with(
        &self,
        preprocessor: Option<PreprocessorKind>,
        model: ModelFamily,
        rng: &mut impl Rng,
    ) -> PipelineSpec {
        let preprocessor_params = preprocessor
            .map(|p| p.search_space().sample(rng))
            .unwrap_or_default();
        PipelineSpec::new(preprocessor, model)
            .with_preprocessor_params(preprocessor_params)
            .with_model_params(model.search_space().sample(rng))
    }

    /// Whether `spec` only uses stages permitted here
    pub fn contains(&self, spec: &PipelineSpec) -> bool {
        let model_ok = match spec.model {
            ModelStage::Family(f) => self.models.contains(&f),
            ModelStage::Baseline => false,
        };
        model_ok && self.preprocessors.contains(&spec.preprocessor)
    }
}
