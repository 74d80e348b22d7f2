//! Engine adapters
//!
//! Every search backend is wrapped behind the [`Engine`] contract: fit within a time budget,
//! predict with the refit best pipeline, export artifacts, report run info. The
//! [`registry`] lists which engines can run on this build, in canonical priority order.

pub mod capabilities;
pub mod registry;
mod search_engine;

pub use capabilities::{Capabilities, DISABLED_ENGINES_ENV};
pub use registry::{discover_available, EngineConstructor, EngineDescriptor, EngineRegistry};
pub use search_engine::SearchEngine;

use crate::catalog::{Metric, ModelFamily, PreprocessorKind};
use crate::error::{AutoMlError, Result};
use crate::optimizer::search_space::TrialParams;
use crate::pipeline::Pipeline;
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Built-in engines in canonical priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Tree-structured Parzen Estimator search
    Tpe,
    /// Evolutionary pipeline search
    Genetic,
    /// Successive halving over training-row fractions
    Halving,
}

impl EngineKind {
    pub const ALL: [EngineKind; 3] = [EngineKind::Tpe, EngineKind::Genetic, EngineKind::Halving];

    pub fn id(&self) -> &'static str {
        match self {
            EngineKind::Tpe => "tpe",
            EngineKind::Genetic => "genetic",
            EngineKind::Halving => "halving",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.id() == id)
    }

    /// Rank in the canonical order, 0 is highest
    pub fn priority(&self) -> usize {
        Self::ALL.iter().position(|k| k == self).unwrap_or(usize::MAX)
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for EngineKind {
    type Err = AutoMlError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_id(s).ok_or_else(|| AutoMlError::UnknownNames {
            kind: "engine",
            names: vec![s.to_string()],
        })
    }
}

/// Construction-time settings of an adapter
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub seed: u64,
    pub time_budget: Duration,
    /// Directory the engine exports into
    pub run_dir: PathBuf,
    pub capabilities: Capabilities,
}

impl EngineSettings {
    pub fn new(seed: u64, time_budget: Duration, run_dir: impl Into<PathBuf>, capabilities: Capabilities) -> Self {
        Self {
            seed,
            time_budget,
            run_dir: run_dir.into(),
            capabilities,
        }
    }
}

/// Options passed to [`Engine::fit`]
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub metric: Metric,
    pub models: Vec<ModelFamily>,
    /// Preprocessing choices; `None` is "no preprocessing"
    pub preprocessors: Vec<Option<PreprocessorKind>>,
    /// Shuffled k-fold splits per trial (at least 3)
    pub cv_folds: usize,
    pub max_trials: Option<usize>,
}

impl Default for FitOptions {
    fn default() -> Self {
        let mut preprocessors = vec![None];
        preprocessors.extend(PreprocessorKind::ALL.iter().copied().map(Some));
        Self {
            metric: Metric::R2,
            models: ModelFamily::ALL.to_vec(),
            preprocessors,
            cv_folds: 3,
            max_trials: None,
        }
    }
}

impl FitOptions {
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_models(mut self, models: Vec<ModelFamily>) -> Self {
        self.models = models;
        self
    }

    pub fn with_preprocessors(mut self, preprocessors: Vec<Option<PreprocessorKind>>) -> Self {
        self.preprocessors = preprocessors;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_max_trials(mut self, n: usize) -> Self {
        self.max_trials = Some(n);
        self
    }
}

/// How a successful fit was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitStatus {
    /// The backend searched and the best pipeline was refit
    Success,
    /// The backend was unavailable; an OLS baseline was fit instead
    Fallback,
}

/// Descriptive info of a fitted engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInfo {
    pub engine: String,
    pub status: FitStatus,
    pub metric: Metric,
    /// Best cross-validated trial score, or the training score of a fallback
    pub best_score: f64,
    pub best_pipeline: String,
    pub hyperparameters: TrialParams,
    pub n_trials: usize,
    pub n_failed_trials: usize,
    pub search_duration_secs: f64,
    pub started_at: DateTime<Utc>,
    pub artifacts: Vec<PathBuf>,
}

/// Uniform adapter contract over a search backend
pub trait Engine: Send {
    /// Identity string, also the export subdirectory name
    fn name(&self) -> &str;

    /// Search within the time budget, then refit the best pipeline on all rows
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, options: &FitOptions) -> Result<FitStatus>;

    /// Predict with the fitted pipeline; `NotFitted` before `fit`
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Persist the fitted pipeline and trial history under `dir`
    fn export(&mut self, dir: &Path) -> Result<Vec<PathBuf>>;

    fn run_info(&self) -> Result<RunInfo>;

    fn fitted_pipeline(&self) -> Result<&Pipeline>;
}

/// Reload a pipeline exported by an engine
pub fn load_model(dir: &Path) -> Result<Pipeline> {
    Pipeline::load(&dir.join(search_engine::MODEL_FILE))
}
