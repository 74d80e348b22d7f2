//! Adapter over the built-in search backends

use super::{Capabilities, Engine, EngineKind, EngineSettings, FitOptions, FitStatus, RunInfo};
use crate::error::{AutoMlError, Result};
use crate::evaluation::{cross_val_score, CrossValidator};
use crate::optimizer::{PipelineSpace, SearchBackend, SearchConfig, Study};
use crate::pipeline::{Pipeline, PipelineSpec};
use chrono::Utc;
use ndarray::{Array1, Array2};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub(crate) const MODEL_FILE: &str = "model.json";
pub(crate) const RUN_INFO_FILE: &str = "run_info.json";
pub(crate) const TRIALS_FILE: &str = "trials.csv";

/// Share of the engine budget given to the search; the rest covers the final refit
const SEARCH_SHARE: f64 = 0.8;

/// Backend of `kind`, or `MissingDependency` when it is absent from this build or masked
fn backend_for(kind: EngineKind, caps: &Capabilities) -> Result<Box<dyn SearchBackend>> {
    if !caps.is_available(kind) {
        return Err(AutoMlError::MissingDependency {
            engine: kind.id().to_string(),
        });
    }
    match kind {
        #[cfg(feature = "engine-tpe")]
        EngineKind::Tpe => Ok(Box::new(crate::optimizer::tpe::TpeSearch::new())),
        #[cfg(feature = "engine-genetic")]
        EngineKind::Genetic => Ok(Box::new(crate::optimizer::genetic::GeneticSearch::new())),
        #[cfg(feature = "engine-halving")]
        EngineKind::Halving => Ok(Box::new(crate::optimizer::halving::SuccessiveHalving::new())),
        #[allow(unreachable_patterns)]
        _ => Err(AutoMlError::MissingDependency {
            engine: kind.id().to_string(),
        }),
    }
}

/// Engine adapter shared by every built-in backend
pub struct SearchEngine {
    kind: EngineKind,
    settings: EngineSettings,
    pipeline: Option<Pipeline>,
    study: Option<Study>,
    info: Option<RunInfo>,
}

impl SearchEngine {
    /// A zero time budget is a configuration error
    pub fn new(kind: EngineKind, settings: EngineSettings) -> Result<Self> {
        if settings.time_budget.is_zero() {
            return Err(AutoMlError::Configuration(format!(
                "engine '{}' needs a positive time budget",
                kind
            )));
        }
        Ok(Self {
            kind,
            settings,
            pipeline: None,
            study: None,
            info: None,
        })
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    /// Trial history of the last fit; `None` after a fallback
    pub fn study(&self) -> Option<&Study> {
        self.study.as_ref()
    }

    fn fit_fallback(&mut self, x: &Array2<f64>, y: &Array1<f64>, options: &FitOptions, started: Instant) -> Result<FitStatus> {
        let mut pipeline = Pipeline::new(PipelineSpec::baseline(), self.settings.seed);
        pipeline.fit(x, y)?;
        let score = options.metric.score(y, &pipeline.predict(x)?);

        self.info = Some(RunInfo {
            engine: self.kind.id().to_string(),
            status: FitStatus::Fallback,
            metric: options.metric,
            best_score: score,
            best_pipeline: pipeline.describe(),
            hyperparameters: pipeline.spec().hyperparameters(),
            n_trials: 0,
            n_failed_trials: 0,
            search_duration_secs: started.elapsed().as_secs_f64(),
            started_at: Utc::now(),
            artifacts: Vec::new(),
        });
        self.pipeline = Some(pipeline);
        self.study = None;
        Ok(FitStatus::Fallback)
    }

    fn fit_search(
        &mut self,
        mut backend: Box<dyn SearchBackend>,
        x: &Array2<f64>,
        y: &Array1<f64>,
        options: &FitOptions,
    ) -> Result<FitStatus> {
        let started_at = Utc::now();
        let seed = self.settings.seed;
        let space = PipelineSpace::new(options.models.clone(), options.preprocessors.clone())?;
        let config = SearchConfig::new()
            .with_time_budget(self.settings.time_budget.mul_f64(SEARCH_SHARE))
            .with_direction(options.metric.direction())
            .with_random_state(seed)
            .with_cv_folds(options.cv_folds.max(3));
        let config = match options.max_trials {
            Some(n) => config.with_max_trials(n),
            None => config,
        };

        let n = x.nrows();
        let splits = CrossValidator::k_fold(config.cv_folds, n, seed).split(n)?;
        let metric = options.metric;
        let objective = |spec: &PipelineSpec, resource: f64| cross_val_score(spec, x, y, metric, &splits, resource, seed);

        let study = backend.run(&space, &config, &objective)?;
        let (best_spec, best_score) = match (study.best_spec(), study.best_score()) {
            (Some(spec), Some(score)) => (spec.clone(), score),
            _ => {
                return Err(AutoMlError::EngineFailure {
                    engine: self.kind.id().to_string(),
                    reason: format!("none of {} trials completed", study.n_trials()),
                })
            }
        };

        // Trial-time CV only ranks candidates; the exported model sees every row
        let mut pipeline = Pipeline::new(best_spec, seed);
        pipeline.fit(x, y)?;

        tracing::info!(
            engine = %self.kind,
            trials = study.n_trials(),
            failed = study.n_failed(),
            score = best_score,
            pipeline = %pipeline.describe(),
            "search finished"
        );

        self.info = Some(RunInfo {
            engine: self.kind.id().to_string(),
            status: FitStatus::Success,
            metric,
            best_score,
            best_pipeline: pipeline.describe(),
            hyperparameters: pipeline.spec().hyperparameters(),
            n_trials: study.n_trials(),
            n_failed_trials: study.n_failed(),
            search_duration_secs: study.total_duration_secs,
            started_at,
            artifacts: Vec::new(),
        });
        self.pipeline = Some(pipeline);
        self.study = Some(study);
        Ok(FitStatus::Success)
    }
}

impl Engine for SearchEngine {
    fn name(&self) -> &str {
        self.kind.id()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, options: &FitOptions) -> Result<FitStatus> {
        let started = Instant::now();
        match backend_for(self.kind, &self.settings.capabilities) {
            Ok(backend) => self.fit_search(backend, x, y, options),
            Err(AutoMlError::MissingDependency { engine }) => {
                tracing::warn!(engine = %engine, "backend unavailable, fitting OLS baseline instead");
                self.fit_fallback(x, y, options, started)
            }
            Err(e) => Err(e),
        }
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted_pipeline()?.predict(x)
    }

    fn export(&mut self, dir: &Path) -> Result<Vec<PathBuf>> {
        let pipeline = self.pipeline.as_ref().ok_or(AutoMlError::NotFitted)?;
        std::fs::create_dir_all(dir)?;

        let mut artifacts = vec![dir.join(MODEL_FILE)];
        pipeline.save(&artifacts[0])?;

        if let Some(study) = self.study.as_ref().filter(|s| s.n_trials() > 0) {
            let path = dir.join(TRIALS_FILE);
            study.write_csv(&path)?;
            artifacts.push(path);
        }
        artifacts.push(dir.join(RUN_INFO_FILE));

        let info = self.info.as_mut().ok_or(AutoMlError::NotFitted)?;
        info.artifacts = artifacts.clone();
        std::fs::write(dir.join(RUN_INFO_FILE), serde_json::to_string_pretty(info)?)?;

        tracing::debug!(engine = %self.kind, dir = %dir.display(), "artifacts exported");
        Ok(artifacts)
    }

    fn run_info(&self) -> Result<RunInfo> {
        self.info.clone().ok_or(AutoMlError::NotFitted)
    }

    fn fitted_pipeline(&self) -> Result<&Pipeline> {
        self.pipeline.as_ref().ok_or(AutoMlError::NotFitted)
    }
}
