//! Meta-search coordinator
//!
//! Drives one orchestration run through `Init -> Validating -> {Sequential|Concurrent}
//! -> Aggregating -> Done`. Every selected engine gets the full per-engine budget.
//! Engine runtime failures are contained in their [`EngineResult`]; configuration
//! errors abort the run.

pub mod report;

pub use report::{artifact_tree, format_table, ComparisonRow, RunSummary, SUMMARY_FILE};

use crate::catalog::Metric;
use crate::config::{RunConfig, Strategy};
use crate::engines::{Capabilities, Engine, EngineDescriptor, EngineRegistry, EngineSettings, FitOptions, FitStatus, RunInfo};
use crate::error::{AutoMlError, Result};
use crate::evaluation::{evaluate_pipeline, RegressionMetrics};
use crate::pipeline::Pipeline;
use crate::validation::validate;
use chrono::Utc;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Lifecycle of one orchestration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Init,
    Validating,
    Sequential,
    Concurrent,
    Aggregating,
    Done,
    Aborted,
}

impl RunState {
    pub fn can_transition(self, to: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, to),
            (Init, Validating)
                | (Init, Aborted)
                | (Validating, Sequential)
                | (Validating, Concurrent)
                | (Validating, Aborted)
                | (Sequential, Aggregating)
                | (Concurrent, Aggregating)
                | (Sequential, Aborted)
                | (Concurrent, Aborted)
                | (Aggregating, Done)
                | (Aggregating, Aborted)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Aborted)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Init => "init",
            RunState::Validating => "validating",
            RunState::Sequential => "sequential",
            RunState::Concurrent => "concurrent",
            RunState::Aggregating => "aggregating",
            RunState::Done => "done",
            RunState::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Outcome of one engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    Success,
    Fallback,
    Failed,
}

impl From<FitStatus> for EngineStatus {
    fn from(status: FitStatus) -> Self {
        match status {
            FitStatus::Success => EngineStatus::Success,
            FitStatus::Fallback => EngineStatus::Fallback,
        }
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStatus::Success => f.write_str("success"),
            EngineStatus::Fallback => f.write_str("fallback"),
            EngineStatus::Failed => f.write_str("failed"),
        }
    }
}

/// Result of one engine; owns the fitted engine and its model
pub struct EngineResult {
    pub name: String,
    pub priority: usize,
    pub status: EngineStatus,
    /// Evaluation score under the run metric
    pub score: Option<f64>,
    pub metrics: Option<RegressionMetrics>,
    /// Wall-clock seconds spent in `fit`
    pub duration_secs: f64,
    pub info: Option<RunInfo>,
    pub error: Option<String>,
    pub artifacts: Vec<PathBuf>,
    engine: Option<Box<dyn Engine>>,
}

impl fmt::Debug for EngineResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineResult")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("status", &self.status)
            .field("score", &self.score)
            .field("metrics", &self.metrics)
            .field("duration_secs", &self.duration_secs)
            .field("error", &self.error)
            .field("artifacts", &self.artifacts)
            .finish()
    }
}

impl EngineResult {
    pub fn completed(
        name: impl Into<String>,
        priority: usize,
        status: EngineStatus,
        score: f64,
        metrics: RegressionMetrics,
        duration_secs: f64,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            status,
            score: Some(score),
            metrics: Some(metrics),
            duration_secs,
            info: None,
            error: None,
            artifacts: Vec::new(),
            engine: None,
        }
    }

    pub fn failed(name: impl Into<String>, priority: usize, error: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            name: name.into(),
            priority,
            status: EngineStatus::Failed,
            score: None,
            metrics: None,
            duration_secs,
            info: None,
            error: Some(error.into()),
            artifacts: Vec::new(),
            engine: None,
        }
    }

    /// Attach the fitted engine, taking its run info
    pub fn with_engine(mut self, engine: Box<dyn Engine>) -> Self {
        self.info = engine.run_info().ok();
        self.engine = Some(engine);
        self
    }

    pub fn is_viable(&self) -> bool {
        self.status != EngineStatus::Failed && self.score.map_or(false, f64::is_finite)
    }

    /// Fitted pipeline; `None` for failed engines
    pub fn model(&self) -> Option<&Pipeline> {
        if self.status == EngineStatus::Failed {
            return None;
        }
        self.engine.as_ref()?.fitted_pipeline().ok()
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.model().ok_or(AutoMlError::NotFitted)?.predict(x)
    }

    fn export(&mut self, dir: &Path) -> Result<Vec<PathBuf>> {
        let engine = self.engine.as_mut().ok_or(AutoMlError::NotFitted)?;
        let artifacts = engine.export(dir)?;
        self.info = engine.run_info().ok();
        self.artifacts = artifacts.clone();
        Ok(artifacts)
    }
}

/// Index of the best viable result
///
/// Results are scanned in registry priority order and a later one only wins with a
/// strictly better score, so ties go to the higher-priority engine.
pub fn select_champion(results: &[EngineResult], metric: Metric) -> Option<usize> {
    let mut order: Vec<usize> = (0..results.len()).collect();
    order.sort_by_key(|&i| results[i].priority);

    let mut best: Option<(usize, f64)> = None;
    for i in order {
        let result = &results[i];
        let score = match result.score {
            Some(s) if result.is_viable() => s,
            _ => continue,
        };
        match best {
            Some((_, best_score)) if !metric.is_better(score, best_score) => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

/// The winning result and the comparison table it was chosen from
#[derive(Debug)]
pub struct ChampionSelection<'a> {
    pub result: &'a EngineResult,
    pub table: Vec<ComparisonRow>,
}

impl ChampionSelection<'_> {
    pub fn model(&self) -> Option<&Pipeline> {
        self.result.model()
    }
}

/// Everything a finished run produced
#[derive(Debug)]
pub struct RunReport {
    pub metric: Metric,
    pub strategy: Strategy,
    /// One result per attempted engine, in priority order
    pub results: Vec<EngineResult>,
    pub transitions: Vec<(RunState, RunState)>,
    pub run_dir: PathBuf,
    pub summary_path: Option<PathBuf>,
}

impl RunReport {
    /// Recomputed on every call by scanning the results
    pub fn champion(&self) -> Option<ChampionSelection<'_>> {
        let idx = select_champion(&self.results, self.metric)?;
        Some(ChampionSelection {
            result: &self.results[idx],
            table: self.comparison_table(),
        })
    }

    /// Every attempted engine, champion flagged
    pub fn comparison_table(&self) -> Vec<ComparisonRow> {
        let champion = select_champion(&self.results, self.metric);
        self.results
            .iter()
            .enumerate()
            .map(|(i, r)| ComparisonRow::from_result(r, Some(i) == champion))
            .collect()
    }

    pub fn result(&self, name: &str) -> Option<&EngineResult> {
        self.results.iter().find(|r| r.name == name)
    }
}

/// Read-only inputs shared by every engine of a run
struct EngineJob<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    options: &'a FitOptions,
    seed: u64,
    budget: Duration,
    run_dir: &'a Path,
    capabilities: &'a Capabilities,
}

/// Errors that abort the run instead of failing one engine
fn escalates(err: &AutoMlError) -> bool {
    matches!(err, AutoMlError::UnknownNames { .. } | AutoMlError::Configuration(_))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn run_engine(job: &EngineJob<'_>, descriptor: &EngineDescriptor) -> Result<EngineResult> {
    let name = descriptor.name.as_str();
    let settings = EngineSettings::new(job.seed, job.budget, job.run_dir.join(name), job.capabilities.clone());
    let mut engine = match descriptor.build(settings) {
        Ok(engine) => engine,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            tracing::error!(engine = %name, error = %e, "engine construction failed");
            return Ok(EngineResult::failed(name, descriptor.priority, e.to_string(), 0.0));
        }
    };

    tracing::info!(engine = %name, budget_secs = job.budget.as_secs_f64(), "engine started");
    let started = Instant::now();
    let outcome = catch_unwind(AssertUnwindSafe(|| engine.fit(job.x, job.y, job.options)));
    let duration = started.elapsed().as_secs_f64();

    let status = match outcome {
        Ok(Ok(status)) => status,
        Ok(Err(e)) if escalates(&e) => return Err(e),
        Ok(Err(e)) => {
            tracing::error!(engine = %name, error = %e, "engine failed");
            return Ok(EngineResult::failed(name, descriptor.priority, e.to_string(), duration));
        }
        Err(payload) => {
            let msg = format!("panicked: {}", panic_message(payload.as_ref()));
            tracing::error!(engine = %name, error = %msg, "engine failed");
            return Ok(EngineResult::failed(name, descriptor.priority, msg, duration));
        }
    };

    // Scoring counts against the same budget as the fit
    let remaining = job.budget.saturating_sub(started.elapsed());
    let evaluation = engine
        .fitted_pipeline()
        .and_then(|p| evaluate_pipeline(p.spec(), job.x, job.y, job.options.metric, job.seed, remaining));
    match evaluation {
        Ok(eval) if eval.score.is_finite() && eval.metrics.is_finite() => {
            tracing::info!(
                engine = %name,
                status = %EngineStatus::from(status),
                score = eval.score,
                duration_secs = duration,
                "engine finished"
            );
            Ok(EngineResult::completed(name, descriptor.priority, status.into(), eval.score, eval.metrics, duration)
                .with_engine(engine))
        }
        Ok(eval) => {
            let msg = format!("evaluation produced a non-finite score ({})", eval.score);
            tracing::error!(engine = %name, error = %msg, "engine failed");
            Ok(EngineResult::failed(name, descriptor.priority, msg, duration))
        }
        Err(e) => {
            tracing::error!(engine = %name, error = %e, "evaluation failed");
            Ok(EngineResult::failed(name, descriptor.priority, format!("evaluation failed: {}", e), duration))
        }
    }
}

/// Runs the selected engines and picks the champion
pub struct Coordinator {
    config: RunConfig,
    registry: EngineRegistry,
    capabilities: Capabilities,
    state: RunState,
    transitions: Vec<(RunState, RunState)>,
}

impl Coordinator {
    pub fn new(config: RunConfig, registry: EngineRegistry, capabilities: Capabilities) -> Self {
        Self {
            config,
            registry,
            capabilities,
            state: RunState::Init,
            transitions: Vec::new(),
        }
    }

    /// Probe capabilities once and discover the available engines
    pub fn from_environment(config: RunConfig) -> Result<Self> {
        let capabilities = Capabilities::probe()?;
        let registry = EngineRegistry::discover(&capabilities);
        Ok(Self::new(config, registry, capabilities))
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn transitions(&self) -> &[(RunState, RunState)] {
        &self.transitions
    }

    fn transition(&mut self, to: RunState) -> Result<()> {
        if !self.state.can_transition(to) {
            return Err(AutoMlError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        tracing::debug!(from = %self.state, to = %to, "run state");
        self.transitions.push((self.state, to));
        self.state = to;
        Ok(())
    }

    fn abort(&mut self, err: AutoMlError) -> AutoMlError {
        if self.state.can_transition(RunState::Aborted) {
            self.transitions.push((self.state, RunState::Aborted));
            self.state = RunState::Aborted;
        }
        tracing::error!(error = %err, "run aborted");
        err
    }

    /// Validate, run every selected engine, aggregate and export
    pub fn run(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<RunReport> {
        if self.state != RunState::Init {
            return Err(AutoMlError::InvalidTransition {
                from: self.state.to_string(),
                to: RunState::Validating.to_string(),
            });
        }
        if self.registry.is_empty() && self.config.require_engine {
            return Err(self.abort(AutoMlError::NoViableEngine { attempted: 0 }));
        }
        let started_at = Utc::now();

        self.transition(RunState::Validating)?;
        let (descriptors, options) = match self.validate(x, y) {
            Ok(v) => v,
            Err(e) => return Err(self.abort(e)),
        };
        let run_dir = self.config.resolve_run_dir();
        let strategy = self.config.strategy;

        self.transition(match strategy {
            Strategy::Sequential => RunState::Sequential,
            Strategy::Concurrent => RunState::Concurrent,
        })?;
        tracing::info!(
            engines = descriptors.len(),
            strategy = %strategy,
            metric = %options.metric,
            run_dir = %run_dir.display(),
            "run started"
        );

        let job = EngineJob {
            x,
            y,
            options: &options,
            seed: self.config.seed,
            budget: self.config.time_budget(),
            run_dir: &run_dir,
            capabilities: &self.capabilities,
        };
        let executed = match strategy {
            Strategy::Sequential => run_sequential(&job, &descriptors),
            Strategy::Concurrent => run_concurrent(&job, &descriptors),
        };
        let mut results = match executed {
            Ok(results) => results,
            Err(e) => return Err(self.abort(e)),
        };
        results.sort_by_key(|r| r.priority);

        self.transition(RunState::Aggregating)?;
        let champion = select_champion(&results, options.metric);
        if !results.is_empty() && champion.is_none() {
            return Err(self.abort(AutoMlError::NoViableEngine { attempted: results.len() }));
        }

        for result in results.iter_mut().filter(|r| r.status != EngineStatus::Failed) {
            let dir = run_dir.join(&result.name);
            if let Err(e) = result.export(&dir) {
                tracing::warn!(engine = %result.name, error = %e, "export failed");
                result.error = Some(format!("export failed: {}", e));
            }
        }

        let mut report = RunReport {
            metric: options.metric,
            strategy,
            results,
            transitions: Vec::new(),
            run_dir,
            summary_path: None,
        };
        let summary = RunSummary {
            metric: report.metric,
            strategy,
            started_at,
            finished_at: Utc::now(),
            run_dir: report.run_dir.clone(),
            champion: champion.map(|i| report.results[i].name.clone()),
            comparison: report.comparison_table(),
            transitions: self.transitions.clone(),
        };
        match summary.write(&report.run_dir) {
            Ok(path) => report.summary_path = Some(path),
            Err(e) => return Err(self.abort(e)),
        }

        self.transition(RunState::Done)?;
        if let Some(selection) = report.champion() {
            tracing::info!(
                engine = %selection.result.name,
                score = selection.result.score.unwrap_or(f64::NAN),
                "champion selected"
            );
        }
        report.transitions = self.transitions.clone();
        Ok(report)
    }

    fn validate(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(Vec<EngineDescriptor>, FitOptions)> {
        let space = validate(&self.config.models, &self.config.preprocessors, &self.config.metric)?;
        let descriptors: Vec<EngineDescriptor> = self.registry.select(&self.config.engines)?.into_iter().cloned().collect();

        if self.config.time_budget().is_zero() {
            return Err(AutoMlError::Configuration("time budget must be positive".to_string()));
        }
        if x.nrows() != y.len() {
            return Err(AutoMlError::ShapeError {
                expected: format!("{} target values", x.nrows()),
                actual: format!("{} target values", y.len()),
            });
        }
        if x.nrows() < 3 || x.ncols() == 0 {
            return Err(AutoMlError::DataError(format!(
                "need at least 3 rows and 1 feature, got {}x{}",
                x.nrows(),
                x.ncols()
            )));
        }
        if descriptors.is_empty() && self.config.require_engine {
            return Err(AutoMlError::NoViableEngine { attempted: 0 });
        }

        let mut options = FitOptions::default()
            .with_metric(space.metric)
            .with_models(space.models)
            .with_preprocessors(space.preprocessors)
            .with_cv_folds(self.config.cv_folds);
        if let Some(n) = self.config.max_trials {
            options = options.with_max_trials(n);
        }
        Ok((descriptors, options))
    }
}

fn run_sequential(job: &EngineJob<'_>, descriptors: &[EngineDescriptor]) -> Result<Vec<EngineResult>> {
    descriptors.iter().map(|d| run_engine(job, d)).collect()
}

/// One pool thread per engine; results are joined before aggregation
fn run_concurrent(job: &EngineJob<'_>, descriptors: &[EngineDescriptor]) -> Result<Vec<EngineResult>> {
    if descriptors.is_empty() {
        return Ok(Vec::new());
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(descriptors.len())
        .thread_name(|i| format!("engine-{}", i))
        .build()
        .map_err(|e| AutoMlError::Configuration(format!("thread pool error: {}", e)))?;
    let outcomes: Vec<Result<EngineResult>> = pool.install(|| descriptors.par_iter().map(|d| run_engine(job, d)).collect());
    outcomes.into_iter().collect()
}
