//! Run configuration

use crate::catalog::{Metric, ModelFamily, PreprocessorKind};
use crate::error::{AutoMlError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How the coordinator schedules engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// One engine after another, each with its full budget
    #[default]
    Sequential,
    /// One worker per engine, joined before aggregation
    Concurrent,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Sequential => f.write_str("sequential"),
            Strategy::Concurrent => f.write_str("concurrent"),
        }
    }
}

/// Configuration of one orchestration run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Engine ids to run, or `["all"]`
    pub engines: Vec<String>,

    /// Wall-clock budget given to each engine
    pub time_budget_secs: f64,

    /// Metric name used for search and champion selection
    pub metric: String,

    /// Permitted model families
    pub models: Vec<String>,

    /// Permitted preprocessing steps; "no preprocessing" is always a candidate
    pub preprocessors: Vec<String>,

    /// Random seed shared by every engine
    pub seed: u64,

    pub strategy: Strategy,

    /// Parent directory of the timestamped run directory
    pub output_dir: PathBuf,

    /// Exact run directory; overrides the timestamped one
    pub run_dir: Option<PathBuf>,

    /// Folds used to score trials inside each engine
    pub cv_folds: usize,

    /// Trial cap per engine on top of the time budget
    pub max_trials: Option<usize>,

    /// Abort when no engine is available
    pub require_engine: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            engines: vec!["all".to_string()],
            time_budget_secs: 60.0,
            metric: Metric::default().name().to_string(),
            models: ModelFamily::ALL.iter().map(|m| m.name().to_string()).collect(),
            preprocessors: PreprocessorKind::ALL.iter().map(|p| p.name().to_string()).collect(),
            seed: 42,
            strategy: Strategy::Sequential,
            output_dir: PathBuf::from("automl_runs"),
            run_dir: None,
            cv_folds: 3,
            max_trials: None,
            require_engine: true,
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON config; missing keys keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AutoMlError::FileNotFound(path.display().to_string()));
        }
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        Ok(config)
    }

    pub fn time_budget(&self) -> Duration {
        Duration::try_from_secs_f64(self.time_budget_secs).unwrap_or(Duration::ZERO)
    }

    pub fn with_engines<S: AsRef<str>>(mut self, engines: &[S]) -> Self {
        self.engines = engines.iter().map(|e| e.as_ref().to_string()).collect();
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget_secs = budget.as_secs_f64();
        self
    }

    pub fn with_metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = metric.into();
        self
    }

    pub fn with_models<S: AsRef<str>>(mut self, models: &[S]) -> Self {
        self.models = models.iter().map(|m| m.as_ref().to_string()).collect();
        self
    }

    pub fn with_preprocessors<S: AsRef<str>>(mut self, preprocessors: &[S]) -> Self {
        self.preprocessors = preprocessors.iter().map(|p| p.as_ref().to_string()).collect();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_run_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.run_dir = Some(dir.into());
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

    pub fn with_require_engine(mut self, require: bool) -> Self {
        self.require_engine = require;
        self
    }

    /// Directory this run writes into
    pub fn resolve_run_dir(&self) -> PathBuf {
        match &self.run_dir {
            Some(dir) => dir.clone(),
            None => self
                .output_dir
                .join(format!("run_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.engines, vec!["all"]);
        assert_eq!(config.metric, "r2");
        assert_eq!(config.models.len(), 12);
        assert_eq!(config.preprocessors.len(), 7);
        assert_eq!(config.strategy, Strategy::Sequential);
        assert!(config.require_engine);
    }

    #[test]
    fn test_builder() {
        let config = RunConfig::new()
            .with_engines(&["tpe"])
            .with_time_budget(Duration::from_millis(1500))
            .with_metric("neg_mean_absolute_error")
            .with_strategy(Strategy::Concurrent)
            .with_run_dir("/tmp/run");

        assert_eq!(config.time_budget(), Duration::from_millis(1500));
        assert_eq!(config.resolve_run_dir(), PathBuf::from("/tmp/run"));
        assert_eq!(config.strategy.to_string(), "concurrent");
    }

    #[test]
    fn test_from_json_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{"metric": "neg_mean_squared_error", "strategy": "concurrent", "seed": 7}"#).unwrap();

        let config = RunConfig::from_json_file(&path).unwrap();
        assert_eq!(config.metric, "neg_mean_squared_error");
        assert_eq!(config.strategy, Strategy::Concurrent);
        assert_eq!(config.seed, 7);
        assert_eq!(config.cv_folds, 3);
    }

    #[test]
    fn test_missing_config_file() {
        let err = RunConfig::from_json_file(Path::new("/nonexistent/run.json")).unwrap_err();
        assert!(matches!(err, AutoMlError::FileNotFound(_)));
    }

    #[test]
    fn test_timestamped_run_dir() {
        let config = RunConfig::new().with_output_dir("out");
        let dir = config.resolve_run_dir();
        assert!(dir.starts_with("out"));
        assert!(dir.file_name().unwrap().to_string_lossy().starts_with("run_"));
    }
}
