//! Pipeline search backends
//!
//! Each backend explores the two-stage [`PipelineSpace`] under a wall-clock budget and
//! records every candidate in a [`Study`]:
//! - `tpe`: Tree-structured Parzen Estimator (sequential model-based search)
//! - `genetic`: evolutionary search with tournament selection and elitism
//! - `halving`: successive halving over the training-row fraction
//!
//! Backends are compiled in only when their cargo feature is enabled.

pub mod config;
pub mod pipeline_space;
pub mod search_space;
pub mod study;

#[cfg(feature = "engine-genetic")]
pub mod genetic;
#[cfg(feature = "engine-halving")]
pub mod halving;
#[cfg(feature = "engine-tpe")]
pub mod tpe;

pub use config::{OptimizeDirection, SearchConfig};
pub use pipeline_space::PipelineSpace;
pub use search_space::{Parameter, ParameterType, ParameterValue, SearchSpace, TrialParams};
pub use study::{Study, Trial, TrialState};

use crate::error::Result;
use crate::pipeline::PipelineSpec;
use std::time::{Duration, Instant};

/// Scores a candidate at a resource level (fraction of training rows per fold)
pub type Objective<'a> = dyn Fn(&PipelineSpec, f64) -> Result<f64> + 'a;

/// A search strategy over pipelines
pub trait SearchBackend: Send {
    fn name(&self) -> &'static str;

    /// Search until the budget is spent; always runs at least one trial
    fn run(&mut self, space: &PipelineSpace, config: &SearchConfig, objective: &Objective<'_>) -> Result<Study>;
}

/// Wall-clock and trial-count limits of one search
pub(crate) struct Deadline {
    start: Instant,
    budget: Duration,
    max_trials: Option<usize>,
}

impl Deadline {
    pub(crate) fn start(config: &SearchConfig) -> Self {
        Self {
            start: Instant::now(),
            budget: config.time_budget,
            max_trials: config.max_trials,
        }
    }

    /// Whether no further trial at `resource` may start
    ///
    /// The first trial always runs. After that a trial only opens when the observed cost
    /// per unit of resource says it can finish inside the budget.
    pub(crate) fn reached(&self, study: &Study, resource: f64) -> bool {
        let n_trials = study.n_trials();
        if n_trials == 0 {
            return false;
        }
        if self.max_trials.map_or(false, |m| n_trials >= m) {
            return true;
        }
        self.would_overrun(study.cost_per_resource() * resource)
    }

    fn would_overrun(&self, estimate_secs: f64) -> bool {
        self.start.elapsed().as_secs_f64() + estimate_secs > self.budget.as_secs_f64()
    }

    pub(crate) fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Evaluate one candidate and record it; returns the score when the trial completed
pub(crate) fn run_trial(
    study: &mut Study,
    spec: PipelineSpec,
    resource: f64,
    objective: &Objective<'_>,
) -> Option<f64> {
    let trial_id = study.next_trial_id();
    let start = Instant::now();
    let outcome = objective(&spec, resource);
    let trial = Trial::from_outcome(trial_id, spec, resource, outcome, start.elapsed().as_secs_f64());

    match (&trial.score, &trial.error) {
        (Some(score), _) => tracing::debug!(trial = trial_id, score, resource, pipeline = %trial.spec, "trial complete"),
        (None, error) => tracing::debug!(trial = trial_id, error = ?error, pipeline = %trial.spec, "trial failed"),
    }

    let score = trial.score;
    study.add_trial(trial);
    score
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::catalog::{ModelFamily, PreprocessorKind};
    use crate::error::AutoMlError;
    use crate::pipeline::ModelStage;

    /// Cheap synthetic objective: Ridge beats everything, preprocessing costs a little
    pub fn synthetic_objective(spec: &PipelineSpec, resource: f64) -> Result<f64> {
        let base = match spec.model {
            ModelStage::Family(ModelFamily::Ridge) => 0.9,
            ModelStage::Family(ModelFamily::Lasso) => 0.6,
            ModelStage::Family(ModelFamily::Svr) => return Err(AutoMlError::TrainingError("diverged".into())),
            _ => 0.3,
        };
        let penalty = if spec.preprocessor.is_some() { 0.05 } else { 0.0 };
        Ok(base - penalty - 0.1 * (1.0 - resource))
    }

    pub fn small_space() -> PipelineSpace {
        PipelineSpace::new(
            vec![ModelFamily::Ridge, ModelFamily::Lasso, ModelFamily::Svr, ModelFamily::DecisionTree],
            vec![None, Some(PreprocessorKind::StandardScaler)],
        )
        .expect("non-empty space")
    }

    pub fn config(max_trials: usize) -> SearchConfig {
        SearchConfig::new()
            .with_time_budget(Duration::from_secs(30))
            .with_max_trials(max_trials)
            .with_random_state(7)
            .with_n_startup_trials(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ModelFamily;

    fn study_with(durations: &[f64]) -> Study {
        let mut study = Study::new(OptimizeDirection::Maximize);
        for (i, d) in durations.iter().enumerate() {
            study.add_trial(Trial::from_outcome(i, PipelineSpec::new(None, ModelFamily::Ridge), 1.0, Ok(0.5), *d));
        }
        study
    }

    #[test]
    fn test_deadline_always_allows_first_trial() {
        let config = SearchConfig::new().with_time_budget(Duration::ZERO);
        let deadline = Deadline::start(&config);
        assert!(!deadline.reached(&study_with(&[]), 1.0));
        assert!(deadline.reached(&study_with(&[0.1]), 1.0));
    }

    #[test]
    fn test_deadline_max_trials() {
        let config = SearchConfig::new().with_time_budget(Duration::from_secs(60)).with_max_trials(3);
        let deadline = Deadline::start(&config);
        assert!(!deadline.reached(&study_with(&[0.01, 0.01]), 1.0));
        assert!(deadline.reached(&study_with(&[0.01, 0.01, 0.01]), 1.0));
    }

    #[test]
    fn test_deadline_skips_trial_that_would_overrun() {
        let config = SearchConfig::new().with_time_budget(Duration::from_secs(1));
        let deadline = Deadline::start(&config);
        let study = study_with(&[1.5]);
        assert!(deadline.reached(&study, 1.0));
        // A ninth of the rows is expected to fit
        assert!(!deadline.reached(&study, 1.0 / 9.0));
    }
}
