//! Trial bookkeeping shared by every search backend

use super::config::OptimizeDirection;
use crate::error::Result;
use crate::optimizer::search_space::format_params;
use crate::pipeline::PipelineSpec;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialState {
    Complete,
    Failed,
}

/// Result of a single trial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trial {
    pub trial_id: usize,
    pub spec: PipelineSpec,
    /// Cross-validated score; `None` when the trial failed
    pub score: Option<f64>,
    /// Fraction of training rows used per fold
    pub resource: f64,
    pub duration_secs: f64,
    pub state: TrialState,
    pub error: Option<String>,
}

impl Trial {
    /// Build a trial from an objective outcome; errors and non-finite scores fail the trial
    pub fn from_outcome(
        trial_id: usize,
        spec: PipelineSpec,
        resource: f64,
        outcome: Result<f64>,
        duration_secs: f64,
    ) -> Self {
        let (score, state, error) = match outcome {
            Ok(v) if v.is_finite() => (Some(v), TrialState::Complete, None),
            Ok(v) => (None, TrialState::Failed, Some(format!("non-finite score {}", v))),
            Err(e) => (None, TrialState::Failed, Some(e.to_string())),
        };
        Self {
            trial_id,
            spec,
            score,
            resource,
            duration_secs,
            state,
            error,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == TrialState::Complete
    }
}

/// Study containing all trials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    pub trials: Vec<Trial>,
    pub best_trial_idx: Option<usize>,
    pub total_duration_secs: f64,
    pub direction: OptimizeDirection,
}

impl Study {
    pub fn new(direction: OptimizeDirection) -> Self {
        Self {
            trials: Vec::new(),
            best_trial_idx: None,
            total_duration_secs: 0.0,
            direction,
        }
    }

    pub fn best_trial(&self) -> Option<&Trial> {
        self.best_trial_idx.map(|idx| &self.trials[idx])
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best_trial().and_then(|t| t.score)
    }

    pub fn best_spec(&self) -> Option<&PipelineSpec> {
        self.best_trial().map(|t| &t.spec)
    }

    pub fn n_trials(&self) -> usize {
        self.trials.len()
    }

    pub fn n_failed(&self) -> usize {
        self.trials.iter().filter(|t| !t.is_complete()).count()
    }

    pub fn next_trial_id(&self) -> usize {
        self.trials.len()
    }

    /// Every trial as `(spec, loss)`, smaller is better; failed trials carry an infinite loss
    pub fn losses(&self) -> Vec<(&PipelineSpec, f64)> {
        self.trials
            .iter()
            .map(|t| {
                let loss = t.score.filter(|_| t.is_complete()).map_or(f64::INFINITY, |s| self.direction.loss(s));
                (&t.spec, loss)
            })
            .collect()
    }

    /// Mean wall-clock seconds per unit of resource over the trials so far
    pub fn cost_per_resource(&self) -> f64 {
        let costs: Vec<f64> = self
            .trials
            .iter()
            .filter(|t| t.resource > 0.0)
            .map(|t| t.duration_secs / t.resource)
            .collect();
        if costs.is_empty() {
            return 0.0;
        }
        costs.iter().sum::<f64>() / costs.len() as f64
    }

    /// Add a trial; a higher resource level always outranks a lower one
    pub fn add_trial(&mut self, trial: Trial) {
        let idx = self.trials.len();

        if let Some(score) = trial.score.filter(|_| trial.is_complete()) {
            let is_better = match self.best_trial() {
                None => true,
                Some(best) => {
                    let best_score = best.score.unwrap_or(self.direction.worst());
                    trial.resource > best.resource
                        || (trial.resource == best.resource && self.direction.is_better(score, best_score))
                }
            };
            if is_better {
                self.best_trial_idx = Some(idx);
            }
        }

        self.trials.push(trial);
    }

    /// Trial trace as a table
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let ids: Vec<u32> = self.trials.iter().map(|t| t.trial_id as u32).collect();
        let models: Vec<String> = self.trials.iter().map(|t| t.spec.model.name().to_string()).collect();
        let preprocessors: Vec<String> = self
            .trials
            .iter()
            .map(|t| t.spec.preprocessor_name().to_string())
            .collect();
        let params: Vec<String> = self
            .trials
            .iter()
            .map(|t| format_params(&t.spec.hyperparameters()))
            .collect();
        let scores: Vec<Option<f64>> = self.trials.iter().map(|t| t.score).collect();
        let resources: Vec<f64> = self.trials.iter().map(|t| t.resource).collect();
        let durations: Vec<f64> = self.trials.iter().map(|t| t.duration_secs).collect();
        let states: Vec<String> = self
            .trials
            .iter()
            .map(|t| match t.state {
                TrialState::Complete => "complete".to_string(),
                TrialState::Failed => "failed".to_string(),
            })
            .collect();

        Ok(DataFrame::new(vec![
            Series::new("trial_id".into(), ids).into(),
            Series::new("model".into(), models).into(),
            Series::new("preprocessor".into(), preprocessors).into(),
            Series::new("params".into(), params).into(),
            Series::new("score".into(), scores).into(),
            Series::new("resource".into(), resources).into(),
            Series::new("duration_secs".into(), durations).into(),
            Series::new("state".into(), states).into(),
        ])?)
    }

    /// Write the trial trace as CSV
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut df = self.to_dataframe()?;
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ModelFamily;
    use crate::error::AutoMlError;

    fn spec() -> PipelineSpec {
        PipelineSpec::new(None, ModelFamily::Ridge)
    }

    #[test]
    fn test_best_trial_follows_direction() {
        let mut study = Study::new(OptimizeDirection::Minimize);
        study.add_trial(Trial::from_outcome(0, spec(), 1.0, Ok(2.0), 0.1));
        study.add_trial(Trial::from_outcome(1, spec(), 1.0, Ok(1.0), 0.1));
        study.add_trial(Trial::from_outcome(2, spec(), 1.0, Ok(1.5), 0.1));
        assert_eq!(study.best_trial().map(|t| t.trial_id), Some(1));
        assert_eq!(study.best_score(), Some(1.0));
    }

    #[test]
    fn test_failed_trials_never_best() {
        let mut study = Study::new(OptimizeDirection::Maximize);
        study.add_trial(Trial::from_outcome(0, spec(), 1.0, Ok(f64::NAN), 0.1));
        study.add_trial(Trial::from_outcome(
            1,
            spec(),
            1.0,
            Err(AutoMlError::TrainingError("singular".into())),
            0.1,
        ));
        assert!(study.best_trial().is_none());
        assert_eq!(study.n_failed(), 2);

        study.add_trial(Trial::from_outcome(2, spec(), 1.0, Ok(-5.0), 0.1));
        assert_eq!(study.best_trial().map(|t| t.trial_id), Some(2));
    }

    #[test]
    fn test_full_resource_outranks_partial() {
        let mut study = Study::new(OptimizeDirection::Maximize);
        study.add_trial(Trial::from_outcome(0, spec(), 1.0 / 9.0, Ok(0.99), 0.1));
        study.add_trial(Trial::from_outcome(1, spec(), 1.0, Ok(0.5), 0.1));
        assert_eq!(study.best_trial().map(|t| t.trial_id), Some(1));
    }

    #[test]
    fn test_failed_trials_rank_last() {
        let mut study = Study::new(OptimizeDirection::Maximize);
        study.add_trial(Trial::from_outcome(0, spec(), 1.0, Err(AutoMlError::TrainingError("nan".into())), 0.1));
        study.add_trial(Trial::from_outcome(1, spec(), 1.0, Ok(0.4), 0.1));
        study.add_trial(Trial::from_outcome(2, spec(), 1.0, Ok(0.8), 0.1));

        let losses: Vec<f64> = study.losses().into_iter().map(|(_, l)| l).collect();
        assert_eq!(losses, vec![f64::INFINITY, -0.4, -0.8]);
    }

    #[test]
    fn test_cost_per_resource() {
        let mut study = Study::new(OptimizeDirection::Maximize);
        assert_eq!(study.cost_per_resource(), 0.0);
        study.add_trial(Trial::from_outcome(0, spec(), 0.25, Ok(0.5), 0.1));
        study.add_trial(Trial::from_outcome(1, spec(), 1.0, Ok(0.5), 0.6));
        assert!((study.cost_per_resource() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_csv_trace() {
        let mut study = Study::new(OptimizeDirection::Maximize);
        study.add_trial(Trial::from_outcome(0, spec(), 1.0, Ok(0.7), 0.1));
        study.add_trial(Trial::from_outcome(1, spec(), 1.0, Ok(f64::INFINITY), 0.1));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trials.csv");
        study.write_csv(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("trial_id,model,preprocessor,params,score"));
        assert_eq!(lines.count(), 2);
        assert!(text.contains("failed"));
    }
}
