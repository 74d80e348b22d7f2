//! Successive halving with a row-fraction resource
//!
//! Each bracket samples `eta^2` random pipelines and scores them on `1/eta^2` of the
//! training rows per fold. The top `1/eta` are promoted to the next rung at `eta` times
//! the resource, until the survivors run on the full training folds. Brackets repeat
//! until the budget ends.

use super::{run_trial, Deadline, Objective, PipelineSpace, SearchBackend, SearchConfig, Study};
use crate::error::Result;
use crate::pipeline::PipelineSpec;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

#[derive(Debug, Clone)]
pub struct SuccessiveHalving {
    /// Reduction factor
    eta: usize,
    /// Rungs below the full resource
    n_rungs: u32,
}

impl Default for SuccessiveHalving {
    fn default() -> Self {
        Self { eta: 3, n_rungs: 2 }
    }
}

impl SuccessiveHalving {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configurations sampled per bracket
    pub fn bracket_size(&self) -> usize {
        self.eta.pow(self.n_rungs)
    }

    /// Resource of each rung, smallest first, ending at 1.0
    pub fn resources(&self) -> Vec<f64> {
        (0..=self.n_rungs)
            .map(|rung| 1.0 / (self.eta as f64).powi((self.n_rungs - rung) as i32))
            .collect()
    }
}

impl SearchBackend for SuccessiveHalving {
    fn name(&self) -> &'static str {
        "halving"
    }

    fn run(&mut self, space: &PipelineSpace, config: &SearchConfig, objective: &Objective<'_>) -> Result<Study> {
        let deadline = Deadline::start(config);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.random_state);
        let mut study = Study::new(config.direction);
        let direction = config.direction;
        let resources = self.resources();

        let mut bracket = 0;
        'brackets: while !deadline.reached(&study, resources[0]) {
            bracket += 1;
            let mut survivors: Vec<PipelineSpec> = (0..self.bracket_size()).map(|_| space.sample(&mut rng)).collect();

            for (rung, &resource) in resources.iter().enumerate() {
                let mut scored: Vec<(PipelineSpec, f64)> = Vec::with_capacity(survivors.len());
                for spec in survivors {
                    if deadline.reached(&study, resource) {
                        break 'brackets;
                    }
                    if let Some(score) = run_trial(&mut study, spec.clone(), resource, objective) {
                        scored.push((spec, score));
                    }
                }

                if scored.is_empty() || rung + 1 == resources.len() {
                    break;
                }
                scored.sort_by(|a, b| direction.loss(a.1).total_cmp(&direction.loss(b.1)));
                let n_keep = (scored.len() / self.eta).max(1);
                survivors = scored.into_iter().take(n_keep).map(|(spec, _)| spec).collect();
                tracing::debug!(bracket, rung, promoted = survivors.len(), resource, "halving rung complete");
            }
        }

        study.total_duration_secs = deadline.elapsed_secs();
        tracing::debug!(trials = study.n_trials(), brackets = bracket, "halving search finished");
        Ok(study)
    }
}
