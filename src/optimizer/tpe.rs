//! Tree-structured Parzen Estimator over pipelines
//!
//! After `n_startup_trials` random trials, trials are ranked by loss and split into a good
//! set (best `gamma` share of the completed ones) and a bad set. Failed trials rank last, so
//! they always land in the bad set. Candidates are drawn around the good set and the one with
//! the largest l(x)/g(x) ratio is evaluated next. Stage choices use smoothed categorical
//! estimators; numeric hyperparameters use Gaussian Parzen windows in unit space, fit only
//! on trials of the same family.

use super::{run_trial, Deadline, Objective, PipelineSpace, SearchBackend, SearchConfig, Study};
use crate::error::Result;
use crate::optimizer::search_space::{SearchSpace, TrialParams};
use crate::pipeline::{ModelStage, PipelineSpec};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Box-Muller draw
fn normal_sample(rng: &mut impl Rng, mean: f64, std: f64) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.gen();
    mean + std * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

#[derive(Debug, Clone)]
pub struct TpeSearch {
    gamma: f64,
    n_candidates: usize,
    bandwidth: f64,
}

impl Default for TpeSearch {
    fn default() -> Self {
        Self {
            gamma: 0.25,
            n_candidates: 24,
            bandwidth: 0.15,
        }
    }
}

impl TpeSearch {
    pub fn new() -> Self {
        Self::default()
    }

    fn suggest(
        &self,
        space: &PipelineSpace,
        study: &Study,
        n_startup: usize,
        rng: &mut Xoshiro256PlusPlus,
    ) -> PipelineSpec {
        let mut observed = study.losses();
        let n_complete = observed.iter().filter(|(_, loss)| loss.is_finite()).count();
        if observed.len() < n_startup.max(1) || n_complete == 0 {
            return space.sample(rng);
        }

        observed.sort_by(|a, b| a.1.total_cmp(&b.1));
        let n_good = ((observed.len() as f64 * self.gamma).ceil() as usize).clamp(1, n_complete);
        let good: Vec<&PipelineSpec> = observed[..n_good].iter().map(|(s, _)| *s).collect();
        let bad: Vec<&PipelineSpec> = observed[n_good..].iter().map(|(s, _)| *s).collect();

        let mut best: Option<(f64, PipelineSpec)> = None;
        for _ in 0..self.n_candidates {
            let candidate = self.draw_candidate(space, &good, rng);
            let ratio = self.log_ratio(space, &candidate, &good, &bad);
            if best.as_ref().map_or(true, |(r, _)| ratio > *r) {
                best = Some((ratio, candidate));
            }
        }
        best.map(|(_, spec)| spec).unwrap_or_else(|| space.sample(rng))
    }

    fn draw_candidate(&self, space: &PipelineSpace, good: &[&PipelineSpec], rng: &mut impl Rng) -> PipelineSpec {
        let model = *pick_weighted(space.models(), |m| count(good, |s| s.model == ModelStage::Family(*m)), rng);
        let preprocessor = *pick_weighted(space.preprocessors(), |p| count(good, |s| s.preprocessor == *p), rng);

        let good_model: Vec<&TrialParams> = good
            .iter()
            .filter(|s| s.model == ModelStage::Family(model))
            .map(|s| &s.model_params)
            .collect();
        let model_params = self.draw_params(&model.search_space(), &good_model, rng);

        let preprocessor_params = match preprocessor {
            Some(kind) => {
                let good_prep: Vec<&TrialParams> = good
                    .iter()
                    .filter(|s| s.preprocessor == Some(kind))
                    .map(|s| &s.preprocessor_params)
                    .collect();
                self.draw_params(&kind.search_space(), &good_prep, rng)
            }
            None => TrialParams::new(),
        };

        PipelineSpec::new(preprocessor, model)
            .with_model_params(model_params)
            .with_preprocessor_params(preprocessor_params)
    }

    /// Sample around a random good observation, or from the prior when there is none
    fn draw_params(&self, space: &SearchSpace, good: &[&TrialParams], rng: &mut impl Rng) -> TrialParams {
        let Some(anchor) = good.choose(rng) else {
            return space.sample(rng);
        };
        space
            .parameters()
            .iter()
            .map(|param| {
                let observed = anchor.get(&param.name);
                let value = match (param.n_choices(), observed) {
                    (Some(k), Some(_)) => {
                        let idx = *pick_weighted(&(0..k).collect::<Vec<_>>(), |i| {
                            good.iter()
                                .filter(|p| p.get(&param.name).and_then(|v| param.choice_index(v)) == Some(*i))
                                .count()
                        }, rng);
                        param.choice_at(idx).unwrap_or_else(|| param.sample(rng))
                    }
                    (None, Some(v)) => match param.to_unit(v) {
                        Some(u) => param.from_unit(normal_sample(rng, u, self.bandwidth)),
                        None => param.sample(rng),
                    },
                    _ => param.sample(rng),
                };
                (param.name.clone(), value)
            })
            .collect()
    }

    fn log_ratio(
        &self,
        space: &PipelineSpace,
        candidate: &PipelineSpec,
        good: &[&PipelineSpec],
        bad: &[&PipelineSpec],
    ) -> f64 {
        let n_models = space.models().len();
        let n_preps = space.preprocessors().len();

        let mut ratio = categorical_density(count(good, |s| s.model == candidate.model), good.len(), n_models).ln()
            - categorical_density(count(bad, |s| s.model == candidate.model), bad.len(), n_models).ln();
        ratio += categorical_density(count(good, |s| s.preprocessor == candidate.preprocessor), good.len(), n_preps)
            .ln()
            - categorical_density(count(bad, |s| s.preprocessor == candidate.preprocessor), bad.len(), n_preps).ln();

        if let ModelStage::Family(family) = candidate.model {
            let same = |set: &[&PipelineSpec]| -> Vec<TrialParams> {
                set.iter()
                    .filter(|s| s.model == candidate.model)
                    .map(|s| s.model_params.clone())
                    .collect()
            };
            ratio += self.params_log_ratio(&family.search_space(), &candidate.model_params, &same(good), &same(bad));
        }
        if let Some(kind) = candidate.preprocessor {
            let same = |set: &[&PipelineSpec]| -> Vec<TrialParams> {
                set.iter()
                    .filter(|s| s.preprocessor == Some(kind))
                    .map(|s| s.preprocessor_params.clone())
                    .collect()
            };
            ratio += self.params_log_ratio(
                &kind.search_space(),
                &candidate.preprocessor_params,
                &same(good),
                &same(bad),
            );
        }
        ratio
    }

    fn params_log_ratio(&self, space: &SearchSpace, params: &TrialParams, good: &[TrialParams], bad: &[TrialParams]) -> f64 {
        // No good trials of this stage: its categorical density alone decides
        if good.is_empty() {
            return 0.0;
        }
        let mut ratio = 0.0;
        for param in space.parameters() {
            let Some(value) = params.get(&param.name) else {
                continue;
            };
            if let Some(k) = param.n_choices() {
                let idx = param.choice_index(value);
                let hits = |set: &[TrialParams]| {
                    set.iter()
                        .filter(|p| p.get(&param.name).and_then(|v| param.choice_index(v)) == idx)
                        .count()
                };
                ratio += categorical_density(hits(good), good.len(), k).ln()
                    - categorical_density(hits(bad), bad.len(), k).ln();
            } else if let Some(u) = param.to_unit(value) {
                let units = |set: &[TrialParams]| -> Vec<f64> {
                    set.iter()
                        .filter_map(|p| p.get(&param.name).and_then(|v| param.to_unit(v)))
                        .collect()
                };
                ratio += parzen_density(u, &units(good), self.bandwidth).ln()
                    - parzen_density(u, &units(bad), self.bandwidth).ln();
            }
        }
        ratio
    }
}

fn count(set: &[&PipelineSpec], pred: impl Fn(&PipelineSpec) -> bool) -> usize {
    set.iter().filter(|s| pred(s)).count()
}

/// Laplace-smoothed probability of a category seen `hits` times out of `n`
fn categorical_density(hits: usize, n: usize, n_choices: usize) -> f64 {
    (hits as f64 + 1.0) / (n as f64 + n_choices.max(1) as f64)
}

/// Gaussian Parzen window on [0, 1] mixed with a uniform prior component
fn parzen_density(u: f64, observations: &[f64], bandwidth: f64) -> f64 {
    let norm = 1.0 / (bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    let kernel_sum: f64 = observations
        .iter()
        .map(|o| norm * (-0.5 * ((u - o) / bandwidth).powi(2)).exp())
        .sum();
    (1.0 + kernel_sum) / (1.0 + observations.len() as f64)
}

/// Draw from `items` with weight `1 + weight(item)`
fn pick_weighted<'a, T>(items: &'a [T], weight: impl Fn(&T) -> usize, rng: &mut impl Rng) -> &'a T {
    let weights: Vec<f64> = items.iter().map(|i| 1.0 + weight(i) as f64).collect();
    let total: f64 = weights.iter().sum();
    let mut target = rng.gen::<f64>() * total;
    for (item, w) in items.iter().zip(&weights) {
        if target < *w {
            return item;
        }
        target -= w;
    }
    &items[items.len() - 1]
}

impl SearchBackend for TpeSearch {
    fn name(&self) -> &'static str {
        "tpe"
    }

    fn run(&mut self, space: &PipelineSpace, config: &SearchConfig, objective: &Objective<'_>) -> Result<Study> {
        let deadline = Deadline::start(config);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.random_state);
        let mut study = Study::new(config.direction);

        while !deadline.reached(&study, 1.0) {
            let spec = self.suggest(space, &study, config.n_startup_trials, &mut rng);
            run_trial(&mut study, spec, 1.0, objective);
        }

        study.total_duration_secs = deadline.elapsed_secs();
        tracing::debug!(trials = study.n_trials(), failed = study.n_failed(), "tpe search finished");
        Ok(study)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ModelFamily;
    use crate::optimizer::test_support::{config, small_space, synthetic_objective};
    use std::time::Duration;

    #[test]
    fn test_tpe_respects_max_trials() {
        let mut tpe = TpeSearch::new();
        let study = tpe.run(&small_space(), &config(12), &synthetic_objective).unwrap();
        assert_eq!(study.n_trials(), 12);
        assert!(study.best_trial().is_some());
    }

    #[test]
    fn test_tpe_concentrates_on_good_family() {
        let mut tpe = TpeSearch::new();
        let study = tpe.run(&small_space(), &config(60), &synthetic_objective).unwrap();

        let late_ridge = study.trials[30..]
            .iter()
            .filter(|t| t.spec.model == ModelStage::Family(ModelFamily::Ridge))
            .count();
        assert!(late_ridge > 10, "only {} Ridge trials after startup", late_ridge);
        assert_eq!(study.best_spec().map(|s| s.model), Some(ModelStage::Family(ModelFamily::Ridge)));
    }

    #[test]
    fn test_tpe_avoids_failing_family() {
        let mut tpe = TpeSearch::new();
        let study = tpe.run(&small_space(), &config(60), &synthetic_objective).unwrap();

        // Svr always errors in the synthetic objective
        let late_svr = study.trials[30..]
            .iter()
            .filter(|t| t.spec.model == ModelStage::Family(ModelFamily::Svr))
            .count();
        assert!(late_svr <= 5, "{} Svr trials after startup", late_svr);
        assert!(study.n_failed() < 20, "{} of 60 trials failed", study.n_failed());
    }

    #[test]
    fn test_tpe_stops_before_overrunning_budget() {
        let budget = Duration::from_millis(180);
        let config = SearchConfig::new().with_time_budget(budget).with_random_state(7);
        let slow = |spec: &PipelineSpec, resource: f64| {
            std::thread::sleep(Duration::from_millis(50));
            synthetic_objective(spec, resource)
        };

        let mut tpe = TpeSearch::new();
        let study = tpe.run(&small_space(), &config, &slow).unwrap();
        assert!(study.n_trials() >= 1);
        assert!(
            study.total_duration_secs <= budget.as_secs_f64(),
            "{} trials took {}s",
            study.n_trials(),
            study.total_duration_secs
        );
    }

    #[test]
    fn test_failed_trials_recorded() {
        let mut tpe = TpeSearch::new();
        let study = tpe.run(&small_space(), &config(40), &synthetic_objective).unwrap();
        assert!(study.trials.iter().filter(|t| t.error.is_some()).count() == study.n_failed());
        assert!(study.best_trial().map_or(false, |t| t.is_complete()));
    }

    #[test]
    fn test_parzen_density_peaks_at_observation() {
        let obs = [0.2, 0.25];
        assert!(parzen_density(0.22, &obs, 0.1) > parzen_density(0.8, &obs, 0.1));
        assert_eq!(parzen_density(0.5, &[], 0.1), 1.0);
    }
}
