//! Evolutionary pipeline search
//!
//! (mu + lambda) genetic programming over pipelines: tournament selection, stage-wise
//! crossover, mutation of stages or single hyperparameters. Parents and offspring compete
//! for the next generation, so the best pipelines found so far always survive.

use super::{run_trial, Deadline, Objective, PipelineSpace, SearchBackend, SearchConfig, Study};
use crate::error::Result;
use crate::optimizer::search_space::{SearchSpace, TrialParams};
use crate::pipeline::{ModelStage, PipelineSpec};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

#[derive(Debug, Clone)]
pub struct GeneticSearch {
    population_size: usize,
    tournament_size: usize,
    crossover_rate: f64,
    mutation_rate: f64,
}

impl Default for GeneticSearch {
    fn default() -> Self {
        Self {
            population_size: 10,
            tournament_size: 3,
            crossover_rate: 0.5,
            mutation_rate: 0.9,
        }
    }
}

/// An evaluated pipeline; `None` fitness means the trial failed
#[derive(Debug, Clone)]
struct Individual {
    spec: PipelineSpec,
    fitness: Option<f64>,
}

impl GeneticSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n.max(2);
        self
    }

    fn tournament<'a>(&self, population: &'a [Individual], study: &Study, rng: &mut impl Rng) -> &'a Individual {
        let mut best: Option<&Individual> = None;
        for _ in 0..self.tournament_size {
            let candidate = &population[rng.gen_range(0..population.len())];
            best = match best {
                Some(b) if !beats(candidate, b, study) => Some(b),
                _ => Some(candidate),
            };
        }
        best.unwrap_or(&population[0])
    }

    fn crossover(&self, a: &PipelineSpec, b: &PipelineSpec, rng: &mut impl Rng) -> PipelineSpec {
        let (prep_src, model_src) = if rng.gen_bool(0.5) { (a, b) } else { (b, a) };
        let mut child = PipelineSpec {
            preprocessor: prep_src.preprocessor,
            preprocessor_params: prep_src.preprocessor_params.clone(),
            model: model_src.model,
            model_params: model_src.model_params.clone(),
        };
        // Same family on both sides: mix hyperparameters one by one
        if a.model == b.model {
            let other = if std::ptr::eq(model_src, a) { b } else { a };
            for (name, value) in child.model_params.iter_mut() {
                if rng.gen_bool(0.5) {
                    if let Some(v) = other.model_params.get(name) {
                        *value = v.clone();
                    }
                }
            }
        }
        child
    }

    fn mutate(&self, space: &PipelineSpace, spec: &PipelineSpec, rng: &mut impl Rng) -> PipelineSpec {
        let roll: f64 = rng.gen();
        if roll < 0.25 {
            // New model stage
            let model = space.models()[rng.gen_range(0..space.models().len())];
            return PipelineSpec {
                model: ModelStage::Family(model),
                model_params: model.search_space().sample(rng),
                ..spec.clone()
            };
        }
        if roll < 0.45 {
            // New preprocessing stage
            let preprocessor = space.preprocessors()[rng.gen_range(0..space.preprocessors().len())];
            return PipelineSpec {
                preprocessor,
                preprocessor_params: preprocessor
                    .map(|p| p.search_space().sample(rng))
                    .unwrap_or_default(),
                ..spec.clone()
            };
        }

        let mut child = spec.clone();
        let tweak_preprocessor = child.preprocessor.is_some() && rng.gen_bool(0.3);
        match (tweak_preprocessor, child.preprocessor, child.model) {
            (true, Some(kind), _) => point_mutation(&kind.search_space(), &mut child.preprocessor_params, rng),
            (_, _, ModelStage::Family(family)) => point_mutation(&family.search_space(), &mut child.model_params, rng),
            _ => {}
        }
        child
    }
}

/// Perturb one hyperparameter: Gaussian step in unit space, or a fresh category
fn point_mutation(space: &SearchSpace, params: &mut TrialParams, rng: &mut impl Rng) {
    let Some(param) = space.parameters().choose(rng) else {
        return;
    };
    let value = match params.get(&param.name).and_then(|v| param.to_unit(v)) {
        Some(u) => {
            let step: f64 = rng.gen_range(-0.2..0.2);
            param.from_unit(u + step)
        }
        None => param.sample(rng),
    };
    params.insert(param.name.clone(), value);
}

/// Whether `a` has strictly better fitness than `b`; failed individuals lose to everyone
fn beats(a: &Individual, b: &Individual, study: &Study) -> bool {
    match (a.fitness, b.fitness) {
        (Some(fa), Some(fb)) => study.direction.is_better(fa, fb),
        (Some(_), None) => true,
        _ => false,
    }
}

impl SearchBackend for GeneticSearch {
    fn name(&self) -> &'static str {
        "genetic"
    }

    fn run(&mut self, space: &PipelineSpace, config: &SearchConfig, objective: &Objective<'_>) -> Result<Study> {
        let deadline = Deadline::start(config);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.random_state);
        let mut study = Study::new(config.direction);

        let mut population: Vec<Individual> = Vec::with_capacity(self.population_size);
        while population.len() < self.population_size && !deadline.reached(&study, 1.0) {
            let spec = space.sample(&mut rng);
            let fitness = run_trial(&mut study, spec.clone(), 1.0, objective);
            population.push(Individual { spec, fitness });
        }

        let mut generation = 0;
        while !deadline.reached(&study, 1.0) {
            generation += 1;
            let mut offspring = Vec::with_capacity(self.population_size);
            for _ in 0..self.population_size {
                if deadline.reached(&study, 1.0) {
                    break;
                }
                let parent = self.tournament(&population, &study, &mut rng).spec.clone();
                let mut child = if rng.gen_bool(self.crossover_rate) {
                    let mate = self.tournament(&population, &study, &mut rng);
                    self.crossover(&parent, &mate.spec, &mut rng)
                } else {
                    parent.clone()
                };
                if child == parent || rng.gen_bool(self.mutation_rate) {
                    child = self.mutate(space, &child, &mut rng);
                }
                let fitness = run_trial(&mut study, child.clone(), 1.0, objective);
                offspring.push(Individual { spec: child, fitness });
            }
            if offspring.is_empty() {
                break;
            }

            population.extend(offspring);
            let direction = study.direction;
            population.sort_by(|a, b| {
                let key = |i: &Individual| i.fitness.map(|f| direction.loss(f)).unwrap_or(f64::INFINITY);
                key(a).total_cmp(&key(b))
            });
            population.truncate(self.population_size);

            tracing::debug!(
                generation,
                best = ?population.first().and_then(|i| i.fitness),
                "genetic generation complete"
            );
        }

        study.total_duration_secs = deadline.elapsed_secs();
        tracing::debug!(trials = study.n_trials(), generations = generation, "genetic search finished");
        Ok(study)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ModelFamily, PreprocessorKind};
    use crate::optimizer::test_support::{config, small_space, synthetic_objective};

    #[test]
    fn test_genetic_respects_max_trials() {
        let mut ga = GeneticSearch::new().with_population_size(6);
        let study = ga.run(&small_space(), &config(20), &synthetic_objective).unwrap();
        assert_eq!(study.n_trials(), 20);
    }

    #[test]
    fn test_genetic_finds_best_family() {
        let mut ga = GeneticSearch::new();
        let study = ga.run(&small_space(), &config(60), &synthetic_objective).unwrap();
        assert_eq!(study.best_spec().map(|s| s.model), Some(ModelStage::Family(ModelFamily::Ridge)));
        assert!(study.best_score().unwrap() >= 0.85);
    }

    #[test]
    fn test_crossover_takes_one_stage_from_each_parent() {
        let ga = GeneticSearch::new();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let a = PipelineSpec::new(Some(PreprocessorKind::Pca), ModelFamily::Ridge);
        let b = PipelineSpec::new(None, ModelFamily::Lasso);
        for _ in 0..20 {
            let child = ga.crossover(&a, &b, &mut rng);
            let from_a = child.preprocessor == a.preprocessor;
            assert_eq!(child.model, if from_a { b.model } else { a.model });
        }
    }

    #[test]
    fn test_mutation_stays_in_space() {
        let ga = GeneticSearch::new();
        let space = small_space();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        let mut spec = space.sample(&mut rng);
        for _ in 0..100 {
            spec = ga.mutate(&space, &spec, &mut rng);
            assert!(space.contains(&spec));
        }
    }
}
