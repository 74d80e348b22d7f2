//! Search configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Direction of optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizeDirection {
    Minimize,
    Maximize,
}

impl OptimizeDirection {
    /// Whether `a` is strictly better than `b`
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        match self {
            OptimizeDirection::Minimize => a < b,
            OptimizeDirection::Maximize => a > b,
        }
    }

    /// Worst possible value in this direction
    pub fn worst(&self) -> f64 {
        match self {
            OptimizeDirection::Minimize => f64::INFINITY,
            OptimizeDirection::Maximize => f64::NEG_INFINITY,
        }
    }

    /// Sort key where smaller is always better
    pub fn loss(&self, value: f64) -> f64 {
        match self {
            OptimizeDirection::Minimize => value,
            OptimizeDirection::Maximize => -value,
        }
    }
}

/// Configuration shared by every search backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Wall-clock budget for the search loop
    pub time_budget: Duration,

    /// Optimization direction
    pub direction: OptimizeDirection,

    /// Random seed
    pub random_state: u64,

    /// Folds used to score each trial
    pub cv_folds: usize,

    /// Random trials before the model-based sampler takes over
    pub n_startup_trials: usize,

    /// Hard cap on trials, on top of the time budget
    pub max_trials: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            time_budget: Duration::from_secs(60),
            direction: OptimizeDirection::Maximize,
            random_state: 42,
            cv_folds: 3,
            n_startup_trials: 10,
            max_trials: None,
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    pub fn with_direction(mut self, direction: OptimizeDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_n_startup_trials(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    pub fn with_max_trials(mut self, n: usize) -> Self {
        self.max_trials = Some(n);
        self
    }
}
