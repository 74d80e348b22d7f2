//! Seeded shuffled k-fold splitting

use crate::error::{AutoMlError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Cross-validation strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// K-Fold repeated with a fresh shuffle per repeat
    RepeatedKFold { n_splits: usize, n_repeats: usize },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::KFold { n_splits: 3, shuffle: true }
    }
}

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: u64,
}

impl CrossValidator {
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: 0,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Shuffled k-fold with `n_splits` capped by the number of rows
    pub fn k_fold(n_splits: usize, n_samples: usize, seed: u64) -> Self {
        Self::new(CVStrategy::KFold {
            n_splits: n_splits.min(n_samples),
            shuffle: true,
        })
        .with_random_state(seed)
    }

    /// Repeated shuffled k-fold with `n_splits` capped by the number of rows
    pub fn repeated_k_fold(n_splits: usize, n_repeats: usize, n_samples: usize, seed: u64) -> Self {
        Self::new(CVStrategy::RepeatedKFold {
            n_splits: n_splits.min(n_samples),
            n_repeats,
        })
        .with_random_state(seed)
    }

    pub fn strategy(&self) -> CVStrategy {
        self.strategy
    }

    /// Generate train/test splits
    pub fn split(&self, n_samples: usize) -> Result<Vec<CVSplit>> {
        match self.strategy {
            CVStrategy::KFold { n_splits, shuffle } => {
                self.k_fold_split(n_samples, n_splits, shuffle, self.random_state)
            }
            CVStrategy::RepeatedKFold { n_splits, n_repeats } => {
                let mut all_splits = Vec::with_capacity(n_splits * n_repeats);
                for repeat in 0..n_repeats {
                    let seed = self.random_state.wrapping_add(repeat as u64);
                    let mut splits = self.k_fold_split(n_samples, n_splits, true, seed)?;
                    for split in &mut splits {
                        split.fold_idx += repeat * n_splits;
                    }
                    all_splits.extend(splits);
                }
                Ok(all_splits)
            }
        }
    }

    fn k_fold_split(
        &self,
        n_samples: usize,
        n_splits: usize,
        shuffle: bool,
        seed: u64,
    ) -> Result<Vec<CVSplit>> {
        if n_splits < 2 {
            return Err(AutoMlError::DataError(format!(
                "k-fold needs at least 2 splits, got {} (rows: {})",
                n_splits, n_samples
            )));
        }
        if n_samples < n_splits {
            return Err(AutoMlError::DataError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            indices.shuffle(&mut rng);
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;
        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices = indices[current..current + fold_size].to_vec();
            let train_indices: Vec<usize> = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
            current += fold_size;
        }

        Ok(splits)
    }
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
}

impl CVResults {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n = scores.len().max(1) as f64;
        let mean_score = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n;

        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
        }
    }
}
