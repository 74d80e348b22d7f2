//! Training-row outlier filters
//!
//! Each detector scores the training rows, and the `contamination` share with the highest
//! scores is dropped before the model stage is fit. At predict time the filter is a no-op.

use crate::error::{AutoMlError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Scoring method of an outlier filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OutlierMethod {
    /// Distance to the nearest k-means centroid
    KMeans { n_clusters: usize },
    /// Isolation forest anomaly score
    IsolationForest { n_estimators: usize },
    /// Local outlier factor
    LocalOutlierFactor { n_neighbors: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierFilter {
    pub method: OutlierMethod,
    pub contamination: f64,
    pub random_state: u64,
    n_features: Option<usize>,
    n_removed: usize,
}

fn euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

fn standardized(x: &Array2<f64>) -> Array2<f64> {
    let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
    let std = x.std_axis(Axis(0), 0.0).mapv(|s| if s > 1e-12 { s } else { 1.0 });
    (x - &mean.view().insert_axis(Axis(0))) / &std.view().insert_axis(Axis(0))
}

impl OutlierFilter {
    pub fn new(method: OutlierMethod, contamination: f64, seed: u64) -> Self {
        Self {
            method,
            contamination: contamination.clamp(0.0, 0.5),
            random_state: seed,
            n_features: None,
            n_removed: 0,
        }
    }

    /// Rows dropped during the last fit
    pub fn n_removed(&self) -> usize {
        self.n_removed
    }

    pub fn is_fitted(&self) -> bool {
        self.n_features.is_some()
    }

    /// Fit the detector and return the training rows with outliers removed
    pub fn fit_resample(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(Array2<f64>, Array1<f64>)> {
        let n = x.nrows();
        self.n_features = Some(x.ncols());
        let n_flag = ((self.contamination * n as f64).floor() as usize).min(n.saturating_sub(2));
        if n_flag == 0 {
            self.n_removed = 0;
            return Ok((x.clone(), y.clone()));
        }

        let scores = self.scores(&standardized(x));
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|a, b| scores[*b].total_cmp(&scores[*a]));
        let mut keep: Vec<usize> = order[n_flag..].to_vec();
        keep.sort_unstable();

        self.n_removed = n_flag;
        Ok((x.select(Axis(0), &keep), y.select(Axis(0), &keep)))
    }

    /// Identity at predict time
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let width = self.n_features.ok_or(AutoMlError::NotFitted)?;
        super::check_width(x, width)?;
        Ok(x.clone())
    }

    fn scores(&self, x: &Array2<f64>) -> Vec<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        match self.method {
            OutlierMethod::KMeans { n_clusters } => kmeans_scores(x, n_clusters, &mut rng),
            OutlierMethod::IsolationForest { n_estimators } => isolation_scores(x, n_estimators, &mut rng),
            OutlierMethod::LocalOutlierFactor { n_neighbors } => lof_scores(x, n_neighbors),
        }
    }
}

/// k-means++ seeding followed by Lloyd iterations; score is distance to the nearest centroid
fn kmeans_scores(x: &Array2<f64>, n_clusters: usize, rng: &mut impl Rng) -> Vec<f64> {
    let n = x.nrows();
    let k = n_clusters.clamp(1, n);

    let mut centroids: Vec<Array1<f64>> = vec![x.row(rng.gen_range(0..n)).to_owned()];
    while centroids.len() < k {
        let d2: Vec<f64> = x
            .rows()
            .into_iter()
            .map(|row| {
                centroids
                    .iter()
                    .map(|c| euclidean(row, c.view()).powi(2))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = d2.iter().sum();
        if total <= 0.0 {
            break;
        }
        let mut target = rng.gen::<f64>() * total;
        let mut chosen = n - 1;
        for (i, d) in d2.iter().enumerate() {
            if target < *d {
                chosen = i;
                break;
            }
            target -= d;
        }
        centroids.push(x.row(chosen).to_owned());
    }

    let nearest = |row: ArrayView1<f64>, centroids: &[Array1<f64>]| -> (usize, f64) {
        centroids
            .iter()
            .enumerate()
            .map(|(c, centroid)| (c, euclidean(row, centroid.view())))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((0, 0.0))
    };

    for _ in 0..50 {
        let assignment: Vec<usize> = x.rows().into_iter().map(|row| nearest(row, &centroids).0).collect();
        let mut moved = false;
        for (c, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<usize> = (0..n).filter(|&i| assignment[i] == c).collect();
            if members.is_empty() {
                continue;
            }
            let updated = x
                .select(Axis(0), &members)
                .mean_axis(Axis(0))
                .unwrap_or_else(|| centroid.clone());
            if euclidean(updated.view(), centroid.view()) > 1e-9 {
                moved = true;
            }
            *centroid = updated;
        }
        if !moved {
            break;
        }
    }

    // Tiny clusters (a lone outlier seeded as its own centroid) are scored against the large ones
    let assignment: Vec<usize> = x.rows().into_iter().map(|row| nearest(row, &centroids).0).collect();
    let mut sizes = vec![0usize; centroids.len()];
    for c in &assignment {
        sizes[*c] += 1;
    }
    let largest = (0..sizes.len()).max_by_key(|c| sizes[*c]).unwrap_or(0);
    let min_size = (n / (2 * centroids.len())).max(2);
    let large: Vec<Array1<f64>> = centroids
        .iter()
        .enumerate()
        .filter(|(c, _)| *c == largest || sizes[*c] >= min_size)
        .map(|(_, centroid)| centroid.clone())
        .collect();

    x.rows().into_iter().map(|row| nearest(row, &large).1).collect()
}

enum IsolationNode {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
    Leaf {
        size: usize,
    },
}

/// Average path length of an unsuccessful BST search over `n` points
fn average_path(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + 0.5772156649) - 2.0 * (n - 1.0) / n
        }
    }
}

fn build_isolation_tree(x: &Array2<f64>, rows: &[usize], height: usize, max_height: usize, rng: &mut impl Rng) -> IsolationNode {
    if height >= max_height || rows.len() <= 1 {
        return IsolationNode::Leaf { size: rows.len() };
    }
    let feature = rng.gen_range(0..x.ncols());
    let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
        (lo.min(x[[i, feature]]), hi.max(x[[i, feature]]))
    });
    if hi - lo < 1e-10 {
        return IsolationNode::Leaf { size: rows.len() };
    }
    let threshold = rng.gen_range(lo..hi);
    let (left, right): (Vec<usize>, Vec<usize>) = rows.iter().partition(|&&i| x[[i, feature]] < threshold);
    if left.is_empty() || right.is_empty() {
        return IsolationNode::Leaf { size: rows.len() };
    }
    IsolationNode::Split {
        feature,
        threshold,
        left: Box::new(build_isolation_tree(x, &left, height + 1, max_height, rng)),
        right: Box::new(build_isolation_tree(x, &right, height + 1, max_height, rng)),
    }
}

fn path_length(node: &IsolationNode, row: ArrayView1<f64>, depth: usize) -> f64 {
    match node {
        IsolationNode::Leaf { size } => depth as f64 + average_path(*size),
        IsolationNode::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if row[*feature] < *threshold {
                path_length(left, row, depth + 1)
            } else {
                path_length(right, row, depth + 1)
            }
        }
    }
}

fn isolation_scores(x: &Array2<f64>, n_estimators: usize, rng: &mut impl Rng) -> Vec<f64> {
    let n = x.nrows();
    let sample_size = n.min(256);
    let max_height = (sample_size as f64).log2().ceil() as usize;
    let all: Vec<usize> = (0..n).collect();

    let trees: Vec<IsolationNode> = (0..n_estimators.max(1))
        .map(|_| {
            let sample: Vec<usize> = all.choose_multiple(rng, sample_size).copied().collect();
            build_isolation_tree(x, &sample, 0, max_height, rng)
        })
        .collect();

    let c = average_path(sample_size).max(1e-12);
    x.rows()
        .into_iter()
        .map(|row| {
            let mean_path = trees.iter().map(|t| path_length(t, row, 0)).sum::<f64>() / trees.len() as f64;
            2f64.powf(-mean_path / c)
        })
        .collect()
}

fn lof_scores(x: &Array2<f64>, n_neighbors: usize) -> Vec<f64> {
    let n = x.nrows();
    let k = n_neighbors.clamp(1, n.saturating_sub(1).max(1));

    let neighbors: Vec<Vec<(usize, f64)>> = (0..n)
        .map(|i| {
            let mut d: Vec<(usize, f64)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| (j, euclidean(x.row(i), x.row(j))))
                .collect();
            d.sort_by(|a, b| a.1.total_cmp(&b.1));
            d.truncate(k);
            d
        })
        .collect();

    let k_distance: Vec<f64> = neighbors
        .iter()
        .map(|nb| nb.last().map(|(_, d)| *d).unwrap_or(0.0))
        .collect();

    let lrd: Vec<f64> = neighbors
        .iter()
        .map(|nb| {
            let reach: f64 = nb.iter().map(|(j, d)| d.max(k_distance[*j])).sum();
            nb.len() as f64 / reach.max(1e-10)
        })
        .collect();

    neighbors
        .iter()
        .enumerate()
        .map(|(i, nb)| {
            let ratio: f64 = nb.iter().map(|(j, _)| lrd[*j] / lrd[i]).sum();
            ratio / nb.len().max(1) as f64
        })
        .collect()
}
