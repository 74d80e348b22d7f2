//! Second-order regression tree shared by every tree-based family
//!
//! Trees are grown best-first on per-row gradients and hessians. With `g = -y` and
//! `h = 1` a tree fits the mean of its leaves (plain CART on squared error); boosting
//! passes the residual gradients of its running prediction.

use crate::error::{AutoMlError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// How many features each split considers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    All,
    Sqrt,
    Third,
    Fraction(f64),
}

impl MaxFeatures {
    pub fn from_name(name: &str) -> Self {
        match name {
            "sqrt" => MaxFeatures::Sqrt,
            "third" => MaxFeatures::Third,
            _ => MaxFeatures::All,
        }
    }

    pub fn resolve(&self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt().round() as usize,
            MaxFeatures::Third => n_features / 3,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).round() as usize,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Growth limits and regularization for a single tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub max_leaves: Option<usize>,
    pub max_features: MaxFeatures,
    /// Draw one random threshold per feature instead of scanning every cut
    pub random_splits: bool,
    /// L2 penalty on leaf values
    pub lambda: f64,
    /// Minimum gain for a split to be kept
    pub gamma: f64,
    pub min_child_weight: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 8,
            min_samples_leaf: 1,
            max_leaves: None,
            max_features: MaxFeatures::All,
            random_splits: false,
            lambda: 0.0,
            gamma: 0.0,
            min_child_weight: 0.0,
        }
    }
}

impl TreeParams {
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n.max(1);
        self
    }

    pub fn with_max_leaves(mut self, n: usize) -> Self {
        self.max_leaves = Some(n.max(2));
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_splits(mut self, random: bool) -> Self {
        self.random_splits = random;
        self
    }

    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

struct Candidate {
    node: usize,
    rows: Vec<usize>,
    depth: usize,
    split: Option<BestSplit>,
}

#[derive(Clone, Copy)]
struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct Stats<'a> {
    grad: &'a [f64],
    hess: &'a [f64],
}

impl Stats<'_> {
    fn sums(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter()
            .fold((0.0, 0.0), |(g, h), &i| (g + self.grad[i], h + self.hess[i]))
    }
}

/// A fitted regression tree stored as a node arena
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    n_features: usize,
}

impl RegressionTree {
    /// Fit a plain least-squares tree
    pub fn fit(
        x: &Array2<f64>,
        y: &Array1<f64>,
        rows: &[usize],
        params: &TreeParams,
        rng: &mut impl Rng,
    ) -> Result<Self> {
        let grad: Vec<f64> = y.iter().map(|v| -v).collect();
        let hess = vec![1.0; y.len()];
        Self::grow(x, rows, &grad, &hess, None, params, rng)
    }

    /// Grow a tree on gradient statistics, restricted to `rows` and optionally to `features`
    pub fn grow(
        x: &Array2<f64>,
        rows: &[usize],
        grad: &[f64],
        hess: &[f64],
        features: Option<&[usize]>,
        params: &TreeParams,
        rng: &mut impl Rng,
    ) -> Result<Self> {
        if rows.is_empty() {
            return Err(AutoMlError::TrainingError("cannot grow a tree on zero rows".to_string()));
        }
        let all_features: Vec<usize> = (0..x.ncols()).collect();
        let features = features.unwrap_or(&all_features);
        let stats = Stats { grad, hess };

        let (g, h) = stats.sums(rows);
        let mut tree = Self {
            nodes: vec![Node::Leaf { value: leaf_value(g, h, params.lambda) }],
            n_features: x.ncols(),
        };

        let root_split = find_split(x, rows, &stats, features, params, rng);
        let mut frontier = vec![Candidate {
            node: 0,
            rows: rows.to_vec(),
            depth: 0,
            split: root_split,
        }];
        let mut n_leaves = 1;

        loop {
            if params.max_leaves.is_some_and(|max| n_leaves >= max) {
                break;
            }
            let best = frontier
                .iter()
                .enumerate()
                .filter_map(|(i, c)| c.split.map(|s| (i, s.gain)))
                .max_by(|a, b| a.1.total_cmp(&b.1));
            let Some((idx, _)) = best else { break };

            let candidate = frontier.swap_remove(idx);
            let Some(split) = candidate.split else { break };

            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = candidate
                .rows
                .iter()
                .partition(|&&i| x[[i, split.feature]] <= split.threshold);

            let left = tree.nodes.len();
            let right = left + 1;
            let (gl, hl) = stats.sums(&left_rows);
            let (gr, hr) = stats.sums(&right_rows);
            tree.nodes.push(Node::Leaf { value: leaf_value(gl, hl, params.lambda) });
            tree.nodes.push(Node::Leaf { value: leaf_value(gr, hr, params.lambda) });
            tree.nodes[candidate.node] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };
            n_leaves += 1;

            let depth = candidate.depth + 1;
            for (node, child_rows) in [(left, left_rows), (right, right_rows)] {
                let split = if depth < params.max_depth {
                    find_split(x, &child_rows, &stats, features, params, rng)
                } else {
                    None
                };
                frontier.push(Candidate {
                    node,
                    rows: child_rows,
                    depth,
                    split,
                });
            }
        }

        Ok(tree)
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        x.rows().into_iter().map(|row| self.predict_row(row)).collect()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf { .. })).count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

fn leaf_value(g: f64, h: f64, lambda: f64) -> f64 {
    let denom = h + lambda;
    if denom <= 0.0 {
        0.0
    } else {
        -g / denom
    }
}

fn score(g: f64, h: f64, lambda: f64) -> f64 {
    let denom = h + lambda;
    if denom <= 0.0 {
        0.0
    } else {
        g * g / denom
    }
}

fn find_split(
    x: &Array2<f64>,
    rows: &[usize],
    stats: &Stats<'_>,
    features: &[usize],
    params: &TreeParams,
    rng: &mut impl Rng,
) -> Option<BestSplit> {
    let min_leaf = params.min_samples_leaf.max(1);
    if rows.len() < 2 * min_leaf {
        return None;
    }

    let k = params.max_features.resolve(features.len());
    let candidates: Vec<usize> = if k < features.len() {
        features.choose_multiple(rng, k).copied().collect()
    } else {
        features.to_vec()
    };

    let (g_total, h_total) = stats.sums(rows);
    let parent = score(g_total, h_total, params.lambda);
    let mut best: Option<BestSplit> = None;

    for &feature in &candidates {
        let split = if params.random_splits {
            random_cut(x, rows, stats, feature, params, parent, rng)
        } else {
            exact_cut(x, rows, stats, feature, params, parent)
        };
        if let Some(s) = split {
            if best.map_or(true, |b| s.gain > b.gain) {
                best = Some(s);
            }
        }
    }

    best.filter(|s| s.gain > 0.0)
}

fn split_gain(
    (gl, hl): (f64, f64),
    (gr, hr): (f64, f64),
    parent: f64,
    params: &TreeParams,
) -> Option<f64> {
    if hl < params.min_child_weight || hr < params.min_child_weight {
        return None;
    }
    Some(0.5 * (score(gl, hl, params.lambda) + score(gr, hr, params.lambda) - parent) - params.gamma)
}

fn exact_cut(
    x: &Array2<f64>,
    rows: &[usize],
    stats: &Stats<'_>,
    feature: usize,
    params: &TreeParams,
    parent: f64,
) -> Option<BestSplit> {
    let mut sorted: Vec<(f64, usize)> = rows.iter().map(|&i| (x[[i, feature]], i)).collect();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let (g_total, h_total) = stats.sums(rows);
    let min_leaf = params.min_samples_leaf.max(1);
    let n = sorted.len();
    let (mut gl, mut hl) = (0.0, 0.0);
    let mut best: Option<BestSplit> = None;

    for pos in 0..n - 1 {
        let (value, i) = sorted[pos];
        gl += stats.grad[i];
        hl += stats.hess[i];
        let n_left = pos + 1;
        if n_left < min_leaf || n - n_left < min_leaf {
            continue;
        }
        let next = sorted[pos + 1].0;
        if next <= value {
            continue;
        }
        let Some(gain) = split_gain((gl, hl), (g_total - gl, h_total - hl), parent, params) else {
            continue;
        };
        if best.map_or(true, |b| gain > b.gain) {
            best = Some(BestSplit {
                feature,
                threshold: value + (next - value) / 2.0,
                gain,
            });
        }
    }
    best
}

fn random_cut(
    x: &Array2<f64>,
    rows: &[usize],
    stats: &Stats<'_>,
    feature: usize,
    params: &TreeParams,
    parent: f64,
    rng: &mut impl Rng,
) -> Option<BestSplit> {
    let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
        let v = x[[i, feature]];
        (lo.min(v), hi.max(v))
    });
    if !(hi > lo) {
        return None;
    }
    let threshold = rng.gen_range(lo..hi);

    let (mut gl, mut hl, mut n_left) = (0.0, 0.0, 0usize);
    for &i in rows {
        if x[[i, feature]] <= threshold {
            gl += stats.grad[i];
            hl += stats.hess[i];
            n_left += 1;
        }
    }
    let min_leaf = params.min_samples_leaf.max(1);
    if n_left < min_leaf || rows.len() - n_left < min_leaf {
        return None;
    }
    let (g_total, h_total) = stats.sums(rows);
    let gain = split_gain((gl, hl), (g_total - gl, h_total - hl), parent, params)?;
    Some(BestSplit {
        feature,
        threshold,
        gain,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(20, |i| if i < 10 { 1.0 } else { 5.0 });
        (x, y)
    }

    #[test]
    fn test_single_split_recovers_step() {
        let (x, y) = step_data();
        let rows: Vec<usize> = (0..20).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let tree = RegressionTree::fit(&x, &y, &rows, &TreeParams::default().with_max_depth(1), &mut rng)
            .unwrap();

        assert_eq!(tree.n_leaves(), 2);
        let pred = tree.predict(&x);
        assert!((pred[0] - 1.0).abs() < 1e-12);
        assert!((pred[19] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_depth_limit() {
        let x = Array2::from_shape_fn((64, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| v * v);
        let rows: Vec<usize> = (0..64).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let tree = RegressionTree::fit(&x, &y, &rows, &TreeParams::default().with_max_depth(3), &mut rng)
            .unwrap();
        assert!(tree.depth() <= 3);
        assert!(tree.n_leaves() <= 8);
    }

    #[test]
    fn test_leaf_cap() {
        let x = Array2::from_shape_fn((64, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| v.sin());
        let rows: Vec<usize> = (0..64).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let params = TreeParams::default().with_max_depth(20).with_max_leaves(5);
        let tree = RegressionTree::fit(&x, &y, &rows, &params, &mut rng).unwrap();
        assert_eq!(tree.n_leaves(), 5);
    }

    #[test]
    fn test_min_samples_leaf() {
        let (x, y) = step_data();
        let rows: Vec<usize> = (0..20).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let params = TreeParams::default().with_min_samples_leaf(15);
        let tree = RegressionTree::fit(&x, &y, &rows, &params, &mut rng).unwrap();
        assert_eq!(tree.n_leaves(), 1);
    }

    #[test]
    fn test_random_splits_still_reduce_error() {
        let (x, y) = step_data();
        let rows: Vec<usize> = (0..20).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let params = TreeParams::default().with_random_splits(true).with_max_depth(6);
        let tree = RegressionTree::fit(&x, &y, &rows, &params, &mut rng).unwrap();
        assert!(tree.n_leaves() > 1);
    }

    #[test]
    fn test_lambda_shrinks_leaves() {
        let x = Array2::from_shape_fn((4, 1), |(i, _)| i as f64);
        let y = Array1::from_elem(4, 2.0);
        let rows: Vec<usize> = (0..4).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let tree = RegressionTree::fit(&x, &y, &rows, &TreeParams::default().with_lambda(4.0), &mut rng)
            .unwrap();
        assert!((tree.predict(&x)[0] - 1.0).abs() < 1e-12);
    }
}
