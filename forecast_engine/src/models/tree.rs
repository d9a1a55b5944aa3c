//! CART regression tree
//!
//! Splits minimize the summed squared error of the two children. For each
//! candidate feature the node's rows are sorted once and every boundary
//! between distinct values is scored from prefix sums, so a node costs
//! `O(features * n log n)`.

use rand::seq::index;
use rand::Rng;
use std::cmp::Ordering;

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features sampled per split (all if None)
    pub max_features: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
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

/// A fitted regression tree stored as a flat node arena
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl RegressionTree {
    /// Grow a tree on the rows selected by `indices`
    ///
    /// `indices` may repeat rows (bootstrap samples). `rng` is only consumed
    /// when `max_features` restricts the candidate features.
    pub fn fit<R: Rng>(
        features: &[Vec<f64>],
        targets: &[f64],
        indices: &[usize],
        params: &TreeParams,
        rng: &mut R,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        let n_features = features.first().map_or(0, Vec::len);
        let mut rows = indices.to_vec();
        tree.grow(features, targets, &mut rows, 0, n_features, params, rng);
        tree
    }

    #[allow(clippy::too_many_arguments)]
    fn grow<R: Rng>(
        &mut self,
        features: &[Vec<f64>],
        targets: &[f64],
        rows: &mut [usize],
        depth: usize,
        n_features: usize,
        params: &TreeParams,
        rng: &mut R,
    ) -> usize {
        let id = self.nodes.len();
        let n = rows.len();
        let (sum, sum_sq) = rows.iter().fold((0.0, 0.0), |(s, sq), &i| {
            (s + targets[i], sq + targets[i] * targets[i])
        });
        let mean = if n > 0 { sum / n as f64 } else { 0.0 };
        self.nodes.push(Node::Leaf { value: mean });

        let node_sse = sum_sq - sum * sum / n.max(1) as f64;
        if depth >= params.max_depth
            || n < params.min_samples_split.max(2)
            || n < 2 * params.min_samples_leaf.max(1)
            || node_sse <= 1e-12
        {
            return id;
        }

        let candidates: Vec<usize> = match params.max_features {
            Some(k) if k > 0 && k < n_features => index::sample(rng, n_features, k).into_vec(),
            _ => (0..n_features).collect(),
        };

        let Some(best) = best_split(features, targets, rows, &candidates, params.min_samples_leaf.max(1))
        else {
            return id;
        };
        if best.sse >= node_sse {
            return id;
        }

        // partition rows in place around the threshold
        let mut mid = 0;
        for i in 0..n {
            if features[rows[i]][best.feature] <= best.threshold {
                rows.swap(i, mid);
                mid += 1;
            }
        }
        if mid == 0 || mid == n {
            return id;
        }

        let (left_rows, right_rows) = rows.split_at_mut(mid);
        let left = self.grow(features, targets, left_rows, depth + 1, n_features, params, rng);
        let right = self.grow(features, targets, right_rows, depth + 1, n_features, params, rng);
        self.nodes[id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        id
    }

    /// Predict the value of one row
    pub fn predict_one(&self, row: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match self.nodes.get(id) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let x = row.get(*feature).copied().unwrap_or(0.0);
                    id = if x <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Leaf { .. } => 1,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

fn best_split(
    features: &[Vec<f64>],
    targets: &[f64],
    rows: &[usize],
    candidates: &[usize],
    min_leaf: usize,
) -> Option<BestSplit> {
    let n = rows.len();
    let total: f64 = rows.iter().map(|&i| targets[i]).sum();
    let total_sq: f64 = rows.iter().map(|&i| targets[i] * targets[i]).sum();

    let mut best: Option<BestSplit> = None;
    let mut order: Vec<usize> = rows.to_vec();

    for &feature in candidates {
        order.sort_by(|&a, &b| {
            features[a][feature]
                .partial_cmp(&features[b][feature])
                .unwrap_or(Ordering::Equal)
        });

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for pos in 0..n - 1 {
            let y = targets[order[pos]];
            left_sum += y;
            left_sq += y * y;

            let n_left = pos + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }

            let here = features[order[pos]][feature];
            let next = features[order[pos + 1]][feature];
            if next <= here {
                continue;
            }

            let right_sum = total - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / n_left as f64)
                + (right_sq - right_sum * right_sum / n_right as f64);

            if best.as_ref().map_or(true, |b| sse < b.sse) {
                best = Some(BestSplit {
                    feature,
                    threshold: here + (next - here) / 2.0,
                    sse,
                });
            }
        }
    }

    best
}
