//! CART classification tree with Gini impurity
//!
//! Grown on a bootstrap of row indices into a shared, read-only
//! samples x features matrix. Nodes live in a flat arena, root at index 0.

use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::rng::RMersenneTwister;

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    /// Features drawn as split candidates at every node
    pub split_candidates: usize,
    /// Smallest allowed child size
    pub min_node_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        class: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

/// Shared state of one tree's growth
struct Grower<'d, 'l, 'r> {
    data: ArrayView2<'d, f64>,
    labels: &'l [usize],
    n_classes: usize,
    params: TreeParams,
    rng: &'r mut RMersenneTwister,
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Grow a tree on the rows listed in `sample` (duplicates allowed).
    ///
    /// `labels` holds the class id of every row of `data`.
    pub fn fit(
        data: ArrayView2<'_, f64>,
        labels: &[usize],
        sample: &[usize],
        n_classes: usize,
        params: TreeParams,
        rng: &mut RMersenneTwister,
    ) -> Self {
        let mut grower = Grower {
            data,
            labels,
            n_classes,
            params,
            rng,
            nodes: Vec::new(),
        };
        let mut rows = sample.to_vec();
        grower.grow(&mut rows, 0);
        Self {
            nodes: grower.nodes,
        }
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + walk(nodes, left).max(walk(nodes, right))
                }
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    /// Predict from a feature lookup, so callers can substitute values
    /// without copying rows
    pub fn predict_with<F: Fn(usize) -> f64>(&self, value: F) -> usize {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                TreeNode::Leaf { class } => return class,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if value(feature) <= threshold { left } else { right };
                }
            }
        }
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> usize {
        self.predict_with(|j| row[j])
    }

    /// Distinct features used by any split, ascending
    pub fn split_features(&self) -> Vec<usize> {
        let mut features: Vec<usize> = self
            .nodes
            .iter()
            .filter_map(|node| match node {
                TreeNode::Split { feature, .. } => Some(*feature),
                TreeNode::Leaf { .. } => None,
            })
            .collect();
        features.sort_unstable();
        features.dedup();
        features
    }

    /// Largest feature index referenced by a split
    pub fn max_feature(&self) -> Option<usize> {
        self.split_features().last().copied()
    }
}

impl Grower<'_, '_, '_> {
    fn class_counts(&self, rows: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &r in rows {
            counts[self.labels[r]] += 1;
        }
        counts
    }

    fn push(&mut self, node: TreeNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Grow the subtree for `rows`, returning its arena index
    fn grow(&mut self, rows: &mut [usize], depth: usize) -> usize {
        let counts = self.class_counts(rows);
        let majority = majority(&counts);
        let n = rows.len();

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        if pure || depth >= self.params.max_depth || n < 2 * self.params.min_node_size.max(1) {
            return self.push(TreeNode::Leaf { class: majority });
        }

        let Some((feature, threshold)) = self.best_split(rows, &counts) else {
            return self.push(TreeNode::Leaf { class: majority });
        };

        // Partition in place: rows <= threshold first
        let mut boundary = 0;
        for i in 0..n {
            if self.data[[rows[i], feature]] <= threshold {
                rows.swap(i, boundary);
                boundary += 1;
            }
        }

        let node = self.push(TreeNode::Leaf { class: majority });
        let (left_rows, right_rows) = rows.split_at_mut(boundary);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[node] = TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        node
    }

    /// Best (feature, threshold) among freshly drawn candidates.
    ///
    /// Maximizes sum_k l_k^2 / n_l + sum_k r_k^2 / n_r, which minimizes the
    /// weighted Gini impurity of the children. `None` if no candidate
    /// strictly lowers the impurity.
    fn best_split(&mut self, rows: &[usize], parent_counts: &[usize]) -> Option<(usize, f64)> {
        let n = rows.len();
        let n_features = self.data.ncols();
        let m = self.params.split_candidates.clamp(1, n_features);
        let min_child = self.params.min_node_size.max(1);
        let candidates = self.rng.sample_without_replacement(n_features, m);

        let parent_score =
            parent_counts.iter().map(|&c| (c * c) as f64).sum::<f64>() / n as f64;
        let mut best_score = parent_score + 1e-12;
        let mut best: Option<(usize, f64)> = None;

        let mut order: Vec<usize> = rows.to_vec();
        for feature in candidates {
            order.sort_by(|&a, &b| {
                self.data[[a, feature]].total_cmp(&self.data[[b, feature]])
            });

            let mut left = vec![0usize; self.n_classes];
            let mut right = parent_counts.to_vec();
            let mut left_sq = 0.0;
            let mut right_sq: f64 = right.iter().map(|&c| (c * c) as f64).sum();

            for i in 0..n - 1 {
                let class = self.labels[order[i]];
                // (c+1)^2 - c^2 = 2c + 1, (c-1)^2 - c^2 = 1 - 2c
                left_sq += (2 * left[class] + 1) as f64;
                right_sq += 1.0 - (2 * right[class]) as f64;
                left[class] += 1;
                right[class] -= 1;

                let x = self.data[[order[i], feature]];
                let x_next = self.data[[order[i + 1], feature]];
                if x == x_next {
                    continue;
                }
                let n_left = i + 1;
                let n_right = n - n_left;
                if n_left < min_child || n_right < min_child {
                    continue;
                }

                let score = left_sq / n_left as f64 + right_sq / n_right as f64;
                if score > best_score {
                    best_score = score;
                    let mut threshold = 0.5 * (x + x_next);
                    // Midpoint can round up to x_next for adjacent floats
                    if threshold >= x_next {
                        threshold = x;
                    }
                    best = Some((feature, threshold));
                }
            }
        }

        best
    }
}

/// Most frequent class; ties go to the lowest class id
pub fn majority(counts: &[usize]) -> usize {
    let mut best = 0;
    for (class, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = class;
        }
    }
    best
}
