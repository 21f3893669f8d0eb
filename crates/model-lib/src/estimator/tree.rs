//! CART decision trees
//!
//! Binary trees split on `x[feature] <= threshold`, with thresholds at the
//! midpoint between adjacent distinct values. Classification trees minimise
//! weighted Gini impurity and store the class distribution in each leaf;
//! regression trees minimise weighted variance (MSE) and store the mean.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

const MIN_GAIN: f64 = 1e-12;

/// Growth limits shared by both tree kinds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Candidate features drawn per split; `None` tries every feature
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    Leaf {
        /// Class proportions for classification, `[mean]` for regression
        value: Vec<f64>,
        n_samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Training targets for one tree.
#[derive(Debug, Clone, Copy)]
pub enum Targets<'a> {
    Classes { y: &'a [usize], n_classes: usize },
    Values(&'a [f64]),
}

impl Targets<'_> {
    fn stats(&self) -> NodeStats {
        match self {
            Targets::Classes { n_classes, .. } => NodeStats::classes(*n_classes),
            Targets::Values(_) => NodeStats::values(),
        }
    }
}

/// Running sufficient statistics for impurity.
#[derive(Debug, Clone)]
struct NodeStats {
    n: f64,
    counts: Vec<f64>,
    sum: f64,
    sum_sq: f64,
    regression: bool,
}

impl NodeStats {
    fn classes(n_classes: usize) -> Self {
        Self {
            n: 0.0,
            counts: vec![0.0; n_classes],
            sum: 0.0,
            sum_sq: 0.0,
            regression: false,
        }
    }

    fn values() -> Self {
        Self {
            n: 0.0,
            counts: Vec::new(),
            sum: 0.0,
            sum_sq: 0.0,
            regression: true,
        }
    }

    fn update(&mut self, targets: &Targets<'_>, row: usize, sign: f64) {
        self.n += sign;
        match targets {
            Targets::Classes { y, .. } => self.counts[y[row]] += sign,
            Targets::Values(y) => {
                self.sum += sign * y[row];
                self.sum_sq += sign * y[row] * y[row];
            }
        }
    }

    fn impurity(&self) -> f64 {
        if self.n <= 0.0 {
            return 0.0;
        }
        if self.regression {
            let mean = self.sum / self.n;
            (self.sum_sq / self.n - mean * mean).max(0.0)
        } else {
            1.0 - self
                .counts
                .iter()
                .map(|c| (c / self.n).powi(2))
                .sum::<f64>()
        }
    }

    fn leaf_value(&self) -> Vec<f64> {
        if self.regression {
            vec![if self.n > 0.0 { self.sum / self.n } else { 0.0 }]
        } else {
            self.counts
                .iter()
                .map(|c| if self.n > 0.0 { c / self.n } else { 0.0 })
                .collect()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    root: TreeNode,
    n_features: usize,
}

impl DecisionTree {
    /// Grow a tree on `rows` (indices into `x`, repeats allowed for
    /// bootstrap samples).
    pub fn fit(
        x: &[Vec<f64>],
        targets: Targets<'_>,
        rows: &[usize],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let n_features = x.first().map(Vec::len).unwrap_or(0);
        let mut builder = Builder {
            x,
            targets,
            params,
            n_features,
            rng,
        };
        let root = builder.grow(rows.to_vec(), 0);
        Self { root, n_features }
    }

    /// Leaf value reached by `sample`.
    pub fn leaf(&self, sample: &[f64]) -> &[f64] {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }
}

struct Builder<'a, 'r> {
    x: &'a [Vec<f64>],
    targets: Targets<'a>,
    params: &'a TreeParams,
    n_features: usize,
    rng: &'r mut StdRng,
}

impl Builder<'_, '_> {
    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> TreeNode {
        let mut stats = self.targets.stats();
        for &row in &rows {
            stats.update(&self.targets, row, 1.0);
        }
        let leaf = |stats: &NodeStats| TreeNode::Leaf {
            value: stats.leaf_value(),
            n_samples: rows.len(),
        };

        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
        if depth_reached
            || rows.len() < self.params.min_samples_split
            || stats.impurity() <= MIN_GAIN
        {
            return leaf(&stats);
        }

        let Some((feature, threshold)) = self.best_split(&rows, &stats) else {
            return leaf(&stats);
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&row| self.x[row][feature] <= threshold);

        TreeNode::Split {
            feature,
            threshold,
            left: Box::new(self.grow(left_rows, depth + 1)),
            right: Box::new(self.grow(right_rows, depth + 1)),
        }
    }

    /// Features in the order they are tried, and how many must be tried
    /// before settling. When the drawn subset yields no useful split the
    /// search continues through the remaining features.
    fn feature_order(&mut self) -> (Vec<usize>, usize) {
        let mut order: Vec<usize> = (0..self.n_features).collect();
        match self.params.max_features {
            Some(k) if k < self.n_features => {
                order.shuffle(&mut *self.rng);
                (order, k.max(1))
            }
            _ => (order, self.n_features),
        }
    }

    fn best_split(&mut self, rows: &[usize], parent: &NodeStats) -> Option<(usize, f64)> {
        let n = rows.len() as f64;
        let parent_impurity = parent.impurity();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let mut best: Option<(usize, f64, f64)> = None;
        let (order, required) = self.feature_order();

        for (tried, &feature) in order.iter().enumerate() {
            if tried >= required
                && best.is_some_and(|(_, _, score)| parent_impurity - score > MIN_GAIN)
            {
                break;
            }

            let mut sorted = rows.to_vec();
            sorted.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let mut left = self.targets.stats();
            let mut right = parent.clone();

            for i in 0..sorted.len() - 1 {
                left.update(&self.targets, sorted[i], 1.0);
                right.update(&self.targets, sorted[i], -1.0);

                let current = self.x[sorted[i]][feature];
                let next = self.x[sorted[i + 1]][feature];
                if current == next {
                    continue;
                }
                let n_left = i + 1;
                if n_left < min_leaf || sorted.len() - n_left < min_leaf {
                    continue;
                }

                let weighted = (left.n * left.impurity() + right.n * right.impurity()) / n;
                if best.map_or(true, |(_, _, score)| weighted < score - MIN_GAIN) {
                    best = Some((feature, (current + next) / 2.0, weighted));
                }
            }
        }

        best.filter(|(_, _, score)| parent_impurity - score > MIN_GAIN)
            .map(|(feature, threshold, _)| (feature, threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rows(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    #[test]
    fn test_classifier_separates_on_midpoint() {
        let x: Vec<Vec<f64>> = [1.0, 2.0, 3.0, 10.0, 11.0, 12.0]
            .iter()
            .map(|v| vec![*v])
            .collect();
        let y = [0, 0, 0, 1, 1, 1];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = DecisionTree::fit(
            &x,
            Targets::Classes { y: &y, n_classes: 2 },
            &rows(6),
            &TreeParams::default(),
            &mut rng,
        );
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.leaf(&[2.5]), &[1.0, 0.0]);
        assert_eq!(tree.leaf(&[6.4]), &[1.0, 0.0]);
        assert_eq!(tree.leaf(&[6.6]), &[0.0, 1.0]);
    }

    #[test]
    fn test_regressor_fits_step_function() {
        let x: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64]).collect();
        let y = [1.0, 1.0, 1.0, 1.0, 5.0, 5.0, 5.0, 5.0];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = DecisionTree::fit(
            &x,
            Targets::Values(&y),
            &rows(8),
            &TreeParams::default(),
            &mut rng,
        );
        assert_eq!(tree.leaf(&[0.0]), &[1.0]);
        assert_eq!(tree.leaf(&[7.0]), &[5.0]);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let x: Vec<Vec<f64>> = (0..16).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..16).map(|i| (i * i) as f64).collect();
        let mut rng = StdRng::seed_from_u64(0);
        let params = TreeParams {
            max_depth: Some(2),
            ..TreeParams::default()
        };
        let tree = DecisionTree::fit(&x, Targets::Values(&y), &rows(16), &params, &mut rng);
        assert!(tree.depth() <= 2);
    }

    #[test]
    fn test_constant_feature_yields_single_leaf() {
        let x = vec![vec![1.0]; 4];
        let y = [0, 1, 0, 1];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = DecisionTree::fit(
            &x,
            Targets::Classes { y: &y, n_classes: 2 },
            &rows(4),
            &TreeParams::default(),
            &mut rng,
        );
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.leaf(&[1.0]), &[0.5, 0.5]);
    }

    #[test]
    fn test_bootstrap_rows_with_repeats() {
        let x: Vec<Vec<f64>> = vec![vec![0.0], vec![1.0]];
        let y = [2.0, 4.0];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = DecisionTree::fit(
            &x,
            Targets::Values(&y),
            &[0, 0, 0],
            &TreeParams::default(),
            &mut rng,
        );
        assert_eq!(tree.leaf(&[1.0]), &[2.0]);
    }
}
