//! Binary CART classifier with gini impurity.

use crate::error::{PipelineError, PipelineResult};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Hyperparameters searched by the trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth:         usize,
    /// A node needs at least this many samples to be split.
    pub min_samples_split: usize,
    /// Each child of a split must keep at least this many samples.
    pub min_samples_leaf:  usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        /// Share of positive samples that reached this leaf.
        probability: f64,
        n_samples:   usize,
    },
    Split {
        feature_idx: usize,
        threshold:   f64,
        left:        Box<TreeNode>,
        right:       Box<TreeNode>,
        n_samples:   usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
    pub params:  TreeParams,
    root:        Option<TreeNode>,
    importances: Vec<f64>,
}

struct BestSplit {
    feature_idx: usize,
    threshold:   f64,
    gain:        f64,
}

fn gini(positives: f64, n: f64) -> f64 {
    if n <= 0.0 {
        return 0.0;
    }
    let p = positives / n;
    1.0 - p * p - (1.0 - p) * (1.0 - p)
}

impl DecisionTreeClassifier {
    pub fn new(params: TreeParams) -> Self {
        Self { params, root: None, importances: Vec::new() }
    }

    /// Fit on 0/1 labels.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> PipelineResult<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(PipelineError::InsufficientData {
                what:   "labels matching feature rows",
                needed: n_samples,
                actual: y.len(),
            });
        }
        if n_samples == 0 {
            return Err(PipelineError::InsufficientData {
                what:   "tree training rows",
                needed: 1,
                actual: 0,
            });
        }

        let mut importances = vec![0.0; x.ncols()];
        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build(x, y, &indices, 0, &mut importances));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|imp| *imp /= total);
        }
        self.importances = importances;
        Ok(())
    }

    fn build(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();
        let positives: f64 = indices.iter().map(|&i| y[i]).sum();
        let leaf = || TreeNode::Leaf {
            probability: positives / n_samples as f64,
            n_samples,
        };

        let pure = positives == 0.0 || positives == n_samples as f64;
        if pure || depth >= self.params.max_depth || n_samples < self.params.min_samples_split {
            return leaf();
        }

        let Some(best) = self.find_best_split(x, y, indices, positives) else {
            return leaf();
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);

        importances[best.feature_idx] += n_samples as f64 * best.gain;

        let left = Box::new(self.build(x, y, &left_idx, depth + 1, importances));
        let right = Box::new(self.build(x, y, &right_idx, depth + 1, importances));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold:   best.threshold,
            left,
            right,
            n_samples,
        }
    }

    /// Sweep every feature in sorted order, tracking positives on the left.
    /// Ties on gain keep the earlier feature.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        positives: f64,
    ) -> Option<BestSplit> {
        let n = indices.len();
        let n_f = n as f64;
        let parent = gini(positives, n_f);
        let min_leaf = self.params.min_samples_leaf.max(1);
        let mut best: Option<BestSplit> = None;

        let mut order = indices.to_vec();
        for feature_idx in 0..x.ncols() {
            order.sort_by(|&a, &b| x[[a, feature_idx]].total_cmp(&x[[b, feature_idx]]));

            let mut left_pos = 0.0;
            for i in 0..n - 1 {
                left_pos += y[order[i]];
                let left_n = i + 1;
                let here = x[[order[i], feature_idx]];
                let next = x[[order[i + 1], feature_idx]];
                if here == next || left_n < min_leaf || n - left_n < min_leaf {
                    continue;
                }

                let right_n = (n - left_n) as f64;
                let weighted = (left_n as f64 * gini(left_pos, left_n as f64)
                    + right_n * gini(positives - left_pos, right_n))
                    / n_f;
                let gain = parent - weighted;

                let better = match &best {
                    Some(b) => gain > b.gain + 1e-12,
                    None    => gain > 1e-12,
                };
                if better {
                    best = Some(BestSplit {
                        feature_idx,
                        threshold: (here + next) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }

    /// Probability of the positive class per row. An unfitted tree predicts 0.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Array1<f64> {
        x.rows()
            .into_iter()
            .map(|row| {
                let mut node = match &self.root {
                    Some(root) => root,
                    None => return 0.0,
                };
                loop {
                    match node {
                        TreeNode::Leaf { probability, .. } => return *probability,
                        TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                            node = if row[*feature_idx] <= *threshold { left } else { right };
                        }
                    }
                }
            })
            .collect()
    }

    /// Hard 0/1 labels; an even split predicts the negative class.
    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        self.predict_proba(x).mapv(|p| if p > 0.5 { 1.0 } else { 0.0 })
    }

    /// Normalized total impurity decrease per feature.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        self.root.as_ref().map(walk).unwrap_or(0)
    }

    pub fn n_samples(&self) -> usize {
        match &self.root {
            Some(TreeNode::Leaf { n_samples, .. }) | Some(TreeNode::Split { n_samples, .. }) => *n_samples,
            None => 0,
        }
    }
}
