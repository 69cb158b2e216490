//! Isolation forest (Liu, Ting & Zhou, 2008).
//!
//! Anomalies are easier to isolate with random axis-aligned cuts, so they end
//! up closer to the root. A sample's score is derived from its mean path
//! length across the ensemble, normalized by the expected path length of an
//! unsuccessful BST search over the subsample size.
//!
//! Conventions follow scikit-learn: `score_sample` is the negated anomaly
//! score (lower is more abnormal), `decision_function` shifts it by the
//! contamination quantile of the training scores, and negative decisions are
//! anomalies.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::detect::DetectError;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;
const AUTO_MAX_SAMPLES: usize = 256;

/// Hyperparameters. Configuration, not behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    /// Expected share of outliers in the training data, in (0, 0.5].
    pub contamination: f64,
    /// Subsample size per tree; `None` means min(256, n).
    pub max_samples: Option<usize>,
    pub random_seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            contamination: 0.05,
            max_samples: None,
            random_seed: 42,
        }
    }
}

impl ForestParams {
    pub fn validate(&self) -> Result<(), DetectError> {
        if self.n_estimators == 0 {
            return Err(DetectError::InvalidModelParameter(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(DetectError::InvalidModelParameter(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if self.max_samples == Some(0) {
            return Err(DetectError::InvalidModelParameter(
                "max_samples must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow<S: AsRef<[f64]>>(
        samples: &[S],
        indices: &mut [usize],
        height_limit: usize,
        n_features: usize,
        rng: &mut StdRng,
    ) -> Self {
        let mut nodes = Vec::new();
        Self::grow_node(&mut nodes, samples, indices, 0, height_limit, n_features, rng);
        Self { nodes }
    }

    fn grow_node<S: AsRef<[f64]>>(
        nodes: &mut Vec<Node>,
        samples: &[S],
        indices: &mut [usize],
        depth: usize,
        height_limit: usize,
        n_features: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = nodes.len();
        nodes.push(Node::Leaf { size: indices.len() });

        if depth >= height_limit || indices.len() <= 1 {
            return id;
        }

        // Only features that still vary in this node can isolate anything.
        let candidates: Vec<(usize, f64, f64)> = (0..n_features)
            .filter_map(|f| {
                let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                    let v = samples[i].as_ref()[f];
                    (lo.min(v), hi.max(v))
                });
                (hi > lo && (hi - lo).is_finite()).then_some((f, lo, hi))
            })
            .collect();

        if candidates.is_empty() {
            return id;
        }

        let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(lo..hi);

        // threshold is in [lo, hi), so both sides are non-empty.
        let mut split = 0;
        for k in 0..indices.len() {
            if samples[indices[k]].as_ref()[feature] <= threshold {
                indices.swap(split, k);
                split += 1;
            }
        }

        let (left_idx, right_idx) = indices.split_at_mut(split);
        let left = Self::grow_node(nodes, samples, left_idx, depth + 1, height_limit, n_features, rng);
        let right = Self::grow_node(nodes, samples, right_idx, depth + 1, height_limit, n_features, rng);

        nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    /// Arena invariant: node 0 is the root and children follow their parent.
    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (id, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                threshold,
                left,
                right,
            } = *node
            {
                if feature >= n_features {
                    return Err(format!("node {} splits on feature {} of {}", id, feature, n_features));
                }
                if threshold.is_nan() {
                    return Err(format!("node {} has a NaN threshold", id));
                }
                for child in [left, right] {
                    if child <= id || child >= self.nodes.len() {
                        return Err(format!(
                            "node {} points at child {} outside ({}, {})",
                            id,
                            child,
                            id,
                            self.nodes.len()
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn path_length(&self, x: &[f64]) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes[node] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if x[feature] <= threshold { left } else { right };
                    depth += 1.0;
                }
                Node::Leaf { size } => return depth + average_path_length(size),
            }
        }
    }
}

/// Expected path length of an unsuccessful search in a BST of `n` nodes.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated quantile of `values` (sorted in place).
fn quantile(values: &mut [f64], q: f64) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let pos = q * (values.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    values[lower] + (values[upper] - values[lower]) * frac
}

/// A fitted, frozen isolation forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    params: ForestParams,
    n_features: usize,
    sample_size: usize,
    n_training_samples: usize,
    offset: f64,
    trees: Vec<IsolationTree>,
}

impl IsolationForest {
    /// Fit a forest on `samples`. Every sample must have the same length.
    pub fn fit<S: AsRef<[f64]>>(params: &ForestParams, samples: &[S]) -> Result<Self, DetectError> {
        params.validate()?;
        if samples.len() < 2 {
            return Err(DetectError::InsufficientTrainingData {
                needed: 2,
                have: samples.len(),
            });
        }
        let n_features = samples[0].as_ref().len();
        if n_features == 0 || samples.iter().any(|s| s.as_ref().len() != n_features) {
            return Err(DetectError::InvalidModelParameter(
                "training samples must share a non-zero dimension".to_string(),
            ));
        }

        let n = samples.len();
        let sample_size = params.max_samples.unwrap_or(AUTO_MAX_SAMPLES).min(n);
        let height_limit = (sample_size.max(2) as f64).log2().ceil() as usize;

        let mut rng = StdRng::seed_from_u64(params.random_seed);
        let trees = (0..params.n_estimators)
            .map(|_| {
                let mut indices = rand::seq::index::sample(&mut rng, n, sample_size).into_vec();
                IsolationTree::grow(samples, &mut indices, height_limit, n_features, &mut rng)
            })
            .collect();

        let mut forest = Self {
            params: params.clone(),
            n_features,
            sample_size,
            n_training_samples: n,
            offset: 0.0,
            trees,
        };

        let mut scores: Vec<f64> = samples.iter().map(|s| forest.score_sample(s.as_ref())).collect();
        forest.offset = quantile(&mut scores, params.contamination);
        Ok(forest)
    }

    /// Structural check for a forest that did not come from `fit`. A forest
    /// that passes can be scored without indexing out of bounds or looping.
    pub fn validate(&self) -> Result<(), DetectError> {
        let invalid = |msg: String| -> Result<(), DetectError> {
            Err(DetectError::InvalidModelParameter(msg))
        };
        if self.n_features == 0 {
            return invalid("model has zero features".to_string());
        }
        if self.trees.is_empty() {
            return invalid("model has no trees".to_string());
        }
        if self.sample_size == 0 {
            return invalid("model subsample size is zero".to_string());
        }
        if !self.offset.is_finite() {
            return invalid(format!("model offset {} is not finite", self.offset));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            if let Err(msg) = tree.validate(self.n_features) {
                return invalid(format!("tree {}: {}", i, msg));
            }
        }
        Ok(())
    }

    /// Negated anomaly score in [-1, 0); lower means more abnormal.
    pub fn score_sample(&self, x: &[f64]) -> f64 {
        let mean_depth =
            self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64;
        -(2f64.powf(-mean_depth / average_path_length(self.sample_size)))
    }

    /// Score shifted so that the contamination share of training data is negative.
    pub fn decision_function(&self, x: &[f64]) -> f64 {
        self.score_sample(x) - self.offset
    }

    pub fn is_outlier(&self, x: &[f64]) -> bool {
        self.decision_function(x) < 0.0
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_training_samples(&self) -> usize {
        self.n_training_samples
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }
}
