//! Isolation forest outlier model.
//!
//! Points that random axis-aligned splits isolate quickly (short average path
//! length) are outliers. Scores follow the usual decision-function convention:
//! `score = -2^(-E[h(x)] / c(psi)) - offset`, where `offset` is the
//! `contamination` percentile of the training scores. Negative means ANOMALY.

use ndarray::Array2;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ModelConfig;
use crate::core::{OutlierLabel, OutlierVerdict};
use crate::error::{DetectorError, Result};
use crate::features::{FeatureRow, TrainingMatrix};
use crate::model::OutlierModel;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsolationParams {
    pub n_estimators: usize,
    /// Upper bound on the per-tree sub-sample; the effective size is `min(max_samples, rows)`.
    pub max_samples: usize,
    pub contamination: f64,
    pub seed: u64,
}

impl Default for IsolationParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.1,
            seed: 42,
        }
    }
}

impl From<&ModelConfig> for IsolationParams {
    fn from(config: &ModelConfig) -> Self {
        Self {
            n_estimators: config.n_estimators,
            max_samples: config.max_samples,
            contamination: config.contamination,
            seed: config.seed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IsolationTree {
    Internal {
        feature: usize,
        threshold: f64,
        /// Samples with `x[feature] < threshold`.
        left: Box<IsolationTree>,
        right: Box<IsolationTree>,
    },
    External {
        size: usize,
    },
}

impl IsolationTree {
    fn build(
        x: &Array2<f64>,
        indices: &[usize],
        height: usize,
        max_height: usize,
        rng: &mut impl Rng,
    ) -> Self {
        let n_samples = indices.len();
        if height >= max_height || n_samples <= 1 {
            return IsolationTree::External { size: n_samples };
        }

        // Only features that still vary inside this node can split it.
        let candidates: Vec<(usize, f64, f64)> = (0..x.ncols())
            .filter_map(|feature| {
                let (min, max) = indices.iter().fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi), &i| (lo.min(x[[i, feature]]), hi.max(x[[i, feature]])),
                );
                (max > min).then_some((feature, min, max))
            })
            .collect();
        if candidates.is_empty() {
            return IsolationTree::External { size: n_samples };
        }

        let (feature, min, max) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(min..max);

        let (left, right): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| x[[i, feature]] < threshold);
        if left.is_empty() || right.is_empty() {
            return IsolationTree::External { size: n_samples };
        }

        IsolationTree::Internal {
            feature,
            threshold,
            left: Box::new(Self::build(x, &left, height + 1, max_height, rng)),
            right: Box::new(Self::build(x, &right, height + 1, max_height, rng)),
        }
    }

    fn path_length(&self, sample: &[f64], depth: usize) -> f64 {
        match self {
            IsolationTree::External { size } => depth as f64 + average_path_length(*size),
            IsolationTree::Internal {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] < *threshold {
                    left.path_length(sample, depth + 1)
                } else {
                    right.path_length(sample, depth + 1)
                }
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points, c(n).
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

/// Linear-interpolated percentile, `q` in [0, 1]. `values` must be non-empty.
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    params: IsolationParams,
    trees: Vec<IsolationTree>,
    n_features: Option<usize>,
    sample_size: usize,
    offset: f64,
}

impl IsolationForest {
    pub fn new(params: IsolationParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            n_features: None,
            sample_size: 0,
            offset: 0.0,
        }
    }

    /// Decision offset derived from `contamination` on the training data.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Negated isolation score; lower means more anomalous.
    fn raw_score(&self, sample: &[f64]) -> f64 {
        let mean_path = self
            .trees
            .iter()
            .map(|tree| tree.path_length(sample, 0))
            .sum::<f64>()
            / self.trees.len() as f64;
        // c(1) is 0; every c(n) for n >= 2 is at least 1.
        let norm = average_path_length(self.sample_size).max(1.0);
        -(2.0_f64.powf(-mean_path / norm))
    }

    fn validate_params(&self) -> Result<()> {
        let c = self.params.contamination;
        if !(c > 0.0 && c < 1.0) {
            return Err(DetectorError::InvalidParameter(format!(
                "contamination must be in (0, 1), got {c}"
            )));
        }
        if self.params.n_estimators == 0 {
            return Err(DetectorError::InvalidParameter(
                "n_estimators must be at least 1".into(),
            ));
        }
        if self.params.max_samples == 0 {
            return Err(DetectorError::InvalidParameter(
                "max_samples must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new(IsolationParams::default())
    }
}

impl OutlierModel for IsolationForest {
    fn name(&self) -> &str {
        "isolation_forest"
    }

    fn fit(&mut self, matrix: &TrainingMatrix) -> Result<()> {
        self.validate_params()?;
        let x = &matrix.data;
        let n_rows = x.nrows();
        if n_rows == 0 || x.ncols() == 0 {
            return Err(DetectorError::DataUnavailable(format!(
                "cannot fit on a {}x{} matrix",
                n_rows,
                x.ncols()
            )));
        }

        let sample_size = self.params.max_samples.min(n_rows);
        let max_height = (sample_size.max(2) as f64).log2().ceil() as usize;
        let mut rng = ChaCha8Rng::seed_from_u64(self.params.seed);

        let mut trees = Vec::with_capacity(self.params.n_estimators);
        for _ in 0..self.params.n_estimators {
            let indices = rand::seq::index::sample(&mut rng, n_rows, sample_size).into_vec();
            trees.push(IsolationTree::build(x, &indices, 0, max_height, &mut rng));
        }

        self.trees = trees;
        self.sample_size = sample_size;
        self.n_features = Some(x.ncols());
        self.offset = 0.0;

        let train_scores: Vec<f64> = x
            .rows()
            .into_iter()
            .map(|row| self.raw_score(&row.to_vec()))
            .collect();
        self.offset = percentile(&train_scores, self.params.contamination);

        debug!(
            trees = self.trees.len(),
            sample_size,
            max_height,
            offset = self.offset,
            "Isolation forest fitted"
        );
        Ok(())
    }

    fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    fn score(&self, row: &FeatureRow) -> Result<OutlierVerdict> {
        let Some(expected) = self.n_features else {
            return Err(DetectorError::InvalidParameter("model is not fitted".into()));
        };
        if self.trees.is_empty() {
            return Err(DetectorError::InvalidParameter("model has no trees".into()));
        }
        if row.len() != expected {
            return Err(DetectorError::SchemaMismatch(format!(
                "feature row has {} columns, model was fit on {expected}",
                row.len()
            )));
        }

        let score = self.raw_score(&row.values) - self.offset;
        let label = if score < 0.0 {
            OutlierLabel::Anomaly
        } else {
            OutlierLabel::Normal
        };
        Ok(OutlierVerdict { label, score })
    }
}
