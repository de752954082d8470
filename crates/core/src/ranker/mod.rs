//! Logistic-regression ranker.
//!
//! Maps a [`FeatureVector`] to the probability that the candidate is the
//! correct answer. Features are standardized with the training mean and
//! standard deviation, then fed through a linear score and a sigmoid. Fitting
//! is deterministic full-batch gradient descent on the L2-regularized log loss.
//!
//! A ranker's expected input width is `weights.len()`. Any ranker restored from
//! disk must pass [`LogisticRanker::check_width`] against [`FEATURE_DIM`]
//! before use; the pipeline retrains on mismatch.

use crate::error::{Error, Result};
use crate::features::{FeatureVector, FEATURE_DIM};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Optimizer settings for [`LogisticRanker::train`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Iteration cap.
    pub max_iterations: usize,
    /// Gradient descent step size (in standardized feature space).
    pub learning_rate: f64,
    /// L2 penalty on weights (not the bias).
    pub l2: f64,
    /// Stop once the gradient's Euclidean norm falls below this.
    pub tolerance: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            learning_rate: 0.5,
            l2: 1e-4,
            tolerance: 1e-6,
        }
    }
}

/// Binary logistic regression over standardized features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRanker {
    /// Weights in standardized space, one per feature.
    pub weights: Vec<f64>,
    pub bias: f64,
    /// Per-feature training mean.
    pub feature_means: Vec<f64>,
    /// Per-feature training standard deviation (1.0 for constant features).
    pub feature_scales: Vec<f64>,
}

impl LogisticRanker {
    /// Fits a ranker on `(features, is_correct_answer)` examples.
    pub fn train(examples: &[(FeatureVector, bool)], config: &TrainConfig) -> Result<Self> {
        if examples.is_empty() {
            return Err(Error::InvalidInput(
                "cannot train ranker on zero examples".into(),
            ));
        }
        let started = Instant::now();
        let n = examples.len() as f64;

        let rows: Vec<[f64; FEATURE_DIM]> = examples
            .iter()
            .map(|(f, _)| f.as_array().map(f64::from))
            .collect();
        let labels: Vec<f64> = examples
            .iter()
            .map(|&(_, y)| if y { 1.0 } else { 0.0 })
            .collect();

        let mut means = [0.0f64; FEATURE_DIM];
        for row in &rows {
            for (m, x) in means.iter_mut().zip(row) {
                *m += x / n;
            }
        }
        let mut scales = [0.0f64; FEATURE_DIM];
        for row in &rows {
            for j in 0..FEATURE_DIM {
                let d = row[j] - means[j];
                scales[j] += d * d / n;
            }
        }
        for s in scales.iter_mut() {
            *s = s.sqrt();
            if *s < 1e-12 {
                *s = 1.0;
            }
        }
        let z: Vec<[f64; FEATURE_DIM]> = rows
            .iter()
            .map(|row| std::array::from_fn(|j| (row[j] - means[j]) / scales[j]))
            .collect();

        let mut w = [0.0f64; FEATURE_DIM];
        let mut b = 0.0f64;
        let mut iterations = 0;
        let mut grad_norm = f64::INFINITY;

        while iterations < config.max_iterations {
            let mut grad_w = [0.0f64; FEATURE_DIM];
            let mut grad_b = 0.0f64;
            for (zi, &yi) in z.iter().zip(&labels) {
                let err = sigmoid(linear(&w, b, zi)) - yi;
                for j in 0..FEATURE_DIM {
                    grad_w[j] += err * zi[j];
                }
                grad_b += err;
            }
            for j in 0..FEATURE_DIM {
                grad_w[j] = grad_w[j] / n + config.l2 * w[j];
            }
            grad_b /= n;

            grad_norm = (grad_w.iter().map(|g| g * g).sum::<f64>() + grad_b * grad_b).sqrt();
            iterations += 1;
            if grad_norm < config.tolerance {
                break;
            }
            for j in 0..FEATURE_DIM {
                w[j] -= config.learning_rate * grad_w[j];
            }
            b -= config.learning_rate * grad_b;
        }

        let ranker = Self {
            weights: w.to_vec(),
            bias: b,
            feature_means: means.to_vec(),
            feature_scales: scales.to_vec(),
        };
        let positives = labels.iter().filter(|&&y| y > 0.5).count();
        tracing::info!(
            examples = examples.len(),
            positives,
            iterations,
            grad_norm,
            log_loss = ranker.log_loss(examples),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Trained ranker"
        );
        tracing::debug!(weights = ?ranker.weights, bias = ranker.bias, "Ranker coefficients");
        Ok(ranker)
    }

    /// Number of features this ranker expects.
    pub fn input_width(&self) -> usize {
        self.weights.len()
    }

    /// Fails unless this ranker expects exactly `expected` features and its
    /// standardization arrays agree with its weights.
    pub fn check_width(&self, expected: usize) -> Result<()> {
        for len in [
            self.weights.len(),
            self.feature_means.len(),
            self.feature_scales.len(),
        ] {
            if len != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: len,
                });
            }
        }
        Ok(())
    }

    /// Probability in \[0, 1\] that the candidate is the answer.
    pub fn predict(&self, features: &FeatureVector) -> f32 {
        let x = features.as_array();
        let mut score = self.bias;
        for j in 0..self.weights.len().min(FEATURE_DIM) {
            let zj = (f64::from(x[j]) - self.feature_means[j]) / self.feature_scales[j];
            score += self.weights[j] * zj;
        }
        sigmoid(score) as f32
    }

    /// `(original_index, probability)` sorted by probability descending.
    /// Equal probabilities keep their input order.
    pub fn rank(&self, candidates: &[FeatureVector]) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = candidates
            .iter()
            .enumerate()
            .map(|(i, f)| (i, self.predict(f)))
            .collect();
        // sort_by is stable
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
    }

    /// Fraction of examples classified correctly at a 0.5 threshold.
    pub fn accuracy(&self, examples: &[(FeatureVector, bool)]) -> f64 {
        if examples.is_empty() {
            return 0.0;
        }
        let correct = examples
            .iter()
            .filter(|(f, y)| (self.predict(f) >= 0.5) == *y)
            .count();
        correct as f64 / examples.len() as f64
    }

    /// Mean negative log-likelihood of the examples.
    pub fn log_loss(&self, examples: &[(FeatureVector, bool)]) -> f64 {
        if examples.is_empty() {
            return 0.0;
        }
        let eps = 1e-12;
        let total: f64 = examples
            .iter()
            .map(|(f, y)| {
                let p = f64::from(self.predict(f)).clamp(eps, 1.0 - eps);
                if *y {
                    -p.ln()
                } else {
                    -(1.0 - p).ln()
                }
            })
            .sum();
        total / examples.len() as f64
    }
}

#[inline]
fn linear(w: &[f64; FEATURE_DIM], b: f64, z: &[f64; FEATURE_DIM]) -> f64 {
    w.iter().zip(z).map(|(wi, zi)| wi * zi).sum::<f64>() + b
}

/// Numerically stable logistic function.
#[inline]
fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}
