//! Gradient-boosted oblivious trees with RMSE loss.
//!
//! Training starts from the target mean. Each iteration draws Bayesian
//! bootstrap weights, grows one oblivious tree on the residuals level by
//! level, and adds its shrunken leaf values to the running prediction.
//! Split search evaluates each feature's quantized borders in parallel and
//! reduces the candidates in feature order, so the fitted model depends only
//! on the data and the seed.

use std::fs;
use std::path::Path;

use forecast_core::config::{EvalMetric, MAX_TREE_DEPTH};
use forecast_core::{Error, ModelConfig, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::{debug, info};

use crate::facade::{EvalSet, Regressor};
use crate::metrics::{r2_score, rmse};
use crate::quantize::QuantizedFeatures;
use crate::tree::{ObliviousTree, Split};

/// Serialized form of a trained booster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ModelArtifact {
    params: ModelConfig,
    base_prediction: f64,
    feature_count: usize,
    trees: Vec<ObliviousTree>,
}

#[derive(Debug, Clone, PartialEq)]
struct Ensemble {
    base_prediction: f64,
    feature_count: usize,
    trees: Vec<ObliviousTree>,
}

impl Ensemble {
    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        self.trees
            .iter()
            .fold(self.base_prediction, |acc, t| acc + t.predict_row(row))
    }
}

/// Best split found for one feature at one level.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    feature: usize,
    border: usize,
    score: f64,
}

/// Eval-set score tracking.
#[derive(Debug, Clone, Copy)]
struct BestIteration {
    iteration: usize,
    score: f64,
}

/// Native gradient-boosted regressor.
#[derive(Debug, Clone)]
pub struct GradientBoostedRegressor {
    params: ModelConfig,
    ensemble: Option<Ensemble>,
}

impl GradientBoostedRegressor {
    pub fn new(params: ModelConfig) -> Self {
        Self {
            params,
            ensemble: None,
        }
    }

    pub fn params(&self) -> &ModelConfig {
        &self.params
    }

    /// Number of fitted trees.
    pub fn tree_count(&self) -> usize {
        self.ensemble.as_ref().map_or(0, |e| e.trees.len())
    }

    fn bootstrap_weights(&self, rng: &mut ChaCha8Rng, rows: usize) -> Vec<f64> {
        let temperature = self.params.bagging_temperature;
        if temperature == 0.0 {
            return vec![1.0; rows];
        }
        (0..rows)
            .map(|_| {
                // 1 - [0, 1) keeps u in (0, 1], so the log is finite.
                let u = 1.0 - rng.gen::<f64>();
                (-u.ln()).powf(temperature)
            })
            .collect()
    }

    /// Grow one tree on the weighted residuals. `leaf_of` receives each
    /// training row's leaf.
    fn grow_tree(
        &self,
        features: &QuantizedFeatures,
        residuals: &[f64],
        weights: &[f64],
        leaf_of: &mut [usize],
    ) -> ObliviousTree {
        leaf_of.iter_mut().for_each(|l| *l = 0);
        let mut splits = Vec::with_capacity(self.params.depth as usize);

        for level in 0..self.params.depth as usize {
            let leaves = 1usize << level;
            let assigned: &[usize] = leaf_of;
            let candidates: Vec<Option<Candidate>> = (0..features.feature_count())
                .into_par_iter()
                .map(|f| self.best_border(features, f, leaves, assigned, residuals, weights))
                .collect();

            // Feature order breaks ties.
            let best = candidates
                .into_iter()
                .flatten()
                .fold(None, |best: Option<Candidate>, c| match best {
                    Some(b) if b.score >= c.score => Some(b),
                    _ => Some(c),
                });
            let Some(best) = best else {
                debug!(level, "no usable split; tree stops early");
                break;
            };

            let bins = features.bins(best.feature);
            for (leaf, &bin) in leaf_of.iter_mut().zip(bins) {
                if bin as usize > best.border {
                    *leaf |= 1 << level;
                }
            }
            splits.push(Split {
                feature: best.feature,
                threshold: features.borders(best.feature)[best.border],
            });
        }

        let leaves = 1usize << splits.len();
        let mut sum_w = vec![0.0; leaves];
        let mut sum_g = vec![0.0; leaves];
        for ((&leaf, &r), &w) in leaf_of.iter().zip(residuals).zip(weights) {
            sum_w[leaf] += w;
            sum_g[leaf] += w * r;
        }
        let l2 = self.params.l2_leaf_reg;
        let lr = self.params.learning_rate;
        let leaf_values = sum_g
            .iter()
            .zip(&sum_w)
            .map(|(&g, &w)| if w + l2 > 0.0 { lr * g / (w + l2) } else { 0.0 })
            .collect();

        ObliviousTree {
            splits,
            leaf_values,
        }
    }

    /// Best border of `feature` given the current leaf assignment.
    ///
    /// The score of a border is `Σ_leaf (G_l² / (W_l + λ) + G_r² / (W_r + λ))`
    /// over the children it creates. Ties keep the lowest border.
    fn best_border(
        &self,
        features: &QuantizedFeatures,
        feature: usize,
        leaves: usize,
        leaf_of: &[usize],
        residuals: &[f64],
        weights: &[f64],
    ) -> Option<Candidate> {
        let borders = features.borders(feature);
        if borders.is_empty() {
            return None;
        }
        let bins = borders.len() + 1;
        let l2 = self.params.l2_leaf_reg;

        let mut hist_w = vec![0.0; leaves * bins];
        let mut hist_g = vec![0.0; leaves * bins];
        for (((&leaf, &bin), &r), &w) in leaf_of
            .iter()
            .zip(features.bins(feature))
            .zip(residuals)
            .zip(weights)
        {
            let cell = leaf * bins + bin as usize;
            hist_w[cell] += w;
            hist_g[cell] += w * r;
        }

        let term = |g: f64, w: f64| if w + l2 > 0.0 { g * g / (w + l2) } else { 0.0 };
        let mut scores = vec![0.0; borders.len()];
        for leaf in 0..leaves {
            let row_w = &hist_w[leaf * bins..(leaf + 1) * bins];
            let row_g = &hist_g[leaf * bins..(leaf + 1) * bins];
            let total_w: f64 = row_w.iter().sum();
            let total_g: f64 = row_g.iter().sum();

            let (mut left_w, mut left_g) = (0.0, 0.0);
            for (k, score) in scores.iter_mut().enumerate() {
                left_w += row_w[k];
                left_g += row_g[k];
                *score += term(left_g, left_w) + term(total_g - left_g, total_w - left_w);
            }
        }

        scores
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_finite())
            .fold(None, |best: Option<Candidate>, (border, &score)| match best {
                Some(b) if b.score >= score => Some(b),
                _ => Some(Candidate {
                    feature,
                    border,
                    score,
                }),
            })
    }

    fn eval_score(&self, y: ArrayView1<f64>, pred: &Array1<f64>) -> f64 {
        match self.params.eval_metric {
            EvalMetric::R2 => r2_score(y, pred.view()),
            EvalMetric::Rmse => rmse(y, pred.view()),
        }
    }

    fn improves(&self, score: f64, best: Option<BestIteration>) -> bool {
        match best {
            None => score.is_finite(),
            Some(b) => match self.params.eval_metric {
                EvalMetric::R2 => score > b.score,
                EvalMetric::Rmse => score < b.score,
            },
        }
    }
}

impl Regressor for GradientBoostedRegressor {
    fn fit(
        &mut self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        eval_set: Option<EvalSet<'_>>,
    ) -> Result<()> {
        let rows = x.nrows();
        let feature_count = x.ncols();
        info!(
            rows,
            features = feature_count,
            iterations = self.params.iterations,
            depth = self.params.depth,
            learning_rate = self.params.learning_rate,
            "training gradient-boosted trees"
        );

        let quantized = QuantizedFeatures::new(x, self.params.border_count);
        let base_prediction = y.iter().mean();
        if !base_prediction.is_finite() {
            return Err(Error::model("target mean is not finite"));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.params.random_seed);
        let mut pred = vec![base_prediction; rows];
        let mut residuals = vec![0.0; rows];
        let mut leaf_of = vec![0usize; rows];
        let mut eval_pred = eval_set.map(|e| Array1::from_elem(e.y.len(), base_prediction));
        let mut best: Option<BestIteration> = None;
        let mut trees = Vec::with_capacity(self.params.iterations);

        for iteration in 1..=self.params.iterations {
            for ((r, &t), &p) in residuals.iter_mut().zip(y.iter()).zip(&pred) {
                *r = t - p;
            }
            let weights = self.bootstrap_weights(&mut rng, rows);
            let tree = self.grow_tree(&quantized, &residuals, &weights, &mut leaf_of);

            for (p, &leaf) in pred.iter_mut().zip(&leaf_of) {
                *p += tree.leaf_values[leaf];
            }

            if let (Some(eval), Some(eval_pred)) = (eval_set, eval_pred.as_mut()) {
                for (p, row) in eval_pred.iter_mut().zip(eval.x.rows()) {
                    *p += tree.predict_row(row);
                }
                let score = self.eval_score(eval.y, eval_pred);
                if self.improves(score, best) {
                    best = Some(BestIteration { iteration, score });
                }
                if self.params.log_period > 0 && iteration % self.params.log_period == 0 {
                    let train = r2_score(y, ArrayView1::from(&pred[..]));
                    info!(iteration, train_r2 = train, eval = score, "boosting progress");
                }
            } else if self.params.log_period > 0 && iteration % self.params.log_period == 0 {
                let train = r2_score(y, ArrayView1::from(&pred[..]));
                info!(iteration, train_r2 = train, "boosting progress");
            }

            trees.push(tree);
        }

        if let Some(b) = best {
            info!(
                best_iteration = b.iteration,
                best_score = b.score,
                metric = ?self.params.eval_metric,
                "evaluation set best iteration"
            );
        }

        self.ensemble = Some(Ensemble {
            base_prediction,
            feature_count,
            trees,
        });
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let ensemble = self
            .ensemble
            .as_ref()
            .ok_or_else(|| Error::model("model is not trained"))?;
        if x.ncols() != ensemble.feature_count {
            return Err(Error::input_shape(format!(
                "model expects {} features, got {}",
                ensemble.feature_count,
                x.ncols()
            )));
        }
        let values: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| ensemble.predict_row(x.row(i)))
            .collect();
        Ok(Array1::from(values))
    }

    fn feature_count(&self) -> Option<usize> {
        self.ensemble.as_ref().map(|e| e.feature_count)
    }

    fn save(&self, path: &Path) -> Result<()> {
        let ensemble = self
            .ensemble
            .as_ref()
            .ok_or_else(|| Error::model("cannot save an untrained model"))?;
        let artifact = ModelArtifact {
            params: self.params.clone(),
            base_prediction: ensemble.base_prediction,
            feature_count: ensemble.feature_count,
            trees: ensemble.trees.clone(),
        };
        let json = serde_json::to_string(&artifact).map_err(|e| Error::persistence(path, e))?;
        fs::write(path, json).map_err(|e| Error::persistence(path, e))?;
        Ok(())
    }

    fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| Error::persistence(path, e))?;
        let artifact: ModelArtifact =
            serde_json::from_str(&json).map_err(|e| Error::persistence(path, e))?;

        let leaf_count_ok = artifact
            .trees
            .iter()
            .all(|t| t.depth() <= MAX_TREE_DEPTH as usize && t.leaf_values.len() == 1 << t.depth());
        let features_ok = artifact
            .trees
            .iter()
            .filter_map(ObliviousTree::max_feature)
            .all(|f| f < artifact.feature_count);
        if !leaf_count_ok || !features_ok {
            return Err(Error::persistence(path, "inconsistent tree structure"));
        }

        Ok(Self {
            params: artifact.params,
            ensemble: Some(Ensemble {
                base_prediction: artifact.base_prediction,
                feature_count: artifact.feature_count,
                trees: artifact.trees,
            }),
        })
    }
}
