//! Configuration structures for the forecasting pipeline.
//!
//! A [`Config`] is loaded once at process start and passed explicitly to every
//! stage that needs it.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Deepest tree the learner accepts; leaf tables grow as `2^depth`.
pub const MAX_TREE_DEPTH: u32 = 16;

/// Main configuration for the forecasting pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Order-book/trade file name inside a training folder.
    pub data_filename: String,
    /// Target (forward return) file name inside a training folder.
    pub result_filename: String,
    /// Where the trained model is written and read.
    pub model_path: PathBuf,
    /// Where forecasts are written.
    pub forecast_result_path: PathBuf,
    /// Learner backend selector.
    #[serde(default)]
    pub device: Device,
    /// Learner parameters.
    #[serde(default)]
    pub model: ModelConfig,
    /// Feature pipeline parameters.
    #[serde(default)]
    pub features: FeatureConfig,
}

impl Config {
    /// Load and validate a TOML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML configuration document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every recognized key for sane values.
    pub fn validate(&self) -> Result<()> {
        if self.data_filename.trim().is_empty() {
            return Err(Error::config("data_filename must not be empty"));
        }
        if self.result_filename.trim().is_empty() {
            return Err(Error::config("result_filename must not be empty"));
        }
        if self.model_path.as_os_str().is_empty() {
            return Err(Error::config("model_path must not be empty"));
        }
        if self.forecast_result_path.as_os_str().is_empty() {
            return Err(Error::config("forecast_result_path must not be empty"));
        }
        self.model.validate()?;
        self.features.validate()
    }

    /// Path of the order-book/trade file inside `folder`.
    pub fn data_path(&self, folder: impl AsRef<Path>) -> PathBuf {
        folder.as_ref().join(&self.data_filename)
    }

    /// Path of the target file inside `folder`.
    pub fn result_path(&self, folder: impl AsRef<Path>) -> PathBuf {
        folder.as_ref().join(&self.result_filename)
    }
}

/// Learner backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Device {
    #[default]
    #[serde(rename = "CPU", alias = "cpu")]
    Cpu,
    #[serde(rename = "GPU", alias = "gpu")]
    Gpu,
}

/// Metric reported on the evaluation set during training.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvalMetric {
    #[default]
    R2,
    #[serde(rename = "RMSE")]
    Rmse,
}

/// Gradient-boosted learner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Depth of every (oblivious) tree.
    pub depth: u32,
    /// Number of boosting iterations.
    pub iterations: usize,
    /// Shrinkage applied to each tree.
    pub learning_rate: f64,
    /// Bayesian bootstrap temperature (0 disables bagging).
    pub bagging_temperature: f64,
    /// L2 regularization of leaf values.
    pub l2_leaf_reg: f64,
    /// Maximum number of split borders per feature.
    pub border_count: usize,
    /// Seed for the bootstrap RNG.
    pub random_seed: u64,
    /// Metric logged on the evaluation set.
    pub eval_metric: EvalMetric,
    /// Log training progress every this many iterations (0 = silent).
    pub log_period: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            depth: 6,
            iterations: 500,
            learning_rate: 0.005,
            bagging_temperature: 0.1,
            l2_leaf_reg: 3.0,
            border_count: 254,
            random_seed: 0x1a1a1a1,
            eval_metric: EvalMetric::R2,
            log_period: 10,
        }
    }
}

impl ModelConfig {
    fn validate(&self) -> Result<()> {
        if self.depth == 0 || self.depth > MAX_TREE_DEPTH {
            return Err(Error::config(format!(
                "model.depth must be in 1..={MAX_TREE_DEPTH}, got {}",
                self.depth
            )));
        }
        if self.iterations == 0 {
            return Err(Error::config("model.iterations must be positive"));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(Error::config("model.learning_rate must be a positive number"));
        }
        if !(self.bagging_temperature >= 0.0 && self.bagging_temperature.is_finite()) {
            return Err(Error::config("model.bagging_temperature must be non-negative"));
        }
        if !(self.l2_leaf_reg >= 0.0 && self.l2_leaf_reg.is_finite()) {
            return Err(Error::config("model.l2_leaf_reg must be non-negative"));
        }
        if self.border_count == 0 {
            return Err(Error::config("model.border_count must be positive"));
        }
        Ok(())
    }
}

/// Feature pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Window sizes of the rolling trend fits, in rows.
    pub window_sizes: Vec<usize>,
    /// Look-ahead of the trend prediction, in timestamp units (ms).
    pub horizon_ms: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            window_sizes: vec![5, 10, 20, 30],
            horizon_ms: 30_000.0,
        }
    }
}

impl FeatureConfig {
    fn validate(&self) -> Result<()> {
        if self.window_sizes.is_empty() {
            return Err(Error::config("features.window_sizes must not be empty"));
        }
        if self.window_sizes.contains(&0) {
            return Err(Error::config("features.window_sizes must be positive"));
        }
        let unique: HashSet<_> = self.window_sizes.iter().collect();
        if unique.len() != self.window_sizes.len() {
            return Err(Error::config("features.window_sizes must not repeat"));
        }
        if !self.horizon_ms.is_finite() {
            return Err(Error::config("features.horizon_ms must be finite"));
        }
        Ok(())
    }
}
