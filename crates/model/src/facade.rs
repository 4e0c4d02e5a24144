//! Model facade.
//!
//! [`Regressor`] is the narrow seam between the pipeline and a learner.
//! [`ModelFacade`] wraps any regressor with input validation, the feature
//! width check and logging, so learners only deal with clean inputs.

use std::fs;
use std::path::Path;

use forecast_core::{Config, Device, Error, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use tracing::{debug, info, warn};

use crate::booster::GradientBoostedRegressor;

/// Held-out rows monitored during training.
#[derive(Debug, Clone, Copy)]
pub struct EvalSet<'a> {
    pub x: ArrayView2<'a, f64>,
    pub y: ArrayView1<'a, f64>,
}

/// A trainable, persistable regression model.
pub trait Regressor: Sized {
    fn fit(
        &mut self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        eval_set: Option<EvalSet<'_>>,
    ) -> Result<()>;

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>>;

    /// Width of the training matrix, `None` before the first fit.
    fn feature_count(&self) -> Option<usize>;

    fn save(&self, path: &Path) -> Result<()>;

    fn load(path: &Path) -> Result<Self>;
}

/// Validated access to a [`Regressor`].
#[derive(Debug, Clone)]
pub struct ModelFacade<R = GradientBoostedRegressor> {
    regressor: R,
}

impl ModelFacade<GradientBoostedRegressor> {
    /// Gradient-boosted learner configured from `config.model`.
    pub fn from_config(config: &Config) -> Self {
        if config.device == Device::Gpu {
            warn!("GPU training is not available; running on CPU");
        }
        Self::new(GradientBoostedRegressor::new(config.model.clone()))
    }
}

impl<R: Regressor> ModelFacade<R> {
    pub fn new(regressor: R) -> Self {
        Self { regressor }
    }

    pub fn regressor(&self) -> &R {
        &self.regressor
    }

    pub fn is_trained(&self) -> bool {
        self.regressor.feature_count().is_some()
    }

    pub fn fit(
        &mut self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        eval_set: Option<EvalSet<'_>>,
    ) -> Result<()> {
        check_training_pair(x, y, "training")?;
        if let Some(eval) = eval_set {
            check_training_pair(eval.x, eval.y, "evaluation")?;
            if eval.x.ncols() != x.ncols() {
                return Err(Error::input_shape(format!(
                    "evaluation set has {} features, training set {}",
                    eval.x.ncols(),
                    x.ncols()
                )));
            }
        }

        info!(
            rows = x.nrows(),
            features = x.ncols(),
            eval_rows = eval_set.map_or(0, |e| e.y.len()),
            "fitting model"
        );
        self.regressor.fit(x, y, eval_set)
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let expected = self
            .regressor
            .feature_count()
            .ok_or_else(|| Error::model("model is not trained"))?;
        if x.ncols() != expected {
            return Err(Error::input_shape(format!(
                "feature matrix has {} columns, model was trained on {expected}",
                x.ncols()
            )));
        }
        debug!(rows = x.nrows(), "predicting");
        self.regressor.predict(x)
    }

    /// Write the model, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::persistence(parent, e))?;
        }
        self.regressor.save(path)?;
        info!(path = %path.display(), "model saved");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let regressor = R::load(path)?;
        info!(
            path = %path.display(),
            features = ?regressor.feature_count(),
            "model loaded"
        );
        Ok(Self::new(regressor))
    }
}

/// Non-empty matrix, one finite target per row.
fn check_training_pair(x: ArrayView2<f64>, y: ArrayView1<f64>, role: &str) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(Error::input_shape(format!(
            "{role} matrix is empty ({} x {})",
            x.nrows(),
            x.ncols()
        )));
    }
    if x.nrows() != y.len() {
        return Err(Error::input_shape(format!(
            "{role} matrix has {} rows but {} targets",
            x.nrows(),
            y.len()
        )));
    }
    if let Some(i) = y.iter().position(|v| !v.is_finite()) {
        return Err(Error::input_shape(format!("{role} target {i} is not finite")));
    }
    Ok(())
}
