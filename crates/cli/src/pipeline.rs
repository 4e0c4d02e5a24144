//! Train, evaluate and forecast pipelines.
//!
//! Every entry point takes the loaded [`Config`] explicitly. Rows of the
//! feature matrix and of the target are matched by position; a length
//! mismatch is an input error.

use std::path::Path;

use forecast_core::{Config, Error, Result};
use forecast_features::{FeatureBuilder, FeatureSet};
use forecast_ingestion::{load_market_data, write_forecast, TargetLoader};
use forecast_model::{
    holdout_split, EvalSet, GradientBoostedRegressor, ModelFacade, RegressionMetrics,
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::Serialize;
use tracing::{info, instrument};

/// Share of rows held out from training in `evaluate`.
pub const HOLDOUT_FRACTION: f64 = 0.4;

/// Share of the held-out rows used as the test part; the rest validates.
pub const TEST_FRACTION_OF_HOLDOUT: f64 = 0.5;

/// Scores of an evaluation run on its three unshuffled parts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub train: RegressionMetrics,
    pub validation: RegressionMetrics,
    pub test: RegressionMetrics,
    pub train_rows: usize,
    pub validation_rows: usize,
    pub test_rows: usize,
}

impl EvaluationReport {
    pub fn r2_train(&self) -> f64 {
        self.train.r2
    }

    pub fn r2_val(&self) -> f64 {
        self.validation.r2
    }

    pub fn r2_test(&self) -> f64 {
        self.test.r2
    }
}

/// Load a data file and compute its feature matrix.
pub fn build_features(config: &Config, data_path: &Path) -> Result<FeatureSet> {
    let market = load_market_data(data_path)?;
    FeatureBuilder::new(&config.features).build(&market.book, &market.trades)
}

/// Features and target of a training folder, checked for equal row counts.
fn training_data(config: &Config, folder: &Path) -> Result<(Array2<f64>, Array1<f64>)> {
    let (_, x) = build_features(config, &config.data_path(folder))?.into_parts();
    let y = TargetLoader::load(config.result_path(folder))?;
    if x.nrows() != y.len() {
        return Err(Error::input_shape(format!(
            "{} feature rows but {} targets",
            x.nrows(),
            y.len()
        )));
    }
    Ok((x, y))
}

/// Fit on every row of `folder` and save the model to `config.model_path`.
#[instrument(skip_all, fields(folder = %folder.display()))]
pub fn train(config: &Config, folder: &Path) -> Result<ModelFacade> {
    let (x, y) = training_data(config, folder)?;

    let mut model = ModelFacade::from_config(config);
    model.fit(x.view(), y.view(), None)?;
    model.save(&config.model_path)?;
    Ok(model)
}

/// Fit on the first 60% of `folder`, monitor the next 20% and score all
/// three parts, without shuffling.
#[instrument(skip_all, fields(folder = %folder.display()))]
pub fn evaluate(config: &Config, folder: &Path) -> Result<EvaluationReport> {
    let (x, y) = training_data(config, folder)?;

    let first = holdout_split(x.view(), y.view(), HOLDOUT_FRACTION)?;
    let second = holdout_split(first.x_test, first.y_test, TEST_FRACTION_OF_HOLDOUT)?;
    let (x_val, y_val) = (second.x_train, second.y_train);
    let (x_test, y_test) = (second.x_test, second.y_test);

    let mut model = ModelFacade::from_config(config);
    model.fit(
        first.x_train,
        first.y_train,
        Some(EvalSet {
            x: x_val,
            y: y_val,
        }),
    )?;

    let score = |xs: ArrayView2<f64>, ys: ArrayView1<f64>| -> Result<RegressionMetrics> {
        let predicted = model.predict(xs)?;
        Ok(RegressionMetrics::compute(ys, predicted.view()))
    };
    let report = EvaluationReport {
        train: score(first.x_train, first.y_train)?,
        validation: score(x_val, y_val)?,
        test: score(x_test, y_test)?,
        train_rows: first.y_train.len(),
        validation_rows: y_val.len(),
        test_rows: y_test.len(),
    };

    info!(
        "r2_train = {:.5}, r2_val = {:.5}, r2_test = {:.5}",
        report.r2_train(),
        report.r2_val(),
        report.r2_test()
    );
    Ok(report)
}

/// Predict every row of `data_path` with the saved model and write the
/// forecast to `config.forecast_result_path`.
#[instrument(skip_all, fields(data = %data_path.display()))]
pub fn forecast(config: &Config, data_path: &Path) -> Result<Array1<f64>> {
    let (ts, x) = build_features(config, data_path)?.into_parts();
    let model = ModelFacade::<GradientBoostedRegressor>::load(&config.model_path)?;
    let predictions = model.predict(x.view())?;
    write_forecast(&config.forecast_result_path, &ts, &predictions)?;
    Ok(predictions)
}
