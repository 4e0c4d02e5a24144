//! Regression model for the order-book forecaster.
//!
//! This crate handles:
//! - The `Regressor` seam and the validating `ModelFacade`
//! - A native gradient-boosted oblivious-tree learner
//! - Regression metrics (R², MSE, RMSE, MAE)
//! - Unshuffled hold-out splitting

pub mod booster;
pub mod facade;
pub mod metrics;
pub mod quantize;
pub mod split;
pub mod tree;

pub use booster::GradientBoostedRegressor;
pub use facade::{EvalSet, ModelFacade, Regressor};
pub use metrics::{r2_score, RegressionMetrics};
pub use split::{holdout_split, Holdout};
pub use tree::{ObliviousTree, Split};
