//! Feature computation for the order-book forecaster.
//!
//! This crate handles:
//! - Rolling window sums and rolling linear regression
//! - Per-snapshot order-book features (mid, spreads, volume imbalance)
//! - Last-trade features aligned to snapshots
//! - Trend extrapolation over several window sizes

pub mod book;
pub mod engine;
pub mod layout;
pub mod linreg;
pub mod window;

pub use engine::{FeatureBuilder, FeatureSet};
pub use layout::FeatureLayout;
pub use linreg::{window_lin_reg, WindowFit};
pub use window::{window_count, window_sum};
