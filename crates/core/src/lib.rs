//! Shared vocabulary of the order-book forecasting workspace.
//!
//! Every other crate builds on:
//! - Order-book snapshots, trade records and their column frames
//! - The TOML-backed [`Config`] with learner and feature parameters
//! - The workspace-wide [`Error`] and [`Result`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, Device, FeatureConfig, ModelConfig};
pub use error::{Error, Result};
pub use types::*;
