//! Orchestration for the order-book forecaster.
//!
//! Wires loading, feature building and the model facade into the three
//! pipeline entry points used by the `lob-forecast` binary.

pub mod logging;
pub mod pipeline;

pub use pipeline::{build_features, evaluate, forecast, train, EvaluationReport};
