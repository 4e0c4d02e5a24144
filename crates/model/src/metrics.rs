//! Regression quality metrics.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Coefficient of determination `1 - SS_res / SS_tot`.
///
/// A constant target scores 1.0 when predicted exactly and 0.0 otherwise.
/// Empty or mismatched inputs give NaN.
pub fn r2_score(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> f64 {
    if y_true.is_empty() || y_true.len() != y_pred.len() {
        return f64::NAN;
    }
    let mean = y_true.iter().mean();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Root mean squared error; NaN on empty or mismatched inputs.
pub fn rmse(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> f64 {
    RegressionMetrics::compute(y_true, y_pred).rmse
}

/// Regression metrics of one prediction run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub r2: f64,
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
}

impl RegressionMetrics {
    pub fn compute(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Self {
        if y_true.is_empty() || y_true.len() != y_pred.len() {
            return Self {
                r2: f64::NAN,
                mse: f64::NAN,
                rmse: f64::NAN,
                mae: f64::NAN,
            };
        }

        let errors: Vec<f64> = y_true.iter().zip(y_pred.iter()).map(|(t, p)| t - p).collect();
        let mse = errors.iter().map(|e| e * e).mean();
        let mae = errors.iter().map(|e| e.abs()).mean();

        Self {
            r2: r2_score(y_true, y_pred),
            mse,
            rmse: mse.sqrt(),
            mae,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_perfect_and_mean_predictions() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(r2_score(y.view(), y.view()), 1.0);
        let mean = array![2.5, 2.5, 2.5, 2.5];
        assert_relative_eq!(r2_score(y.view(), mean.view()), 0.0);
    }

    #[test]
    fn test_worse_than_mean_is_negative() {
        let y = array![1.0, 2.0, 3.0];
        let p = array![3.0, 2.0, 1.0];
        assert_relative_eq!(r2_score(y.view(), p.view()), -3.0);
    }

    #[test]
    fn test_constant_target() {
        let y = array![0.5, 0.5];
        assert_eq!(r2_score(y.view(), y.view()), 1.0);
        assert_eq!(r2_score(y.view(), array![0.5, 0.6].view()), 0.0);
    }

    #[test]
    fn test_degenerate_inputs_are_nan() {
        let empty = ndarray::Array1::<f64>::zeros(0);
        assert!(r2_score(empty.view(), empty.view()).is_nan());
        assert!(r2_score(array![1.0].view(), array![1.0, 2.0].view()).is_nan());
        assert!(RegressionMetrics::compute(empty.view(), empty.view()).mse.is_nan());
    }

    #[test]
    fn test_error_metrics() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        let p = array![1.0, 3.0, 3.0, 2.0];
        let m = RegressionMetrics::compute(y.view(), p.view());
        assert_relative_eq!(m.mse, 5.0 / 4.0);
        assert_relative_eq!(m.rmse, (5.0f64 / 4.0).sqrt());
        assert_relative_eq!(m.mae, 3.0 / 4.0);
        assert_relative_eq!(rmse(y.view(), p.view()), m.rmse);
    }
}
