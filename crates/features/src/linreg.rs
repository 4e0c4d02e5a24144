//! Rolling-window simple linear regression.
//!
//! Fits `y = slope * x + intercept` by ordinary least squares over every
//! window of `w` consecutive samples, using only the window sums
//! `n, Σx, Σy, Σx², Σxy`.

use forecast_core::{Error, Result};

use crate::window::{window_count, window_sum};

/// Per-window OLS coefficients, both of length `N - w + 1`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WindowFit {
    pub slope: Vec<f64>,
    pub intercept: Vec<f64>,
}

impl WindowFit {
    /// Number of windows.
    pub fn len(&self) -> usize {
        self.slope.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slope.is_empty()
    }
}

/// Minimum number of window starts sharing one anchor.
const MIN_BLOCK: usize = 64;

/// Rolling OLS fit of `y` on `x`.
///
/// A sample is used only if both `x` and `y` are finite there. Windows with
/// fewer than two usable samples, or with no spread in `x`, yield NaN for
/// both coefficients. The inputs are not modified.
///
/// Windows are fitted in blocks of `max(w, 64)` consecutive starts. Each
/// block sums its own rows shifted by the block's first usable sample, so
/// the sums stay on the scale of a few windows however long the series is
/// and however far the timestamps sit from zero. Slope is shift-invariant
/// and the intercept is shifted back.
pub fn window_lin_reg(x: &[f64], y: &[f64], w: usize) -> Result<WindowFit> {
    if x.len() != y.len() {
        return Err(Error::input_shape(format!(
            "regression series differ in length: {} vs {}",
            x.len(),
            y.len()
        )));
    }
    if w == 0 || w > x.len() {
        return Ok(WindowFit::default());
    }

    let windows = x.len() - w + 1;
    let block = w.max(MIN_BLOCK);
    let mut fit = WindowFit {
        slope: Vec::with_capacity(windows),
        intercept: Vec::with_capacity(windows),
    };

    let mut start = 0;
    while start < windows {
        let take = block.min(windows - start);
        let rows = start..start + take + w - 1;
        fit_block(&x[rows.clone()], &y[rows], w, &mut fit);
        start += take;
    }
    Ok(fit)
}

/// Fit every window of one block, appending to `fit`.
fn fit_block(x: &[f64], y: &[f64], w: usize, fit: &mut WindowFit) {
    let valid: Vec<bool> = x
        .iter()
        .zip(y)
        .map(|(a, b)| a.is_finite() && b.is_finite())
        .collect();

    let (x0, y0) = x
        .iter()
        .zip(y)
        .zip(&valid)
        .find(|(_, &ok)| ok)
        .map(|((&a, &b), _)| (a, b))
        .unwrap_or((0.0, 0.0));

    let xs: Vec<f64> = x
        .iter()
        .zip(&valid)
        .map(|(&a, &ok)| if ok { a - x0 } else { f64::NAN })
        .collect();
    let ys: Vec<f64> = y
        .iter()
        .zip(&valid)
        .map(|(&b, &ok)| if ok { b - y0 } else { f64::NAN })
        .collect();
    let x2: Vec<f64> = xs.iter().map(|a| a * a).collect();
    let xy: Vec<f64> = xs.iter().zip(&ys).map(|(a, b)| a * b).collect();

    let n = window_count(&valid, w);
    let sx = window_sum(&xs, w);
    let sy = window_sum(&ys, w);
    let sx2 = window_sum(&x2, w);
    let sxy = window_sum(&xy, w);

    for i in 0..n.len() {
        let (slope, intercept) = solve(n[i], sx[i], sy[i], sx2[i], sxy[i]);
        fit.slope.push(slope);
        // Undo the shift: y - y0 = s (x - x0) + b'  =>  y = s x + (b' + y0 - s x0).
        fit.intercept.push(intercept + y0 - slope * x0);
    }
}

/// Closed-form OLS from window sums; NaN pair when not computable.
#[inline]
fn solve(n: f64, sx: f64, sy: f64, sx2: f64, sxy: f64) -> (f64, f64) {
    if n < 2.0 {
        return (f64::NAN, f64::NAN);
    }
    let slope = (n * sxy - sx * sy) / (n * sx2 - sx * sx);
    if !slope.is_finite() {
        return (f64::NAN, f64::NAN);
    }
    (slope, (sy - slope * sx) / n)
}
