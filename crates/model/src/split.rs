//! Unshuffled hold-out splitting.
//!
//! Rows keep their time order: the head of the data trains, the tail tests.

use forecast_core::{Error, Result};
use ndarray::{s, ArrayView1, ArrayView2};

/// Views into the two parts of a hold-out split.
#[derive(Debug, Clone, Copy)]
pub struct Holdout<'a> {
    pub x_train: ArrayView2<'a, f64>,
    pub y_train: ArrayView1<'a, f64>,
    pub x_test: ArrayView2<'a, f64>,
    pub y_test: ArrayView1<'a, f64>,
}

/// Rows assigned to the test part: `ceil(test_fraction * rows)`.
pub fn test_rows(rows: usize, test_fraction: f64) -> usize {
    ((test_fraction * rows as f64).ceil() as usize).min(rows)
}

/// Split `x` and `y` so the last `ceil(test_fraction * n)` rows form the test part.
pub fn holdout_split<'a>(
    x: ArrayView2<'a, f64>,
    y: ArrayView1<'a, f64>,
    test_fraction: f64,
) -> Result<Holdout<'a>> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(Error::config(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        )));
    }
    if x.nrows() != y.len() {
        return Err(Error::input_shape(format!(
            "feature rows ({}) and targets ({}) differ",
            x.nrows(),
            y.len()
        )));
    }

    let rows = y.len();
    let n_test = test_rows(rows, test_fraction);
    let n_train = rows - n_test;
    if n_train == 0 {
        return Err(Error::insufficient_data(format!(
            "{rows} rows leave nothing to train on at test fraction {test_fraction}"
        )));
    }

    Ok(Holdout {
        x_train: x.slice_move(s![..n_train, ..]),
        y_train: y.slice_move(s![..n_train]),
        x_test: x.slice_move(s![n_train.., ..]),
        y_test: y.slice_move(s![n_train..]),
    })
}
