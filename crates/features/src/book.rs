//! Per-snapshot order-book features.
//!
//! All functions work row-wise on `(snapshots, levels)` matrices. Every
//! ratio goes through [`safe_div`], so a zero denominator gives NaN and never
//! an infinity.

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};

/// Levels used for the normalized price spreads.
pub const PRICE_SPREAD_LEVELS: usize = 10;

/// Levels used for the volume differences and ratios.
pub const VOLUME_LEVELS: usize = 7;

/// `num / den`, NaN when `den` is zero.
#[inline]
pub fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        f64::NAN
    } else {
        num / den
    }
}

/// Minimum of a row; NaN if any element is NaN.
fn nan_min(row: ArrayView1<f64>) -> f64 {
    row.iter().fold(f64::INFINITY, |acc, &v| {
        if acc.is_nan() || v.is_nan() {
            f64::NAN
        } else {
            acc.min(v)
        }
    })
}

/// Maximum of a row; NaN if any element is NaN.
fn nan_max(row: ArrayView1<f64>) -> f64 {
    row.iter().fold(f64::NEG_INFINITY, |acc, &v| {
        if acc.is_nan() || v.is_nan() {
            f64::NAN
        } else {
            acc.max(v)
        }
    })
}

/// `(min over ask levels + max over bid levels) / 2`.
pub fn mid_price(ask_px: ArrayView2<f64>, bid_px: ArrayView2<f64>) -> Array1<f64> {
    let best_ask = ask_px.map_axis(Axis(1), nan_min);
    let best_bid = bid_px.map_axis(Axis(1), nan_max);
    (best_ask + best_bid) / 2.0
}

/// Top-of-book price weighted by top-of-book volume.
pub fn weighted_mid_price(
    ask_px: ArrayView2<f64>,
    ask_sz: ArrayView2<f64>,
    bid_px: ArrayView2<f64>,
    bid_sz: ArrayView2<f64>,
) -> Array1<f64> {
    Zip::from(ask_px.column(0))
        .and(ask_sz.column(0))
        .and(bid_px.column(0))
        .and(bid_sz.column(0))
        .map_collect(|&ap, &av, &bp, &bv| safe_div(ap * av + bp * bv, av + bv))
}

/// `(askV0 - bidV0) / (askV0 + bidV0)`.
pub fn volume_spread(ask_sz: ArrayView2<f64>, bid_sz: ArrayView2<f64>) -> Array1<f64> {
    Zip::from(ask_sz.column(0))
        .and(bid_sz.column(0))
        .map_collect(|&av, &bv| safe_div(av - bv, av + bv))
}

/// Sum of volumes over all levels.
pub fn total_volume(sz: ArrayView2<f64>) -> Array1<f64> {
    sz.sum_axis(Axis(1))
}

/// `(ask_k - bid_k) / mid` for the first [`PRICE_SPREAD_LEVELS`] levels.
pub fn normalized_price_spreads(
    ask_px: ArrayView2<f64>,
    bid_px: ArrayView2<f64>,
    mid: ArrayView1<f64>,
) -> Array2<f64> {
    let spread = &ask_px.slice(s![.., ..PRICE_SPREAD_LEVELS])
        - &bid_px.slice(s![.., ..PRICE_SPREAD_LEVELS]);
    Zip::from(&spread)
        .and_broadcast(mid.insert_axis(Axis(1)))
        .map_collect(|&sp, &m| safe_div(sp, m))
}

/// `askV_k - bidV_k` for the first [`VOLUME_LEVELS`] levels.
pub fn volume_diffs(ask_sz: ArrayView2<f64>, bid_sz: ArrayView2<f64>) -> Array2<f64> {
    &ask_sz.slice(s![.., ..VOLUME_LEVELS]) - &bid_sz.slice(s![.., ..VOLUME_LEVELS])
}

/// `askV_k / bidV_k` for the first [`VOLUME_LEVELS`] levels; NaN on empty bid levels.
pub fn volume_ratios(ask_sz: ArrayView2<f64>, bid_sz: ArrayView2<f64>) -> Array2<f64> {
    Zip::from(ask_sz.slice(s![.., ..VOLUME_LEVELS]))
        .and(bid_sz.slice(s![.., ..VOLUME_LEVELS]))
        .map_collect(|&av, &bv| safe_div(av, bv))
}

/// `(Σ askV · mean(ask) - Σ bidV · mean(bid)) / mid`.
pub fn weighted_average_spread(
    ask_px: ArrayView2<f64>,
    ask_sz: ArrayView2<f64>,
    bid_px: ArrayView2<f64>,
    bid_sz: ArrayView2<f64>,
    mid: ArrayView1<f64>,
) -> Array1<f64> {
    let levels = ask_px.ncols() as f64;
    let ask_mean = ask_px.sum_axis(Axis(1)) / levels;
    let bid_mean = bid_px.sum_axis(Axis(1)) / levels;
    let ask_vol = total_volume(ask_sz);
    let bid_vol = total_volume(bid_sz);

    Zip::from(&ask_vol)
        .and(&ask_mean)
        .and(&bid_vol)
        .and(&bid_mean)
        .and(mid)
        .map_collect(|&av, &ap, &bv, &bp, &m| safe_div(av * ap - bv * bp, m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Two rows of a 10-level book: asks 101.., bids 100.. stepping by one.
    fn book() -> (Array2<f64>, Array2<f64>, Array2<f64>, Array2<f64>) {
        let ask_px = Array2::from_shape_fn((2, 10), |(_, k)| 101.0 + k as f64);
        let bid_px = Array2::from_shape_fn((2, 10), |(_, k)| 100.0 - k as f64);
        let ask_sz = Array2::from_shape_fn((2, 10), |(r, k)| (r + k + 1) as f64);
        let bid_sz = Array2::from_shape_fn((2, 10), |(_, k)| 2.0 * (k + 1) as f64);
        (ask_px, ask_sz, bid_px, bid_sz)
    }

    #[test]
    fn test_safe_div() {
        assert_eq!(safe_div(1.0, 4.0), 0.25);
        assert!(safe_div(1.0, 0.0).is_nan());
        assert!(safe_div(0.0, 0.0).is_nan());
        assert!(safe_div(1.0, -0.0).is_nan());
    }

    #[test]
    fn test_mid_price_uses_extreme_levels() {
        let (mut ask_px, _, bid_px, _) = book();
        // An out-of-order deeper level still defines the best ask.
        ask_px[[0, 5]] = 100.5;
        let mid = mid_price(ask_px.view(), bid_px.view());
        assert_relative_eq!(mid[0], 100.25);
        assert_relative_eq!(mid[1], 100.5);
    }

    #[test]
    fn test_mid_price_propagates_nan() {
        let (mut ask_px, _, bid_px, _) = book();
        ask_px[[1, 9]] = f64::NAN;
        let mid = mid_price(ask_px.view(), bid_px.view());
        assert!(mid[0].is_finite());
        assert!(mid[1].is_nan());
    }

    #[test]
    fn test_weighted_mid_and_zero_volumes() {
        let (ask_px, mut ask_sz, bid_px, mut bid_sz) = book();
        let wm = weighted_mid_price(ask_px.view(), ask_sz.view(), bid_px.view(), bid_sz.view());
        // Row 0: (101 * 1 + 100 * 2) / 3
        assert_relative_eq!(wm[0], 301.0 / 3.0);

        ask_sz[[1, 0]] = 0.0;
        bid_sz[[1, 0]] = 0.0;
        let wm = weighted_mid_price(ask_px.view(), ask_sz.view(), bid_px.view(), bid_sz.view());
        assert!(wm[1].is_nan());
        let vs = volume_spread(ask_sz.view(), bid_sz.view());
        assert!(vs[1].is_nan());
        assert_relative_eq!(vs[0], -1.0 / 3.0);
    }

    #[test]
    fn test_spread_blocks_shapes() {
        let (ask_px, ask_sz, bid_px, bid_sz) = book();
        let mid = mid_price(ask_px.view(), bid_px.view());

        let spreads = normalized_price_spreads(ask_px.view(), bid_px.view(), mid.view());
        assert_eq!(spreads.dim(), (2, PRICE_SPREAD_LEVELS));
        assert_relative_eq!(spreads[[0, 0]], 1.0 / 100.5);
        assert_relative_eq!(spreads[[0, 9]], 19.0 / 100.5);

        let diffs = volume_diffs(ask_sz.view(), bid_sz.view());
        assert_eq!(diffs.dim(), (2, VOLUME_LEVELS));
        assert_eq!(diffs[[1, 0]], 0.0);

        let ratios = volume_ratios(ask_sz.view(), bid_sz.view());
        assert_eq!(ratios.dim(), (2, VOLUME_LEVELS));
        assert_relative_eq!(ratios[[0, 0]], 0.5);
    }

    #[test]
    fn test_volume_ratio_with_empty_bid_is_nan() {
        let (_, ask_sz, _, mut bid_sz) = book();
        bid_sz[[0, 3]] = 0.0;
        let ratios = volume_ratios(ask_sz.view(), bid_sz.view());
        assert!(ratios[[0, 3]].is_nan());
        assert!(ratios.iter().all(|r| !r.is_infinite()));
    }

    #[test]
    fn test_weighted_average_spread() {
        let (ask_px, ask_sz, bid_px, bid_sz) = book();
        let mid = mid_price(ask_px.view(), bid_px.view());
        let was = weighted_average_spread(
            ask_px.view(),
            ask_sz.view(),
            bid_px.view(),
            bid_sz.view(),
            mid.view(),
        );
        // Row 0: askV = 55, mean ask = 105.5, bidV = 110, mean bid = 95.5
        let expected = (55.0 * 105.5 - 110.0 * 95.5) / 100.5;
        assert_relative_eq!(was[0], expected, max_relative = 1e-12);
    }
}
