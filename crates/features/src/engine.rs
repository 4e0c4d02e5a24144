//! Feature matrix construction.
//!
//! Combines the order-book, trade and trend components into one matrix whose
//! columns follow [`FeatureLayout`].

use forecast_core::{Error, FeatureConfig, OrderBookFrame, Result, TradeTape};
use forecast_ingestion::align_last_trade;
use ndarray::{concatenate, Array1, Array2, ArrayView2, Axis, Zip};
use rayon::prelude::*;
use statrs::statistics::Statistics;
use tracing::{debug, info, warn};

use crate::book::{self, safe_div};
use crate::layout::FeatureLayout;
use crate::linreg::window_lin_reg;

/// Order-book timestamps and the matching feature rows.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    pub ts: Array1<f64>,
    pub matrix: Array2<f64>,
}

impl FeatureSet {
    pub fn rows(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn into_parts(self) -> (Array1<f64>, Array2<f64>) {
        (self.ts, self.matrix)
    }
}

/// Trend columns of one window size.
struct TrendColumns {
    relative: Array1<f64>,
    slope: Array1<f64>,
}

/// Builds feature matrices from order-book frames and trade tapes.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    layout: FeatureLayout,
    horizon_ms: f64,
}

impl FeatureBuilder {
    pub fn new(config: &FeatureConfig) -> Self {
        Self {
            layout: FeatureLayout::new(&config.window_sizes),
            horizon_ms: config.horizon_ms,
        }
    }

    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    /// Compute one feature row per order-book snapshot.
    pub fn build(&self, book: &OrderBookFrame, trades: &TradeTape) -> Result<FeatureSet> {
        info!(rows = book.len(), "calculating features");

        let ask_px = book.ask_px().view();
        let ask_sz = book.ask_sz().view();
        let bid_px = book.bid_px().view();
        let bid_sz = book.bid_sz().view();

        let aligned = align_last_trade(book.ts().view(), trades);
        let unmatched = aligned.unmatched();
        if unmatched > 0 {
            warn!(
                unmatched,
                "order-book rows precede the first trade; trade features are NaN there"
            );
        }

        let mid = book::mid_price(ask_px, bid_px);
        let mid_weighted = book::weighted_mid_price(ask_px, ask_sz, bid_px, bid_sz);
        let volume_spread = book::volume_spread(ask_sz, bid_sz);
        let ask_total = book::total_volume(ask_sz);
        let bid_total = book::total_volume(bid_sz);
        let price_spreads = book::normalized_price_spreads(ask_px, bid_px, mid.view());
        let weighted_spread =
            book::weighted_average_spread(ask_px, ask_sz, bid_px, bid_sz, mid.view());
        let volume_diffs = book::volume_diffs(ask_sz, bid_sz);
        let volume_ratios = book::volume_ratios(ask_sz, bid_sz);

        let amount = aligned.amount;
        let price = aligned.price;
        let notional = &amount * &price;
        let amount_per_price = Zip::from(&amount)
            .and(&price)
            .map_collect(|&a, &p| safe_div(a, p));
        let mid_to_price = Zip::from(&mid)
            .and(&price)
            .map_collect(|&m, &p| safe_div(m, p));

        let trends = self.trend_block(book.ts(), &mid)?;

        let column = |a: Array1<f64>| a.insert_axis(Axis(1));
        let mut blocks: Vec<Array2<f64>> = vec![
            column(ask_total),
            column(bid_total),
            column(volume_spread),
            column(mid_weighted),
            column(mid),
            column(amount),
            column(price),
            column(notional),
            column(amount_per_price),
            column(mid_to_price),
            price_spreads,
            column(weighted_spread),
            volume_diffs,
            volume_ratios,
        ];
        let (relative, slopes): (Vec<_>, Vec<_>) =
            trends.into_iter().map(|t| (t.relative, t.slope)).unzip();
        blocks.extend(relative.into_iter().map(column));
        blocks.extend(slopes.into_iter().map(column));

        let views: Vec<ArrayView2<f64>> = blocks.iter().map(|b| b.view()).collect();
        let matrix = concatenate(Axis(1), &views)
            .map_err(|e| Error::input_shape(format!("feature blocks do not line up: {e}")))?;

        if matrix.ncols() != self.layout.width() {
            return Err(Error::input_shape(format!(
                "built {} feature columns, layout expects {}",
                matrix.ncols(),
                self.layout.width()
            )));
        }

        let names = self.layout.column_names();
        let empty: Vec<&str> = matrix
            .columns()
            .into_iter()
            .zip(&names)
            .filter(|(col, _)| col.iter().all(|v| v.is_nan()))
            .map(|(_, name)| name.as_str())
            .collect();
        if !empty.is_empty() {
            warn!(columns = ?empty, "feature columns are entirely NaN");
        }

        let missing = matrix.iter().filter(|v| v.is_nan()).count();
        debug!(
            rows = matrix.nrows(),
            cols = matrix.ncols(),
            missing,
            "feature matrix assembled"
        );

        Ok(FeatureSet {
            ts: book.ts().clone(),
            matrix,
        })
    }

    /// Relative trend prediction and raw slope for every window size.
    ///
    /// Windows are independent, so they run in parallel; `collect` keeps the
    /// configured order.
    fn trend_block(&self, ts: &Array1<f64>, mid: &Array1<f64>) -> Result<Vec<TrendColumns>> {
        let ts = ts.to_vec();
        let mid = mid.to_vec();
        let warmup_level = mid.iter().copied().filter(|v| v.is_finite()).mean();

        self.layout
            .window_sizes()
            .par_iter()
            .map(|&w| trend_columns(&ts, &mid, w, self.horizon_ms, warmup_level))
            .collect()
    }
}

/// Trend features of a single window size.
///
/// The first `w - 1` rows have no full window: their prediction is
/// `warmup_level` and their slope 0. Later rows extrapolate the window fit
/// `horizon_ms` ahead of the row's own timestamp.
fn trend_columns(
    ts: &[f64],
    mid: &[f64],
    w: usize,
    horizon_ms: f64,
    warmup_level: f64,
) -> Result<TrendColumns> {
    let fit = window_lin_reg(ts, mid, w)?;
    let n = mid.len();
    let warmup = w.saturating_sub(1).min(n);

    let mut relative = Vec::with_capacity(n);
    let mut slope = Vec::with_capacity(n);
    for i in 0..warmup {
        relative.push(safe_div(warmup_level - mid[i], mid[i]));
        slope.push(0.0);
    }
    for (j, (&s, &b)) in fit.slope.iter().zip(&fit.intercept).enumerate() {
        let i = warmup + j;
        let prediction = (ts[i] + horizon_ms) * s + b;
        relative.push(safe_div(prediction - mid[i], mid[i]));
        slope.push(s);
    }

    Ok(TrendColumns {
        relative: Array1::from(relative),
        slope: Array1::from(slope),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use forecast_core::{OrderBookSnapshot, TradeRecord};

    fn snapshot(ts_ms: i64, mid: f64) -> OrderBookSnapshot {
        OrderBookSnapshot {
            ts_ms,
            ask_px: (0..10).map(|k| mid + 0.5 + k as f64).collect(),
            ask_sz: (0..10).map(|k| 1.0 + k as f64).collect(),
            bid_px: (0..10).map(|k| mid - 0.5 - k as f64).collect(),
            bid_sz: (0..10).map(|k| 2.0 + k as f64).collect(),
        }
    }

    /// Book whose mid-price is `base + step * i`, 1 s apart.
    fn linear_book(rows: usize, base: f64, step: f64) -> OrderBookFrame {
        let snaps: Vec<_> = (0..rows)
            .map(|i| snapshot(1_000 * i as i64, base + step * i as f64))
            .collect();
        OrderBookFrame::from_snapshots(&snaps).unwrap()
    }

    fn tape() -> TradeTape {
        TradeTape::from_records(&[
            TradeRecord { ts_ms: 500, price: 50_000.0, amount: 0.25 },
            TradeRecord { ts_ms: 20_500, price: 50_010.0, amount: -0.5 },
        ])
        .unwrap()
    }

    fn builder() -> FeatureBuilder {
        FeatureBuilder::new(&FeatureConfig::default())
    }

    #[test]
    fn test_shape_matches_layout() {
        let set = builder().build(&linear_book(40, 50_000.0, 1.0), &tape()).unwrap();
        assert_eq!(set.rows(), 40);
        assert_eq!(set.matrix.ncols(), 43);
        assert_eq!(set.ts.len(), 40);
        assert_eq!(set.ts[3], 3_000.0);
    }

    #[test]
    fn test_build_is_deterministic() {
        let book = linear_book(64, 50_000.0, 0.7);
        let a = builder().build(&book, &tape()).unwrap();
        let b = builder().build(&book, &tape()).unwrap();
        assert_eq!(a.matrix.shape(), b.matrix.shape());
        for (x, y) in a.matrix.iter().zip(b.matrix.iter()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn test_trade_columns() {
        let builder = builder();
        let layout = builder.layout().clone();
        let set = builder.build(&linear_book(30, 50_000.0, 1.0), &tape()).unwrap();
        let col = |name: &str| set.matrix.column(layout.index_of(name).unwrap()).to_owned();

        // Row 0 (t = 0) precedes the first trade at t = 0.5 s.
        assert!(col("last_trade_price")[0].is_nan());
        assert!(col("mid_to_last_trade_price")[0].is_nan());
        assert_eq!(col("last_trade_price")[1], 50_000.0);
        assert_eq!(col("last_trade_amount")[20], 0.25);
        assert_eq!(col("last_trade_amount")[21], -0.5);
        assert_relative_eq!(col("last_trade_notional")[21], -0.5 * 50_010.0);
        assert_relative_eq!(col("last_trade_amount_per_price")[1], 0.25 / 50_000.0);
        assert_relative_eq!(col("mid_to_last_trade_price")[1], 50_001.0 / 50_000.0);
    }

    #[test]
    fn test_trend_warmup_and_slope_padding() {
        let builder = builder();
        let layout = builder.layout().clone();
        let book = linear_book(100, 50_000.0, 0.5);
        let set = builder.build(&book, &tape()).unwrap();

        let rel = set.matrix.column(layout.index_of("trend_rel_w30").unwrap()).to_owned();
        let slope = set.matrix.column(layout.index_of("trend_slope_w30").unwrap()).to_owned();

        let mean_mid = 50_000.0 + 0.5 * 99.0 / 2.0;
        for i in 0..29 {
            let mid = 50_000.0 + 0.5 * i as f64;
            assert_eq!(slope[i], 0.0);
            assert_relative_eq!(rel[i], (mean_mid - mid) / mid, max_relative = 1e-9);
        }
        // 0.5 per second is 5e-4 per ms; 30 s ahead adds 15 to the mid.
        for i in 29..100 {
            let mid = 50_000.0 + 0.5 * i as f64;
            assert_relative_eq!(slope[i], 5e-4, max_relative = 1e-6);
            assert_relative_eq!(rel[i], 15.0 / mid, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_trend_on_epoch_timestamps() {
        // 100 ms snapshots from late 2023, mid rising 0.01 per row.
        const START_MS: i64 = 1_700_000_000_000;
        let rows = 20_000;
        let snaps: Vec<_> = (0..rows)
            .map(|i| snapshot(START_MS + 100 * i as i64, 42_000.0 + 0.01 * i as f64))
            .collect();
        let book = OrderBookFrame::from_snapshots(&snaps).unwrap();
        let tape = TradeTape::from_records(&[TradeRecord {
            ts_ms: START_MS - 50,
            price: 42_000.0,
            amount: 0.1,
        }])
        .unwrap();

        let builder = builder();
        let layout = builder.layout().clone();
        let set = builder.build(&book, &tape).unwrap();

        for w in [5, 10, 20, 30] {
            let rel = set.matrix.column(layout.index_of(&format!("trend_rel_w{w}")).unwrap());
            let slope = set.matrix.column(layout.index_of(&format!("trend_slope_w{w}")).unwrap());
            assert!(slope.iter().take(w - 1).all(|&s| s == 0.0));
            // 1e-4 per ms; 30 s ahead adds 3 to the mid.
            for i in (w - 1)..rows {
                let mid = 42_000.0 + 0.01 * i as f64;
                assert_relative_eq!(slope[i], 1e-4, max_relative = 1e-6);
                assert_relative_eq!(rel[i], 3.0 / mid, max_relative = 1e-6);
            }
        }
    }

    #[test]
    fn test_short_frame_is_all_warmup() {
        let set = builder().build(&linear_book(4, 50_000.0, 1.0), &tape()).unwrap();
        let slopes = set.matrix.slice(ndarray::s![.., 39..43]).to_owned();
        assert!(slopes.iter().all(|&s| s == 0.0));
        assert!(set.matrix.column(35).iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_zero_top_volumes_give_nan_weighted_mid() {
        let mut snaps: Vec<_> = (0..12)
            .map(|i| OrderBookSnapshot {
                ts_ms: 1_000 * i,
                ask_px: (0..10).map(|k| 101.0 + k as f64).collect(),
                ask_sz: vec![1.0; 10],
                bid_px: (0..10).map(|k| 100.0 - k as f64).collect(),
                bid_sz: vec![1.0; 10],
            })
            .collect();
        snaps[6].ask_sz[0] = 0.0;
        snaps[6].bid_sz[0] = 0.0;
        let book = OrderBookFrame::from_snapshots(&snaps).unwrap();

        let builder = builder();
        let set = builder.build(&book, &tape()).unwrap();
        let wm = builder.layout().index_of("mid_price_weighted").unwrap();
        assert!(set.matrix[[6, wm]].is_nan());
        assert_relative_eq!(set.matrix[[5, wm]], 100.5);
        assert!(set.matrix.iter().all(|v| !v.is_infinite()));
    }

    #[test]
    fn test_custom_windows_change_width() {
        let config = FeatureConfig {
            window_sizes: vec![3],
            ..FeatureConfig::default()
        };
        let set = FeatureBuilder::new(&config)
            .build(&linear_book(10, 100.0, 1.0), &TradeTape::default())
            .unwrap();
        assert_eq!(set.matrix.ncols(), 37);
        // No trades at all: every trade column is NaN.
        assert!(set.matrix.column(6).iter().all(|v| v.is_nan()));
    }
}
