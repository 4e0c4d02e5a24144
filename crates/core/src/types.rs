//! Core data types for the forecasting pipeline.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Timestamp in milliseconds since Unix epoch (UTC).
pub type TimestampMs = i64;

/// Minimum number of book levels on each side.
pub const MIN_BOOK_LEVELS: usize = 10;

/// Convert a millisecond timestamp to a UTC datetime, if representable.
#[inline]
pub fn ts_to_datetime(ts_ms: f64) -> Option<DateTime<Utc>> {
    if !ts_ms.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(ts_ms as TimestampMs)
}

/// One order-book snapshot, best level first on each side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    /// Timestamp in milliseconds.
    pub ts_ms: TimestampMs,
    /// Ask prices, best first.
    pub ask_px: Vec<f64>,
    /// Ask volumes aligned with `ask_px`.
    pub ask_sz: Vec<f64>,
    /// Bid prices, best first.
    pub bid_px: Vec<f64>,
    /// Bid volumes aligned with `bid_px`.
    pub bid_sz: Vec<f64>,
}

impl OrderBookSnapshot {
    /// Number of levels, if all four sides agree.
    pub fn levels(&self) -> Option<usize> {
        let n = self.ask_px.len();
        (self.ask_sz.len() == n && self.bid_px.len() == n && self.bid_sz.len() == n).then_some(n)
    }
}

/// A single trade print.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Timestamp in milliseconds.
    pub ts_ms: TimestampMs,
    /// Trade price.
    pub price: f64,
    /// Trade amount, signed or unsigned per feed convention.
    pub amount: f64,
}

/// Column-oriented order book: one row per snapshot, one column per level.
///
/// Timestamps are kept as `f64` because they are the regressor of the trend
/// fits and can be invalidated to NaN there.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBookFrame {
    ts: Array1<f64>,
    ask_px: Array2<f64>,
    ask_sz: Array2<f64>,
    bid_px: Array2<f64>,
    bid_sz: Array2<f64>,
}

impl OrderBookFrame {
    /// Build a frame, checking row/level counts and timestamp order.
    pub fn new(
        ts: Array1<f64>,
        ask_px: Array2<f64>,
        ask_sz: Array2<f64>,
        bid_px: Array2<f64>,
        bid_sz: Array2<f64>,
    ) -> Result<Self> {
        let rows = ts.len();
        if rows == 0 {
            return Err(Error::input_shape("order book has no snapshots"));
        }
        let levels = ask_px.ncols();
        for (name, arr) in [
            ("ask prices", &ask_px),
            ("ask volumes", &ask_sz),
            ("bid prices", &bid_px),
            ("bid volumes", &bid_sz),
        ] {
            if arr.nrows() != rows {
                return Err(Error::input_shape(format!(
                    "{name}: {} rows, expected {rows}",
                    arr.nrows()
                )));
            }
            if arr.ncols() != levels {
                return Err(Error::input_shape(format!(
                    "{name}: {} levels, expected {levels}",
                    arr.ncols()
                )));
            }
        }
        if levels < MIN_BOOK_LEVELS {
            return Err(Error::input_shape(format!(
                "order book has {levels} levels, need at least {MIN_BOOK_LEVELS}"
            )));
        }
        if let Some(i) = first_order_violation(ts.view(), true) {
            return Err(Error::input_shape(format!(
                "order book timestamps not strictly increasing at row {i}"
            )));
        }

        Ok(Self {
            ts,
            ask_px,
            ask_sz,
            bid_px,
            bid_sz,
        })
    }

    /// Build a frame from row snapshots.
    pub fn from_snapshots(snapshots: &[OrderBookSnapshot]) -> Result<Self> {
        let first = snapshots
            .first()
            .ok_or_else(|| Error::input_shape("order book has no snapshots"))?;
        let levels = first
            .levels()
            .ok_or_else(|| Error::input_shape("snapshot 0 has inconsistent level counts"))?;

        let rows = snapshots.len();
        let mut ask_px = Vec::with_capacity(rows * levels);
        let mut ask_sz = Vec::with_capacity(rows * levels);
        let mut bid_px = Vec::with_capacity(rows * levels);
        let mut bid_sz = Vec::with_capacity(rows * levels);

        for (i, snap) in snapshots.iter().enumerate() {
            if snap.levels() != Some(levels) {
                return Err(Error::input_shape(format!(
                    "snapshot {i} has inconsistent level counts"
                )));
            }
            ask_px.extend_from_slice(&snap.ask_px);
            ask_sz.extend_from_slice(&snap.ask_sz);
            bid_px.extend_from_slice(&snap.bid_px);
            bid_sz.extend_from_slice(&snap.bid_sz);
        }

        let ts = snapshots.iter().map(|s| s.ts_ms as f64).collect();
        Self::new(
            ts,
            to_matrix(ask_px, rows, levels)?,
            to_matrix(ask_sz, rows, levels)?,
            to_matrix(bid_px, rows, levels)?,
            to_matrix(bid_sz, rows, levels)?,
        )
    }

    /// Number of snapshots.
    pub fn len(&self) -> usize {
        self.ts.len()
    }

    /// Always false for a validated frame.
    pub fn is_empty(&self) -> bool {
        self.ts.is_empty()
    }

    /// Number of levels on each side.
    pub fn levels(&self) -> usize {
        self.ask_px.ncols()
    }

    pub fn ts(&self) -> &Array1<f64> {
        &self.ts
    }

    pub fn ask_px(&self) -> &Array2<f64> {
        &self.ask_px
    }

    pub fn ask_sz(&self) -> &Array2<f64> {
        &self.ask_sz
    }

    pub fn bid_px(&self) -> &Array2<f64> {
        &self.bid_px
    }

    pub fn bid_sz(&self) -> &Array2<f64> {
        &self.bid_sz
    }

    /// First and last snapshot times.
    pub fn span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = ts_to_datetime(*self.ts.first()?)?;
        let last = ts_to_datetime(*self.ts.last()?)?;
        Some((first, last))
    }
}

/// Column-oriented trade tape, timestamps non-decreasing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TradeTape {
    ts: Array1<f64>,
    price: Array1<f64>,
    amount: Array1<f64>,
}

impl TradeTape {
    /// Build a tape, checking lengths and timestamp order.
    pub fn new(ts: Array1<f64>, price: Array1<f64>, amount: Array1<f64>) -> Result<Self> {
        if price.len() != ts.len() || amount.len() != ts.len() {
            return Err(Error::input_shape(format!(
                "trade arrays disagree: {} timestamps, {} prices, {} amounts",
                ts.len(),
                price.len(),
                amount.len()
            )));
        }
        if let Some(i) = first_order_violation(ts.view(), false) {
            return Err(Error::input_shape(format!(
                "trade timestamps not sorted at row {i}"
            )));
        }
        Ok(Self { ts, price, amount })
    }

    /// Build a tape from trade records.
    pub fn from_records(trades: &[TradeRecord]) -> Result<Self> {
        Self::new(
            trades.iter().map(|t| t.ts_ms as f64).collect(),
            trades.iter().map(|t| t.price).collect(),
            trades.iter().map(|t| t.amount).collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.ts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ts.is_empty()
    }

    pub fn ts(&self) -> &Array1<f64> {
        &self.ts
    }

    pub fn price(&self) -> &Array1<f64> {
        &self.price
    }

    pub fn amount(&self) -> &Array1<f64> {
        &self.amount
    }
}

fn to_matrix(data: Vec<f64>, rows: usize, cols: usize) -> Result<Array2<f64>> {
    Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::input_shape(e.to_string()))
}

/// Index of the first row breaking the ordering, comparing with its predecessor.
/// An unordered pair (a NaN timestamp) is a violation.
fn first_order_violation(ts: ArrayView1<f64>, strict: bool) -> Option<usize> {
    ts.windows(2)
        .into_iter()
        .position(|w| match w[1].partial_cmp(&w[0]) {
            Some(Ordering::Greater) => false,
            Some(Ordering::Equal) => strict,
            Some(Ordering::Less) | None => true,
        })
        .map(|i| i + 1)
}
