//! As-of alignment of order-book snapshots to the trade tape.
//!
//! Every snapshot is paired with the latest trade at or before its
//! timestamp. A snapshot older than the first trade has no match; its trade
//! columns are NaN rather than borrowing a trade from the future.

use std::borrow::Cow;

use forecast_core::TradeTape;
use ndarray::{Array1, ArrayView1};
use tracing::debug;

/// Last-trade columns aligned to order-book rows.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedTrades {
    /// Trade index per order-book row.
    pub index: Vec<Option<usize>>,
    /// Price of the matched trade (NaN when unmatched).
    pub price: Array1<f64>,
    /// Amount of the matched trade (NaN when unmatched).
    pub amount: Array1<f64>,
}

impl AlignedTrades {
    /// Number of order-book rows without a preceding trade.
    pub fn unmatched(&self) -> usize {
        self.index.iter().filter(|i| i.is_none()).count()
    }
}

/// Index of the last element of sorted `ts` that is `<= at`.
///
/// Equal timestamps resolve to the last of the run. NaN never matches.
#[inline]
pub fn asof_index(ts: &[f64], at: f64) -> Option<usize> {
    ts.partition_point(|&t| t <= at).checked_sub(1)
}

/// Pair every order-book timestamp with the most recent trade.
pub fn align_last_trade(book_ts: ArrayView1<f64>, trades: &TradeTape) -> AlignedTrades {
    let trade_ts: Cow<[f64]> = match trades.ts().as_slice() {
        Some(s) => Cow::Borrowed(s),
        None => Cow::Owned(trades.ts().to_vec()),
    };

    let index: Vec<Option<usize>> = book_ts
        .iter()
        .map(|&ts| asof_index(&trade_ts, ts))
        .collect();

    let pick = |col: &Array1<f64>| -> Array1<f64> {
        index
            .iter()
            .map(|i| i.map_or(f64::NAN, |i| col[i]))
            .collect()
    };
    let price = pick(trades.price());
    let amount = pick(trades.amount());

    let aligned = AlignedTrades {
        index,
        price,
        amount,
    };
    debug!(
        rows = book_ts.len(),
        trades = trades.len(),
        unmatched = aligned.unmatched(),
        "aligned order book to trades"
    );
    aligned
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn tape(ts: Vec<f64>) -> TradeTape {
        let n = ts.len();
        let price = (0..n).map(|i| 100.0 + i as f64).collect();
        let amount = (0..n).map(|i| 0.5 * (i + 1) as f64).collect();
        TradeTape::new(Array1::from(ts), price, amount).unwrap()
    }

    #[test]
    fn test_asof_index() {
        let ts = [10.0, 20.0, 20.0, 30.0];
        assert_eq!(asof_index(&ts, 5.0), None);
        assert_eq!(asof_index(&ts, 10.0), Some(0));
        assert_eq!(asof_index(&ts, 15.0), Some(0));
        assert_eq!(asof_index(&ts, 20.0), Some(2));
        assert_eq!(asof_index(&ts, 99.0), Some(3));
        assert_eq!(asof_index(&ts, f64::NAN), None);
        assert_eq!(asof_index(&[], 1.0), None);
    }

    #[test]
    fn test_snapshot_before_first_trade_is_nan() {
        let trades = tape(vec![100.0, 200.0]);
        let book_ts = array![50.0, 100.0, 150.0, 250.0];
        let aligned = align_last_trade(book_ts.view(), &trades);

        assert_eq!(aligned.index, vec![None, Some(0), Some(0), Some(1)]);
        assert!(aligned.price[0].is_nan());
        assert!(aligned.amount[0].is_nan());
        assert_eq!(aligned.price[1], 100.0);
        assert_eq!(aligned.amount[3], 1.0);
        assert_eq!(aligned.unmatched(), 1);
    }

    #[test]
    fn test_empty_tape() {
        let trades = TradeTape::default();
        let aligned = align_last_trade(array![1.0, 2.0].view(), &trades);
        assert_eq!(aligned.unmatched(), 2);
        assert!(aligned.price.iter().all(|p| p.is_nan()));
    }

    #[test]
    fn test_matched_trade_never_in_future() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let mut trade_ts: Vec<f64> = (0..rng.gen_range(1..40))
                .map(|_| rng.gen_range(0..1000) as f64)
                .collect();
            trade_ts.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let trades = tape(trade_ts.clone());

            let book_ts: Array1<f64> = (0..30).map(|i| (i * 37) as f64).collect();
            let aligned = align_last_trade(book_ts.view(), &trades);

            for (row, idx) in aligned.index.iter().enumerate() {
                match idx {
                    Some(i) => {
                        assert!(trade_ts[*i] <= book_ts[row]);
                        if let Some(next) = trade_ts.get(i + 1) {
                            assert!(*next > book_ts[row]);
                        }
                    }
                    None => assert!(trade_ts[0] > book_ts[row]),
                }
            }
        }
    }
}
