//! Loading and writing the pipeline's storage files.

use std::path::Path;

use forecast_core::{Error, OrderBookFrame, Result, TradeTape};
use ndarray::Array1;
use tracing::info;

use crate::storage::ArrayStore;

/// Array names used in the storage files.
pub mod names {
    pub const OB_TS: &str = "OB/TS";
    pub const OB_ASK: &str = "OB/Ask";
    pub const OB_ASK_VOL: &str = "OB/AskV";
    pub const OB_BID: &str = "OB/Bid";
    pub const OB_BID_VOL: &str = "OB/BidV";
    pub const TRADES_TS: &str = "Trades/TS";
    pub const TRADES_PRICE: &str = "Trades/Price";
    pub const TRADES_AMOUNT: &str = "Trades/Amount";
    pub const RETURN_TS: &str = "Return/TS";
    pub const RETURN_RES: &str = "Return/Res";
}

/// Order book and trade tape read from one data file.
#[derive(Debug, Clone)]
pub struct MarketData {
    pub book: OrderBookFrame,
    pub trades: TradeTape,
}

/// Load and validate the order book and trades of a data file.
pub fn load_market_data(path: impl AsRef<Path>) -> Result<MarketData> {
    let path = path.as_ref();
    let store = ArrayStore::open(path)?;

    let book = OrderBookFrame::new(
        store.read_1d(names::OB_TS)?,
        store.read_2d(names::OB_ASK)?,
        store.read_2d(names::OB_ASK_VOL)?,
        store.read_2d(names::OB_BID)?,
        store.read_2d(names::OB_BID_VOL)?,
    )?;
    let trades = TradeTape::new(
        store.read_1d(names::TRADES_TS)?,
        store.read_1d(names::TRADES_PRICE)?,
        store.read_1d(names::TRADES_AMOUNT)?,
    )?;

    match book.span() {
        Some((first, last)) => info!(
            path = %path.display(),
            snapshots = book.len(),
            levels = book.levels(),
            trades = trades.len(),
            %first,
            %last,
            "loaded market data"
        ),
        None => info!(
            path = %path.display(),
            snapshots = book.len(),
            levels = book.levels(),
            trades = trades.len(),
            "loaded market data"
        ),
    }

    Ok(MarketData { book, trades })
}

/// Write an order book and trade tape in the layout `load_market_data` reads.
pub fn write_market_data(
    path: impl AsRef<Path>,
    book: &OrderBookFrame,
    trades: &TradeTape,
) -> Result<()> {
    let store = ArrayStore::create(path)?;
    store.write_1d(names::OB_TS, book.ts())?;
    store.write_2d(names::OB_ASK, book.ask_px())?;
    store.write_2d(names::OB_ASK_VOL, book.ask_sz())?;
    store.write_2d(names::OB_BID, book.bid_px())?;
    store.write_2d(names::OB_BID_VOL, book.bid_sz())?;
    store.write_1d(names::TRADES_TS, trades.ts())?;
    store.write_1d(names::TRADES_PRICE, trades.price())?;
    store.write_1d(names::TRADES_AMOUNT, trades.amount())?;
    Ok(())
}

/// Reader for the precomputed forward-return target.
///
/// The series is returned as stored. Row alignment with the feature matrix
/// is checked by the caller.
pub struct TargetLoader;

impl TargetLoader {
    /// Load the `Return/Res` series.
    pub fn load(path: impl AsRef<Path>) -> Result<Array1<f64>> {
        let path = path.as_ref();
        let target = ArrayStore::open(path)?.read_1d(names::RETURN_RES)?;
        info!(path = %path.display(), rows = target.len(), "loaded target");
        Ok(target)
    }

    /// Write a target series (used to prepare training folders).
    pub fn write(path: impl AsRef<Path>, target: &Array1<f64>) -> Result<()> {
        ArrayStore::create(path)?.write_1d(names::RETURN_RES, target)
    }
}

/// Write forecasts as `Return/TS` / `Return/Res`.
pub fn write_forecast(
    path: impl AsRef<Path>,
    ts: &Array1<f64>,
    predictions: &Array1<f64>,
) -> Result<()> {
    let path = path.as_ref();
    if ts.len() != predictions.len() {
        return Err(Error::input_shape(format!(
            "forecast has {} timestamps but {} predictions",
            ts.len(),
            predictions.len()
        )));
    }
    let store = ArrayStore::create(path)?;
    store.write_1d(names::RETURN_TS, ts)?;
    store.write_1d(names::RETURN_RES, predictions)?;
    info!(path = %path.display(), rows = ts.len(), "wrote forecast");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use forecast_core::{OrderBookSnapshot, TradeRecord};
    use ndarray::array;
    use tempfile::tempdir;

    fn book(rows: usize) -> OrderBookFrame {
        let snaps: Vec<_> = (0..rows)
            .map(|i| OrderBookSnapshot {
                ts_ms: 1_000 + 100 * i as i64,
                ask_px: (0..10).map(|k| 101.0 + k as f64).collect(),
                ask_sz: vec![1.0; 10],
                bid_px: (0..10).map(|k| 100.0 - k as f64).collect(),
                bid_sz: vec![2.0; 10],
            })
            .collect();
        OrderBookFrame::from_snapshots(&snaps).unwrap()
    }

    fn trades() -> TradeTape {
        TradeTape::from_records(&[
            TradeRecord { ts_ms: 1_000, price: 100.5, amount: 0.1 },
            TradeRecord { ts_ms: 1_150, price: 100.7, amount: -0.2 },
        ])
        .unwrap()
    }

    #[test]
    fn test_market_data_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("market.db");
        let book = book(4);
        let trades = trades();
        write_market_data(&path, &book, &trades).unwrap();

        let data = load_market_data(&path).unwrap();
        assert_eq!(data.book, book);
        assert_eq!(data.trades, trades);
    }

    #[test]
    fn test_missing_trades_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("no-trades.db");
        let book = book(2);
        let store = ArrayStore::create(&path).unwrap();
        store.write_1d(names::OB_TS, book.ts()).unwrap();
        store.write_2d(names::OB_ASK, book.ask_px()).unwrap();
        store.write_2d(names::OB_ASK_VOL, book.ask_sz()).unwrap();
        store.write_2d(names::OB_BID, book.bid_px()).unwrap();
        store.write_2d(names::OB_BID_VOL, book.bid_sz()).unwrap();
        drop(store);

        let err = load_market_data(&path).unwrap_err();
        assert!(matches!(err, Error::InputShape(_)));
        assert!(err.to_string().contains("Trades/TS"));
    }

    #[test]
    fn test_target_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("target.db");
        let target = array![0.001, -0.002, 0.0];
        TargetLoader::write(&path, &target).unwrap();
        assert_eq!(TargetLoader::load(&path).unwrap(), target);
    }

    #[test]
    fn test_forecast_written_under_return_group() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("forecast.db");
        write_forecast(&path, &array![1.0, 2.0], &array![0.1, 0.2]).unwrap();

        let store = ArrayStore::open(&path).unwrap();
        assert_eq!(store.names().unwrap(), vec!["Return/Res", "Return/TS"]);
        assert_eq!(store.read_1d(names::RETURN_TS).unwrap(), array![1.0, 2.0]);
    }

    #[test]
    fn test_forecast_length_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("forecast-bad.db");
        let err = write_forecast(&path, &array![1.0], &array![0.1, 0.2]).unwrap_err();
        assert!(matches!(err, Error::InputShape(_)));
    }
}
