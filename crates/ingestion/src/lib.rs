//! Data ingestion and persistence for the forecasting pipeline.
//!
//! This crate handles:
//! - Named-array storage files (order book, trades, targets, forecasts)
//! - Loading validated order-book frames and trade tapes
//! - As-of alignment of order-book timestamps to the trade tape

pub mod alignment;
pub mod loader;
pub mod storage;

pub use alignment::{align_last_trade, asof_index, AlignedTrades};
pub use loader::{load_market_data, write_forecast, write_market_data, MarketData, TargetLoader};
pub use storage::ArrayStore;
