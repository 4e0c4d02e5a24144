//! Column layout of the feature matrix.
//!
//! The order below is part of the model contract: a model trained on one
//! layout must be fed matrices with the same layout at inference time.

use serde::{Deserialize, Serialize};

use crate::book::{PRICE_SPREAD_LEVELS, VOLUME_LEVELS};

/// Columns placed before the per-level and trend blocks.
const HEAD_COLUMNS: [&str; 10] = [
    "ask_volume_total",
    "bid_volume_total",
    "volume_spread",
    "mid_price_weighted",
    "mid_price",
    "last_trade_amount",
    "last_trade_price",
    "last_trade_notional",
    "last_trade_amount_per_price",
    "mid_to_last_trade_price",
];

/// Ordered feature columns for a given set of trend windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureLayout {
    window_sizes: Vec<usize>,
}

impl FeatureLayout {
    pub fn new(window_sizes: &[usize]) -> Self {
        Self {
            window_sizes: window_sizes.to_vec(),
        }
    }

    pub fn window_sizes(&self) -> &[usize] {
        &self.window_sizes
    }

    /// Total number of columns.
    pub fn width(&self) -> usize {
        HEAD_COLUMNS.len() + PRICE_SPREAD_LEVELS + 1 + 2 * VOLUME_LEVELS + 2 * self.window_sizes.len()
    }

    /// Column names in matrix order.
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = HEAD_COLUMNS.iter().map(|s| s.to_string()).collect();
        names.extend((0..PRICE_SPREAD_LEVELS).map(|k| format!("price_spread_l{k}")));
        names.push("weighted_average_spread".to_string());
        names.extend((0..VOLUME_LEVELS).map(|k| format!("volume_diff_l{k}")));
        names.extend((0..VOLUME_LEVELS).map(|k| format!("volume_ratio_l{k}")));
        names.extend(self.window_sizes.iter().map(|w| format!("trend_rel_w{w}")));
        names.extend(self.window_sizes.iter().map(|w| format!("trend_slope_w{w}")));
        names
    }

    /// Index of a named column.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.column_names().iter().position(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_width() {
        let layout = FeatureLayout::new(&[5, 10, 20, 30]);
        assert_eq!(layout.width(), 43);
        assert_eq!(layout.column_names().len(), 43);
    }

    #[test]
    fn test_fixed_positions() {
        let layout = FeatureLayout::new(&[5, 10, 20, 30]);
        assert_eq!(layout.index_of("mid_price"), Some(4));
        assert_eq!(layout.index_of("price_spread_l0"), Some(10));
        assert_eq!(layout.index_of("weighted_average_spread"), Some(20));
        assert_eq!(layout.index_of("volume_diff_l0"), Some(21));
        assert_eq!(layout.index_of("volume_ratio_l6"), Some(34));
        assert_eq!(layout.index_of("trend_rel_w5"), Some(35));
        assert_eq!(layout.index_of("trend_slope_w30"), Some(42));
    }

    #[test]
    fn test_width_tracks_windows() {
        assert_eq!(FeatureLayout::new(&[7]).width(), 37);
        assert_eq!(FeatureLayout::new(&[7]).column_names()[36], "trend_slope_w7");
    }
}
