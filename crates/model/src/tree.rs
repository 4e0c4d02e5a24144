//! Oblivious regression trees.
//!
//! Every node on a level shares the same split, so a tree of depth `d` is a
//! list of `d` splits plus `2^d` leaf values. Level `l` contributes bit `l`
//! of the leaf index: set when the row goes right (`value > threshold`).

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// One level of an oblivious tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub feature: usize,
    pub threshold: f64,
}

impl Split {
    /// Whether `row` goes right. NaN compares false and goes left.
    #[inline]
    pub fn goes_right(&self, row: ArrayView1<f64>) -> bool {
        row[self.feature] > self.threshold
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObliviousTree {
    pub splits: Vec<Split>,
    pub leaf_values: Vec<f64>,
}

impl ObliviousTree {
    pub fn depth(&self) -> usize {
        self.splits.len()
    }

    pub fn leaf_index(&self, row: ArrayView1<f64>) -> usize {
        self.splits
            .iter()
            .enumerate()
            .fold(0, |idx, (level, split)| {
                idx | (usize::from(split.goes_right(row)) << level)
            })
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        self.leaf_values[self.leaf_index(row)]
    }

    /// Largest feature index the tree reads, if it has any split.
    pub fn max_feature(&self) -> Option<usize> {
        self.splits.iter().map(|s| s.feature).max()
    }
}
