//! Feature quantization for split search.
//!
//! Each feature gets a sorted list of split borders. A value's bin is the
//! number of borders strictly below it, so `value > borders[k]` holds exactly
//! when `bin > k`. NaN lands in bin 0 and therefore left of every split.

use ndarray::ArrayView2;
use ordered_float::OrderedFloat;

/// Sorted, strictly increasing split borders of one feature.
pub fn feature_borders(values: impl Iterator<Item = f64>, border_count: usize) -> Vec<f64> {
    let mut uniques: Vec<f64> = values.filter(|v| v.is_finite()).collect();
    uniques.sort_unstable_by_key(|&v| OrderedFloat(v));
    uniques.dedup();

    if uniques.len() < 2 || border_count == 0 {
        return Vec::new();
    }

    let midpoint = |i: usize| uniques[i - 1] + (uniques[i] - uniques[i - 1]) / 2.0;

    if uniques.len() - 1 <= border_count {
        return (1..uniques.len()).map(midpoint).collect();
    }

    // Too many distinct values: take evenly spaced cut points over the uniques.
    let mut borders: Vec<f64> = (1..=border_count)
        .map(|q| q * uniques.len() / (border_count + 1))
        .filter(|&i| i > 0)
        .map(midpoint)
        .collect();
    borders.dedup_by_key(|b| OrderedFloat(*b));
    borders
}

/// Bin of `value` against `borders`.
#[inline]
pub fn bin_of(borders: &[f64], value: f64) -> u32 {
    borders.partition_point(|&b| b < value) as u32
}

/// Column-major binned copy of a feature matrix.
#[derive(Debug, Clone)]
pub struct QuantizedFeatures {
    borders: Vec<Vec<f64>>,
    bins: Vec<Vec<u32>>,
}

impl QuantizedFeatures {
    pub fn new(x: ArrayView2<f64>, border_count: usize) -> Self {
        let borders: Vec<Vec<f64>> = x
            .columns()
            .into_iter()
            .map(|col| feature_borders(col.iter().copied(), border_count))
            .collect();
        let bins = x
            .columns()
            .into_iter()
            .zip(&borders)
            .map(|(col, b)| col.iter().map(|&v| bin_of(b, v)).collect())
            .collect();
        Self { borders, bins }
    }

    pub fn feature_count(&self) -> usize {
        self.borders.len()
    }

    pub fn borders(&self, feature: usize) -> &[f64] {
        &self.borders[feature]
    }

    pub fn bins(&self, feature: usize) -> &[u32] {
        &self.bins[feature]
    }
}
