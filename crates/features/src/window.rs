//! Rolling window sums over series with missing values.
//!
//! Sums come from a NaN-skipping prefix sum differenced at distance `w`, so
//! a full pass is O(N) whatever the window size. Output `i` covers
//! `x[i..i + w]`; the output has `N - w + 1` elements, and is empty when
//! `w == 0` or `w > N`.

/// Rolling sum of `x` over windows of `w` samples, NaN counted as zero.
///
/// Infinite inputs are not skipped; callers that need them treated as
/// missing must replace them with NaN first.
pub fn window_sum(x: &[f64], w: usize) -> Vec<f64> {
    let n = x.len();
    if w == 0 || w > n {
        return Vec::new();
    }

    let mut prefix = Vec::with_capacity(n);
    let mut acc = 0.0;
    for &v in x {
        if !v.is_nan() {
            acc += v;
        }
        prefix.push(acc);
    }

    let mut sums = Vec::with_capacity(n - w + 1);
    sums.push(prefix[w - 1]);
    for i in 1..=n - w {
        sums.push(prefix[i + w - 1] - prefix[i - 1]);
    }
    sums
}

/// Number of `true` flags in each window, aligned like [`window_sum`].
pub fn window_count(valid: &[bool], w: usize) -> Vec<f64> {
    let flags: Vec<f64> = valid.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect();
    window_sum(&flags, w)
}
