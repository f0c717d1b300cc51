//! Quantile computation using O(n) selection algorithms.
//!
//! Jitter verification needs the 95th percentile of a potentially long series
//! of timestamp deviations; `slice.select_nth_unstable()` (introselect) keeps
//! that O(n) on average.

/// Quantile `p` of `data` with linear interpolation between order statistics
/// (Hyndman-Fan type 7). Reorders `data` in place.
///
/// Panics on an empty slice or on `p` outside `[0, 1]`; use [`quantile_of`]
/// when the input may be empty.
pub fn compute_quantile(data: &mut [f64], p: f64) -> f64 {
    assert!(!data.is_empty(), "Cannot compute quantile of empty slice");
    assert!(
        (0.0..=1.0).contains(&p),
        "Quantile probability must be in [0, 1]"
    );

    let last = data.len() - 1;
    let rank = last as f64 * p;
    let below = rank.floor() as usize;
    let fraction = rank - rank.floor();

    if below >= last {
        let (_, &mut max, _) = data.select_nth_unstable_by(last, |a, b| a.total_cmp(b));
        return max;
    }

    let (_, &mut lower, rest) = data.select_nth_unstable_by(below, |a, b| a.total_cmp(b));
    if fraction == 0.0 {
        return lower;
    }
    // `rest` is unordered; its minimum is the next order statistic.
    let next = rest
        .iter()
        .copied()
        .min_by(|a, b| a.total_cmp(b))
        .unwrap_or(lower);
    lower + fraction * (next - lower)
}

/// Compute a quantile without reordering the caller's data.
///
/// Copies `data` and delegates to [`compute_quantile`]. Returns `None` for an
/// empty slice instead of panicking.
pub fn quantile_of(data: &[f64], p: f64) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    let mut working = data.to_vec();
    Some(compute_quantile(&mut working, p))
}
