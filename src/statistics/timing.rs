//! Timestamp-derived measurements: deltas, frequency and jitter.

use super::quantile::quantile_of;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Differences between consecutive timestamps, in nanoseconds.
pub fn timestamp_deltas(timestamps: &[i64]) -> Vec<i64> {
    timestamps.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Average event frequency in Hz over the span of `timestamps`.
///
/// Returns `None` with fewer than two timestamps or a non-positive span.
pub fn frequency_hz(timestamps: &[i64]) -> Option<f64> {
    let (first, last) = (timestamps.first()?, timestamps.last()?);
    frequency_from_span(timestamps.len(), *first, *last)
}

/// Frequency in Hz of `count` events spread from `first_ns` to `last_ns`.
pub fn frequency_from_span(count: usize, first_ns: i64, last_ns: i64) -> Option<f64> {
    let span = last_ns - first_ns;
    if count < 2 || span <= 0 {
        return None;
    }
    Some((count - 1) as f64 * NANOS_PER_SECOND / span as f64)
}

/// Absolute deviation of every delta from the mean delta, in nanoseconds.
pub fn jitter_values(timestamps: &[i64]) -> Vec<f64> {
    let deltas = timestamp_deltas(timestamps);
    if deltas.is_empty() {
        return Vec::new();
    }
    let mean = deltas.iter().map(|&d| d as f64).sum::<f64>() / deltas.len() as f64;
    deltas.iter().map(|&d| (d as f64 - mean).abs()).collect()
}

/// 95th percentile of [`jitter_values`] in nanoseconds.
pub fn jitter_95th_percentile_ns(timestamps: &[i64]) -> Option<f64> {
    quantile_of(&jitter_values(timestamps), 0.95)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_and_frequency() {
        let ts = [0, 10_000_000, 20_000_000, 30_000_000];
        assert_eq!(timestamp_deltas(&ts), vec![10_000_000; 3]);
        let hz = frequency_hz(&ts).unwrap();
        assert!((hz - 100.0).abs() < 1e-9);
        assert_eq!(frequency_hz(&ts[..1]), None);
        assert_eq!(frequency_from_span(3, 5, 5), None);
    }

    #[test]
    fn regular_stream_has_no_jitter() {
        let ts: Vec<i64> = (0..20).map(|i| i * 5_000_000).collect();
        assert_eq!(jitter_95th_percentile_ns(&ts), Some(0.0));
    }

    #[test]
    fn jitter_reflects_irregular_deltas() {
        // deltas 10, 10, 10, 30 ms -> mean 15 ms, deviations 5, 5, 5, 15 ms
        let ts = [0, 10_000_000, 20_000_000, 30_000_000, 60_000_000];
        let values = jitter_values(&ts);
        assert_eq!(values, vec![5_000_000.0, 5_000_000.0, 5_000_000.0, 15_000_000.0]);
        let p95 = jitter_95th_percentile_ns(&ts).unwrap();
        assert!(p95 > 5_000_000.0 && p95 <= 15_000_000.0);
    }
}
