/// Simple moving average. First valid index is `period - 1`.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let mut window_sum: f64 = values[..period].iter().sum();
    out[period - 1] = Some(window_sum / period as f64);
    for i in period..values.len() {
        window_sum += values[i] - values[i - period];
        out[i] = Some(window_sum / period as f64);
    }
    out
}

/// Exponential moving average seeded with the SMA of the first `period`
/// values, then `alpha = 2 / (period + 1)`. First valid index is `period - 1`.
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(seed);

    let mut prev = seed;
    for i in period..values.len() {
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        out[i] = Some(prev);
    }
    out
}

/// Average per-bar change of the series over its last `bars` defined values:
/// `(last - first) / (bars - 1)`. `None` when fewer than `bars` values are
/// defined at the tail.
pub fn slope_at_end(series: &[Option<f64>], bars: usize) -> Option<f64> {
    if bars < 2 || series.len() < bars {
        return None;
    }
    let tail = &series[series.len() - bars..];
    let first = tail.first().copied().flatten()?;
    let last = tail.last().copied().flatten()?;
    if tail.iter().any(|v| v.is_none()) {
        return None;
    }
    Some((last - first) / (bars as f64 - 1.0))
}
