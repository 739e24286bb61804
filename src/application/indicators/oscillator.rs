use super::moving::ema;

/// Relative Strength Index with Wilder smoothing.
///
/// The first averages are simple means of the first `period` gains/losses,
/// so the first valid index is `period` (one change per bar).
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = values[i] - values[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = Some(rsi_value(avg_gain, avg_loss));

    for i in (period + 1)..values.len() {
        let change = values[i] - values[i - 1];
        let (gain, loss) = if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        out[i] = Some(rsi_value(avg_gain, avg_loss));
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

/// MACD line, signal and histogram series.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub line: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub hist: Vec<Option<f64>>,
}

/// MACD(fast, slow, signal): line = EMA(fast) − EMA(slow), signal = EMA of
/// the line over `signal_period` of its defined values, hist = line − signal.
pub fn macd(values: &[f64], fast: usize, slow: usize, signal_period: usize) -> MacdSeries {
    let n = values.len();
    let ema_fast = ema(values, fast);
    let ema_slow = ema(values, slow);

    let mut line = vec![None; n];
    for i in 0..n {
        if let (Some(f), Some(s)) = (ema_fast[i], ema_slow[i]) {
            line[i] = Some(f - s);
        }
    }

    // The signal EMA runs over the defined portion of the line.
    let first_defined = line.iter().position(Option::is_some);
    let mut signal = vec![None; n];
    if let Some(start) = first_defined {
        let defined: Vec<f64> = line[start..].iter().map(|v| v.unwrap_or(0.0)).collect();
        let signal_tail = ema(&defined, signal_period);
        for (offset, value) in signal_tail.into_iter().enumerate() {
            signal[start + offset] = value;
        }
    }

    let mut hist = vec![None; n];
    for i in 0..n {
        if let (Some(l), Some(s)) = (line[i], signal[i]) {
            hist[i] = Some(l - s);
        }
    }

    MacdSeries { line, signal, hist }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_warmup() {
        let values: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let out = rsi(&values, 14);
        for v in &out[..14] {
            assert_eq!(*v, None);
        }
        // Monotonic rise: all gains, RSI pinned at 100.
        assert_eq!(out[14], Some(100.0));
    }

    #[test]
    fn test_rsi_midpoint_on_alternating_moves() {
        // Equal-size up and down moves: avg gain == avg loss, RSI -> 50.
        let mut values = vec![100.0];
        for i in 0..30 {
            let last = *values.last().unwrap();
            values.push(if i % 2 == 0 { last + 1.0 } else { last - 1.0 });
        }
        let out = rsi(&values, 14);
        let last = out.last().unwrap().unwrap();
        assert!((last - 50.0).abs() < 4.0, "expected near 50, got {last}");
    }

    #[test]
    fn test_rsi_bounded() {
        let values: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i as f64 * 1.3).sin() * 5.0)
            .collect();
        for v in rsi(&values, 14).into_iter().flatten() {
            assert!((0.0..=100.0).contains(&v));
        }
    }

    #[test]
    fn test_macd_warmup_indices() {
        let values: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).cos()).collect();
        let out = macd(&values, 12, 26, 9);

        // Line defined once the slow EMA is (index 25).
        assert!(out.line[24].is_none());
        assert!(out.line[25].is_some());
        // Signal needs 9 defined line values: 25 + 9 - 1 = 33.
        assert!(out.signal[32].is_none());
        assert!(out.signal[33].is_some());
        assert!(out.hist[32].is_none());
        assert!(out.hist[33].is_some());
    }

    #[test]
    fn test_macd_hist_is_line_minus_signal() {
        let values: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64 * 0.2).sin() * 3.0).collect();
        let out = macd(&values, 12, 26, 9);
        for i in 0..values.len() {
            if let (Some(l), Some(s), Some(h)) = (out.line[i], out.signal[i], out.hist[i]) {
                assert!((h - (l - s)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_macd_prefix_purity() {
        let values: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64 * 0.9).sin() * 2.0).collect();
        let full = macd(&values, 12, 26, 9);
        let prefix = macd(&values[..50], 12, 26, 9);
        for i in 0..50 {
            assert_eq!(full.line[i], prefix.line[i]);
            assert_eq!(full.signal[i], prefix.signal[i]);
            assert_eq!(full.hist[i], prefix.hist[i]);
        }
    }
}
