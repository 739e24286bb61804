use super::moving::sma;
use crate::domain::market::Candle;
use rust_decimal::prelude::ToPrimitive;

/// True range per bar: max(H−L, |H−prev C|, |L−prev C|). The first bar has
/// no previous close, so index 0 is undefined.
pub fn true_range(candles: &[Candle]) -> Vec<Option<f64>> {
    let mut out = vec![None; candles.len()];
    for i in 1..candles.len() {
        let high = candles[i].high.to_f64().unwrap_or(f64::NAN);
        let low = candles[i].low.to_f64().unwrap_or(f64::NAN);
        let prev_close = candles[i - 1].close.to_f64().unwrap_or(f64::NAN);
        out[i] = Some(
            (high - low)
                .max((high - prev_close).abs())
                .max((low - prev_close).abs()),
        );
    }
    out
}

/// Average True Range with Wilder smoothing: the first value is the simple
/// mean of the first `period` true ranges (first valid index = `period`).
pub fn atr(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    let tr = true_range(candles);
    let mut out = vec![None; candles.len()];
    if period == 0 || candles.len() <= period {
        return out;
    }

    let mut value = tr[1..=period].iter().map(|v| v.unwrap_or(0.0)).sum::<f64>() / period as f64;
    out[period] = Some(value);
    for i in (period + 1)..candles.len() {
        let current = tr[i].unwrap_or(0.0);
        value = (value * (period as f64 - 1.0) + current) / period as f64;
        out[i] = Some(value);
    }
    out
}

/// Bollinger band series: mean ± `k` population standard deviations.
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerSeries {
    pub upper: Vec<Option<f64>>,
    pub mid: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
    /// (upper − lower) / mid
    pub width: Vec<Option<f64>>,
}

pub fn bollinger(values: &[f64], period: usize, k: f64) -> BollingerSeries {
    let n = values.len();
    let mid = sma(values, period);
    let mut upper = vec![None; n];
    let mut lower = vec![None; n];
    let mut width = vec![None; n];

    for i in 0..n {
        let Some(mean) = mid[i] else { continue };
        let window = &values[i + 1 - period..=i];
        let variance =
            window.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / period as f64;
        let dev = variance.sqrt();
        let up = mean + k * dev;
        let lo = mean - k * dev;
        upper[i] = Some(up);
        lower[i] = Some(lo);
        width[i] = (mean != 0.0).then(|| (up - lo) / mean);
    }

    BollingerSeries {
        upper,
        mid,
        lower,
        width,
    }
}
