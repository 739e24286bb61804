use super::volatility::true_range;
use crate::domain::market::Candle;
use rust_decimal::prelude::ToPrimitive;

/// ADX with the directional index components.
#[derive(Debug, Clone, PartialEq)]
pub struct AdxSeries {
    pub adx: Vec<Option<f64>>,
    pub di_plus: Vec<Option<f64>>,
    pub di_minus: Vec<Option<f64>>,
}

/// Average Directional Index, Wilder smoothing throughout.
///
/// +DM/−DM/TR are defined from index 1; their Wilder sums seed at index
/// `period`, giving DI from there; the ADX itself seeds as the mean of the
/// first `period` DX values, so its first valid index is `2 * period`.
pub fn adx(candles: &[Candle], period: usize) -> AdxSeries {
    let n = candles.len();
    let mut series = AdxSeries {
        adx: vec![None; n],
        di_plus: vec![None; n],
        di_minus: vec![None; n],
    };
    if period == 0 || n <= 2 * period {
        return series;
    }

    let tr = true_range(candles);
    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    for i in 1..n {
        let high = candles[i].high.to_f64().unwrap_or(f64::NAN);
        let low = candles[i].low.to_f64().unwrap_or(f64::NAN);
        let prev_high = candles[i - 1].high.to_f64().unwrap_or(f64::NAN);
        let prev_low = candles[i - 1].low.to_f64().unwrap_or(f64::NAN);

        let up_move = high - prev_high;
        let down_move = prev_low - low;
        if up_move > down_move && up_move > 0.0 {
            plus_dm[i] = up_move;
        }
        if down_move > up_move && down_move > 0.0 {
            minus_dm[i] = down_move;
        }
    }

    // Wilder-smoothed accumulators, seeded with plain sums of the first
    // `period` defined values.
    let mut smoothed_plus: f64 = plus_dm[1..=period].iter().sum();
    let mut smoothed_minus: f64 = minus_dm[1..=period].iter().sum();
    let mut smoothed_tr: f64 = tr[1..=period].iter().map(|v| v.unwrap_or(0.0)).sum();

    let mut dx = vec![None; n];
    let w = period as f64;

    for i in period..n {
        if i > period {
            // Wilder step: new = prev − prev/N + current.
            smoothed_plus = smoothed_plus - smoothed_plus / w + plus_dm[i];
            smoothed_minus = smoothed_minus - smoothed_minus / w + minus_dm[i];
            smoothed_tr = smoothed_tr - smoothed_tr / w + tr[i].unwrap_or(0.0);
        }

        let (di_p, di_m) = if smoothed_tr > 0.0 {
            (
                smoothed_plus / smoothed_tr * 100.0,
                smoothed_minus / smoothed_tr * 100.0,
            )
        } else {
            (0.0, 0.0)
        };
        series.di_plus[i] = Some(di_p);
        series.di_minus[i] = Some(di_m);

        let di_sum = di_p + di_m;
        dx[i] = Some(if di_sum > 0.0 {
            (di_p - di_m).abs() / di_sum * 100.0
        } else {
            0.0
        });
    }

    // ADX seeds as the mean of dx[period+1 ..= 2*period], then Wilder.
    let seed_range = &dx[period + 1..=2 * period];
    let mut adx_value =
        seed_range.iter().map(|v| v.unwrap_or(0.0)).sum::<f64>() / period as f64;
    series.adx[2 * period] = Some(adx_value);
    for i in (2 * period + 1)..n {
        adx_value = (adx_value * (w - 1.0) + dx[i].unwrap_or(0.0)) / w;
        series.adx[i] = Some(adx_value);
    }

    series
}
