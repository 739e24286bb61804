use crate::domain::market::Candle;
use rust_decimal::prelude::ToPrimitive;

/// Classic floor-trader pivot levels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PivotLevels {
    pub pivot: f64,
    pub r1: f64,
    pub s1: f64,
}

/// Computes P = (H + L + C) / 3, R1 = 2P − L, S1 = 2P − H from the previous
/// completed daily bar.
pub fn classic_pivots(previous_daily: &Candle) -> PivotLevels {
    let high = previous_daily.high.to_f64().unwrap_or(f64::NAN);
    let low = previous_daily.low.to_f64().unwrap_or(f64::NAN);
    let close = previous_daily.close.to_f64().unwrap_or(f64::NAN);

    let pivot = (high + low + close) / 3.0;
    PivotLevels {
        pivot,
        r1: 2.0 * pivot - low,
        s1: 2.0 * pivot - high,
    }
}
