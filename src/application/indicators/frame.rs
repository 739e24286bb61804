use super::moving::ema;
use super::oscillator::{MacdSeries, macd, rsi};
use super::pivot::{PivotLevels, classic_pivots};
use super::trend::{AdxSeries, adx};
use super::volatility::{BollingerSeries, atr, bollinger};
use crate::domain::market::Candle;
use rust_decimal::prelude::ToPrimitive;

/// Fixed parameterisation of the indicator bundle.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorParams {
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub rsi: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger: usize,
    pub bollinger_k: f64,
    pub atr: usize,
    pub adx: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ema_fast: 20,
            ema_slow: 50,
            rsi: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger: 20,
            bollinger_k: 2.0,
            atr: 14,
            adx: 14,
        }
    }
}

/// The computed indicator bundle over one candle slice. Every series has the
/// same length as the input; warm-up entries stay `None`.
#[derive(Debug, Clone)]
pub struct IndicatorFrame {
    pub ema_fast: Vec<Option<f64>>,
    pub ema_slow: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
    pub macd: MacdSeries,
    pub bollinger: BollingerSeries,
    pub atr: Vec<Option<f64>>,
    pub adx: AdxSeries,
    /// Levels from `previous_daily`, when one was supplied.
    pub pivots: Option<PivotLevels>,
}

impl IndicatorFrame {
    /// Computes the full bundle. `previous_daily` is the last completed D1
    /// bar, used only for the pivot levels.
    pub fn compute(
        candles: &[Candle],
        previous_daily: Option<&Candle>,
        params: &IndicatorParams,
    ) -> Self {
        let closes = close_series(candles);
        Self {
            ema_fast: ema(&closes, params.ema_fast),
            ema_slow: ema(&closes, params.ema_slow),
            rsi: rsi(&closes, params.rsi),
            macd: macd(
                &closes,
                params.macd_fast,
                params.macd_slow,
                params.macd_signal,
            ),
            bollinger: bollinger(&closes, params.bollinger, params.bollinger_k),
            atr: atr(candles, params.atr),
            adx: adx(candles, params.adx),
            pivots: previous_daily.map(classic_pivots),
        }
    }

    /// Value of a series at the last (most recent completed) bar.
    pub fn at_end(series: &[Option<f64>]) -> Option<f64> {
        series.last().copied().flatten()
    }
}

/// Close prices as f64 for the kernel. Decimal→f64 is exact for quoted FX
/// precision.
pub fn close_series(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .map(|c| c.close.to_f64().unwrap_or(f64::NAN))
        .collect()
}
