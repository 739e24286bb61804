use crate::application::indicators::{IndicatorFrame, IndicatorParams, slope_at_end};
use crate::domain::market::{Candle, Timeframe};
use crate::domain::signal::{
    AnalysisFrame, EntryKind, EntryPoint, KeyLevels, Momentum, SignalAction, SignalStrength,
    TrendDirection,
};
use rust_decimal::prelude::ToPrimitive;

/// Tunables of the single-timeframe analysis. The weights are fixed by
/// design but kept as named parameters.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub params: IndicatorParams,
    /// Bars over which the slow-EMA slope decides the trend
    pub trend_slope_bars: usize,
    /// How many recent bars may contain the qualifying MACD zero-cross
    pub macd_cross_window: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub base_confidence: f64,
    pub macd_weight: f64,
    pub adx_weight: f64,
    pub trend_age_weight: f64,
    /// Bars the trend must have held for the full age bonus
    pub trend_age_cap: usize,
    /// Window for volatility and key levels
    pub lookback_window: usize,
    pub pullback_atr_mult: f64,
    pub breakout_atr_mult: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            params: IndicatorParams::default(),
            trend_slope_bars: 5,
            macd_cross_window: 3,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            base_confidence: 50.0,
            macd_weight: 10.0,
            adx_weight: 10.0,
            trend_age_weight: 10.0,
            trend_age_cap: 5,
            lookback_window: 20,
            pullback_atr_mult: 1.5,
            breakout_atr_mult: 1.0,
        }
    }
}

fn clip(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}

/// Runs the single-timeframe rules over a slice of completed candles.
///
/// Below warm-up the frame degrades to NEUTRAL with zero confidence instead
/// of failing: an empty chart is an answer, not an error.
pub fn analyze_timeframe(
    timeframe: Timeframe,
    candles: &[Candle],
    previous_daily: Option<&Candle>,
    config: &AnalyzerConfig,
) -> AnalysisFrame {
    let indicators = IndicatorFrame::compute(candles, previous_daily, &config.params);

    let last_idx = match candles.len().checked_sub(1) {
        Some(idx) => idx,
        None => return AnalysisFrame::neutral(timeframe),
    };
    let close = candles[last_idx].close.to_f64().unwrap_or(f64::NAN);

    // All of these must be defined to analyze at all.
    let (Some(ema_fast), Some(ema_slow), Some(rsi), Some(atr), Some(adx)) = (
        IndicatorFrame::at_end(&indicators.ema_fast),
        IndicatorFrame::at_end(&indicators.ema_slow),
        IndicatorFrame::at_end(&indicators.rsi),
        IndicatorFrame::at_end(&indicators.atr),
        IndicatorFrame::at_end(&indicators.adx.adx),
    ) else {
        return AnalysisFrame::neutral(timeframe);
    };
    let Some(hist) = IndicatorFrame::at_end(&indicators.macd.hist) else {
        return AnalysisFrame::neutral(timeframe);
    };

    // Trend: price above the slow EMA, fast above slow, slow EMA rising.
    let slow_slope = slope_at_end(&indicators.ema_slow, config.trend_slope_bars).unwrap_or(0.0);
    let trend = if close > ema_slow && ema_fast > ema_slow && slow_slope > 0.0 {
        TrendDirection::Up
    } else if close < ema_slow && ema_fast < ema_slow && slow_slope < 0.0 {
        TrendDirection::Down
    } else {
        TrendDirection::Range
    };

    // Signal: trend plus a recent MACD zero-cross on the matching side.
    // When several crosses fall inside the window the most recent one wins.
    let cross = latest_zero_cross(&indicators.macd.hist, config.macd_cross_window);
    let signal = match (trend, cross) {
        (TrendDirection::Up, Some(SignalAction::Buy)) if rsi < config.rsi_overbought => {
            SignalAction::Buy
        }
        (TrendDirection::Down, Some(SignalAction::Sell)) if rsi > config.rsi_oversold => {
            SignalAction::Sell
        }
        _ => SignalAction::Neutral,
    };

    let confidence = compute_confidence(config, hist, atr, adx, &indicators, candles, trend);
    let strength = SignalStrength::from_confidence(confidence);
    let momentum = momentum_of(&indicators.macd.hist);
    let volatility = volatility_of(candles, config.lookback_window);
    let key_levels = key_levels_of(candles, config.lookback_window, close);
    let entry_points = entry_point_of(signal, close, ema_fast, atr, config);

    AnalysisFrame {
        timeframe,
        trend,
        signal,
        confidence,
        strength,
        momentum,
        volatility,
        key_levels: Some(key_levels),
        entry_points,
    }
}

/// The most recent zero-cross of the histogram within the last `window`
/// bars, as the side it crossed toward.
fn latest_zero_cross(hist: &[Option<f64>], window: usize) -> Option<SignalAction> {
    let n = hist.len();
    for back in 0..window {
        let Some(i) = n.checked_sub(back + 1) else { break };
        if i == 0 {
            break;
        }
        let (Some(current), Some(previous)) = (hist[i], hist[i - 1]) else {
            break;
        };
        if previous <= 0.0 && current > 0.0 {
            return Some(SignalAction::Buy);
        }
        if previous >= 0.0 && current < 0.0 {
            return Some(SignalAction::Sell);
        }
    }
    None
}

fn compute_confidence(
    config: &AnalyzerConfig,
    hist: f64,
    atr: f64,
    adx: f64,
    indicators: &IndicatorFrame,
    candles: &[Candle],
    trend: TrendDirection,
) -> f64 {
    // Each term is normalised to [0, 1] before weighting.
    let macd_term = if atr > 0.0 {
        clip(hist.abs() / atr, 0.0, 4.0) / 4.0
    } else {
        0.0
    };
    let adx_term = clip(adx - 20.0, 0.0, 30.0) / 30.0;
    let age_term =
        clip(trend_age(indicators, candles, trend) as f64, 0.0, config.trend_age_cap as f64)
            / config.trend_age_cap as f64;

    clip(
        config.base_confidence
            + config.macd_weight * macd_term
            + config.adx_weight * adx_term
            + config.trend_age_weight * age_term,
        0.0,
        100.0,
    )
}

/// How many consecutive completed bars the trend condition has held.
fn trend_age(indicators: &IndicatorFrame, candles: &[Candle], trend: TrendDirection) -> usize {
    if trend == TrendDirection::Range {
        return 0;
    }
    let mut age = 0;
    for i in (0..candles.len()).rev() {
        let close = candles[i].close.to_f64().unwrap_or(f64::NAN);
        let (Some(fast), Some(slow)) = (indicators.ema_fast[i], indicators.ema_slow[i]) else {
            break;
        };
        let holds = match trend {
            TrendDirection::Up => close > slow && fast > slow,
            TrendDirection::Down => close < slow && fast < slow,
            TrendDirection::Range => false,
        };
        if !holds {
            break;
        }
        age += 1;
    }
    age
}

/// Histogram magnitude growing bar over bar means momentum is building.
fn momentum_of(hist: &[Option<f64>]) -> Momentum {
    let n = hist.len();
    if n < 2 {
        return Momentum::Flat;
    }
    let (Some(current), Some(previous)) = (hist[n - 1], hist[n - 2]) else {
        return Momentum::Flat;
    };
    if current.abs() > previous.abs() {
        Momentum::Accel
    } else if current.abs() < previous.abs() {
        Momentum::Decel
    } else {
        Momentum::Flat
    }
}

/// Population standard deviation of percentage returns over the window, in
/// percent.
fn volatility_of(candles: &[Candle], window: usize) -> f64 {
    let closes: Vec<f64> = candles
        .iter()
        .rev()
        .take(window + 1)
        .map(|c| c.close.to_f64().unwrap_or(f64::NAN))
        .collect();
    if closes.len() < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|w| w[1] != 0.0)
        .map(|w| (w[0] - w[1]) / w[1])
        .collect();
    if returns.is_empty() {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>() / returns.len() as f64;
    variance.sqrt() * 100.0
}

fn key_levels_of(candles: &[Candle], window: usize, close: f64) -> KeyLevels {
    let tail = &candles[candles.len().saturating_sub(window)..];
    let resistance = tail
        .iter()
        .map(|c| c.high.to_f64().unwrap_or(f64::NAN))
        .fold(f64::MIN, f64::max);
    let support = tail
        .iter()
        .map(|c| c.low.to_f64().unwrap_or(f64::NAN))
        .fold(f64::MAX, f64::min);
    KeyLevels {
        support,
        resistance,
        pivot: (resistance + support + close) / 3.0,
    }
}

fn entry_point_of(
    signal: SignalAction,
    close: f64,
    ema_fast: f64,
    atr: f64,
    config: &AnalyzerConfig,
) -> Vec<EntryPoint> {
    let direction = match signal {
        SignalAction::Buy => 1.0,
        SignalAction::Sell => -1.0,
        SignalAction::Neutral => return Vec::new(),
    };
    // Entries near the fast EMA are retracements; further out it is a
    // momentum breakout with a tighter stop.
    let (kind, k, reason) = if (close - ema_fast).abs() <= atr {
        (
            EntryKind::Pullback,
            config.pullback_atr_mult,
            "retracement toward the fast EMA within the prevailing trend",
        )
    } else {
        (
            EntryKind::Breakout,
            config.breakout_atr_mult,
            "momentum continuation away from the fast EMA",
        )
    };
    vec![EntryPoint {
        kind,
        price: close,
        stop_loss: close - direction * k * atr,
        take_profit: close + direction * 2.0 * k * atr,
        reason: reason.to_string(),
    }]
}
