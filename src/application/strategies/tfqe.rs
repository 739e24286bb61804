use super::Strategy;
use crate::application::indicators::{adx, atr, close_series, ema};
use crate::application::market_data::CandleStore;
use crate::domain::market::{Symbol, Timeframe};
use crate::domain::signal::{
    TfqeNoTrend, TfqeOrderPlan, TfqeSignal, TfqeWait, TradeManagement, TrendDirection,
};
use chrono::{DateTime, Timelike, Utc};
use futures_util::future::BoxFuture;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::sync::Arc;
use tracing::debug;

/// Parameters of the trend-follow quick-exit strategy. H1 supplies the
/// trend context, M15 the entry trigger.
#[derive(Debug, Clone)]
pub struct TfqeConfig {
    /// Session window in minutes-of-day, JST clock. Default 16:00-24:00.
    pub session_start_min: u32,
    pub session_end_min: u32,
    pub h1_ema_fast: usize,
    pub h1_ema_slow: usize,
    pub adx_period: usize,
    pub adx_min: f64,
    pub m15_ema: usize,
    pub atr_period: usize,
    /// Acceptable (price - EMA20) / ATR band on the trend side
    pub distance_max: f64,
    pub distance_min: f64,
    pub atr_stop_mult: Decimal,
    pub tp1_mult: Decimal,
    pub tp2_mult: Decimal,
    pub confidence_ceiling: u8,
    /// Candles fetched per timeframe each tick
    pub lookback: usize,
}

impl Default for TfqeConfig {
    fn default() -> Self {
        Self {
            session_start_min: 16 * 60,
            session_end_min: 24 * 60,
            h1_ema_fast: 20,
            h1_ema_slow: 50,
            adx_period: 14,
            adx_min: 20.0,
            m15_ema: 20,
            atr_period: 14,
            distance_max: 0.2,
            distance_min: -0.5,
            atr_stop_mult: Decimal::new(15, 1),
            tp1_mult: Decimal::ONE,
            tp2_mult: Decimal::TWO,
            confidence_ceiling: 95,
            lookback: 120,
        }
    }
}

impl TfqeConfig {
    fn in_session(&self, now: DateTime<Utc>) -> bool {
        let jst_min = ((now.hour() + 9) % 24) * 60 + now.minute();
        if self.session_start_min <= self.session_end_min {
            (self.session_start_min..self.session_end_min).contains(&jst_min)
        } else {
            // Window wrapping past midnight JST.
            jst_min >= self.session_start_min || jst_min < self.session_end_min
        }
    }
}

/// Builds the TFQE capability record for the publisher's strategy list.
pub fn tfqe_strategy(config: TfqeConfig) -> Strategy {
    let config = Arc::new(config);
    Strategy::new(
        "tfqe",
        Arc::new(move |store, symbol, now| -> BoxFuture<'static, TfqeSignal> {
            let config = config.clone();
            Box::pin(async move { evaluate(&config, &store, symbol, now).await })
        }),
    )
}

/// Runs the gate sequence once. The first failing gate decides the signal.
pub async fn evaluate(
    config: &TfqeConfig,
    store: &CandleStore,
    symbol: Symbol,
    now: DateTime<Utc>,
) -> TfqeSignal {
    // Gate 1: session. Signals are only valid through the London/NY window.
    if !config.in_session(now) {
        return TfqeSignal::OutOfSession;
    }

    // Gate 2: H1 trend bias.
    let h1 = store.snapshot(symbol, Timeframe::H1, config.lookback).await;
    let h1_closes = close_series(&h1);
    let h1_fast = last_defined(&ema(&h1_closes, config.h1_ema_fast));
    let h1_slow = last_defined(&ema(&h1_closes, config.h1_ema_slow));
    let h1_adx = last_defined(&adx(&h1, config.adx_period).adx);

    let (Some(fast), Some(slow), Some(adx_value)) = (h1_fast, h1_slow, h1_adx) else {
        return TfqeSignal::NoTrend(TfqeNoTrend {
            h1_adx: None,
            reason: "insufficient H1 history for trend bias".to_string(),
        });
    };

    let h1_trend = if fast > slow && adx_value >= config.adx_min {
        TrendDirection::Up
    } else if fast < slow && adx_value >= config.adx_min {
        TrendDirection::Down
    } else {
        return TfqeSignal::NoTrend(TfqeNoTrend {
            h1_adx: Some(adx_value),
            reason: format!("no H1 trend (ADX {:.1})", adx_value),
        });
    };

    // Gate 3: M15 proximity to the fast EMA, measured in ATRs.
    let m15 = store.snapshot(symbol, Timeframe::M15, config.lookback).await;
    let m15_closes = close_series(&m15);
    let m15_ema20 = last_defined(&ema(&m15_closes, config.m15_ema));
    let m15_atr = last_defined(&atr(&m15, config.atr_period));
    let last_bar = m15.last();

    let (Some(ema20), Some(atr_value), Some(bar)) = (m15_ema20, m15_atr, last_bar) else {
        return TfqeSignal::NoTrend(TfqeNoTrend {
            h1_adx: Some(adx_value),
            reason: "insufficient M15 history for entry timing".to_string(),
        });
    };
    if atr_value <= 0.0 {
        return TfqeSignal::NoTrend(TfqeNoTrend {
            h1_adx: Some(adx_value),
            reason: "M15 volatility collapsed to zero".to_string(),
        });
    }

    let price = m15_closes.last().copied().unwrap_or(f64::NAN);
    let distance = (price - ema20) / atr_value;

    let wait = TfqeWait {
        h1_trend,
        h1_adx: adx_value,
        m15_price: bar.close,
        m15_ema20: ema20,
        m15_atr: atr_value,
        distance,
    };

    match h1_trend {
        TrendDirection::Up => {
            if distance > config.distance_max {
                return TfqeSignal::WaitingPullback(wait);
            }
            if distance < config.distance_min {
                return TfqeSignal::NoTrend(TfqeNoTrend {
                    h1_adx: Some(adx_value),
                    reason: format!("price {distance:.2} ATRs under EMA20, trend failing"),
                });
            }
            // Gate 4: bullish trigger bar closing back above the EMA.
            if !(bar.close > bar.open && price > ema20) {
                return TfqeSignal::WaitingPullback(wait);
            }
        }
        TrendDirection::Down => {
            if distance < -config.distance_max {
                return TfqeSignal::WaitingRally(wait);
            }
            if distance > -config.distance_min {
                return TfqeSignal::NoTrend(TfqeNoTrend {
                    h1_adx: Some(adx_value),
                    reason: format!("price {distance:.2} ATRs over EMA20, trend failing"),
                });
            }
            if !(bar.close < bar.open && price < ema20) {
                return TfqeSignal::WaitingRally(wait);
            }
        }
        TrendDirection::Range => {
            return TfqeSignal::NoTrend(TfqeNoTrend {
                h1_adx: Some(adx_value),
                reason: "no H1 trend".to_string(),
            });
        }
    }

    debug!("TFQE: {symbol} trigger bar confirmed, building order plan");
    let plan = build_order_plan(config, symbol, h1_trend, adx_value, &wait);
    match h1_trend {
        TrendDirection::Up => TfqeSignal::Buy(plan),
        _ => TfqeSignal::Sell(plan),
    }
}

fn last_defined(series: &[Option<f64>]) -> Option<f64> {
    series.last().copied().flatten()
}

/// Exact-decimal order arithmetic. The ATR is quantised to two digits past
/// the pair's quoting precision before any level is derived, and every level
/// is rounded to the quoting precision, so the published pips follow from
/// the published levels exactly.
fn build_order_plan(
    config: &TfqeConfig,
    symbol: Symbol,
    h1_trend: TrendDirection,
    h1_adx: f64,
    wait: &TfqeWait,
) -> TfqeOrderPlan {
    let precision = symbol.price_precision();
    let pip = symbol.pip_size();
    let entry = wait.m15_price;
    let atr_dec = Decimal::from_f64(wait.m15_atr)
        .unwrap_or_default()
        .round_dp(precision + 2);

    let direction = match h1_trend {
        TrendDirection::Up => Decimal::ONE,
        _ => Decimal::NEGATIVE_ONE,
    };

    let stop_loss = (entry - direction * config.atr_stop_mult * atr_dec).round_dp(precision);
    let tp1 = (entry + direction * config.tp1_mult * atr_dec).round_dp(precision);
    let tp2 = (entry + direction * config.tp2_mult * atr_dec).round_dp(precision);

    let risk_pips = (direction * (entry - stop_loss)) / pip;
    let reward_pips = (direction * (tp1 - entry)) / pip;

    // 50 + ADX excess + proximity bonus, integer-rounded with a hard ceiling.
    let adx_term = (h1_adx - 20.0).clamp(0.0, 30.0);
    let proximity_term = (20.0 * (1.0 - wait.distance.abs() / 0.5)).clamp(0.0, 20.0);
    let confidence =
        ((50.0 + adx_term + proximity_term).round() as u8).min(config.confidence_ceiling);

    let management = match h1_trend {
        TrendDirection::Up => TradeManagement::long(),
        _ => TradeManagement::short(),
    };

    TfqeOrderPlan {
        entry,
        stop_loss,
        tp1,
        tp2,
        risk_pips,
        reward_pips,
        confidence,
        h1_trend,
        h1_adx,
        m15_price: wait.m15_price,
        m15_ema20: wait.m15_ema20,
        m15_atr: wait.m15_atr,
        distance: wait.distance,
        management,
    }
}
