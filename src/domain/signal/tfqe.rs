use super::analysis::TrendDirection;
use rust_decimal::Decimal;
use serde::Serialize;

/// Post-entry management contract published alongside every live TFQE signal.
///
/// The gateway does not execute this in read-only mode; when trading is
/// enabled the order layer realises it through an IFDOCO composite order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeManagement {
    /// Fraction of the position closed when TP1 fills
    pub tp1_close_ratio: f64,
    /// Whether the stop moves to entry after the TP1 partial close
    pub breakeven_after_tp1: bool,
    /// Exit rule for the remainder of the position
    pub exit_rule: &'static str,
}

impl TradeManagement {
    pub fn long() -> Self {
        Self {
            tp1_close_ratio: 0.5,
            breakeven_after_tp1: true,
            exit_rule: "hold until an M15 bar closes below EMA20",
        }
    }

    pub fn short() -> Self {
        Self {
            tp1_close_ratio: 0.5,
            breakeven_after_tp1: true,
            exit_rule: "hold until an M15 bar closes above EMA20",
        }
    }
}

/// A fully specified entry recommendation with risk/reward arithmetic.
///
/// Entry, stop and targets are exact decimals rounded to the pair's quoting
/// precision; `risk_pips`/`reward_pips` follow from them exactly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TfqeOrderPlan {
    pub entry: Decimal,
    pub stop_loss: Decimal,
    pub tp1: Decimal,
    pub tp2: Decimal,
    pub risk_pips: Decimal,
    pub reward_pips: Decimal,
    pub confidence: u8,
    pub h1_trend: TrendDirection,
    pub h1_adx: f64,
    pub m15_price: Decimal,
    pub m15_ema20: f64,
    pub m15_atr: f64,
    pub distance: f64,
    pub management: TradeManagement,
}

/// Context published while the strategy is waiting for its trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TfqeWait {
    pub h1_trend: TrendDirection,
    pub h1_adx: f64,
    pub m15_price: Decimal,
    pub m15_ema20: f64,
    pub m15_atr: f64,
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TfqeNoTrend {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h1_adx: Option<f64>,
    pub reason: String,
}

/// The one signal the TFQE state machine emits per symbol per tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "signal")]
pub enum TfqeSignal {
    #[serde(rename = "BUY")]
    Buy(TfqeOrderPlan),
    #[serde(rename = "SELL")]
    Sell(TfqeOrderPlan),
    #[serde(rename = "WAITING_PULLBACK")]
    WaitingPullback(TfqeWait),
    #[serde(rename = "WAITING_RALLY")]
    WaitingRally(TfqeWait),
    #[serde(rename = "NO_TREND")]
    NoTrend(TfqeNoTrend),
    #[serde(rename = "OUT_OF_SESSION")]
    OutOfSession,
}

impl TfqeSignal {
    pub fn is_actionable(&self) -> bool {
        matches!(self, TfqeSignal::Buy(_) | TfqeSignal::Sell(_))
    }

    pub fn order_plan(&self) -> Option<&TfqeOrderPlan> {
        match self {
            TfqeSignal::Buy(plan) | TfqeSignal::Sell(plan) => Some(plan),
            _ => None,
        }
    }
}
