use crate::domain::market::{MarketTiming, Timeframe};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendDirection {
    Up,
    Down,
    Range,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Up => write!(f, "UP"),
            TrendDirection::Down => write!(f, "DOWN"),
            TrendDirection::Range => write!(f, "RANGE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalAction {
    Buy,
    Sell,
    Neutral,
}

/// Confidence bucketed for display: <50 weak, [50, 75) medium, >=75 strong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStrength {
    Weak,
    Medium,
    Strong,
}

impl SignalStrength {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 75.0 {
            SignalStrength::Strong
        } else if confidence >= 50.0 {
            SignalStrength::Medium
        } else {
            SignalStrength::Weak
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Momentum {
    Accel,
    Decel,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "MED")]
    Medium,
    #[serde(rename = "HIGH")]
    High,
}

/// Support/resistance/pivot levels derived from recent completed bars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyLevels {
    pub support: f64,
    pub resistance: f64,
    pub pivot: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Pullback,
    Breakout,
}

/// A candidate entry attached to a single-timeframe analysis frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPoint {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub reason: String,
}

/// Full single-timeframe analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFrame {
    pub timeframe: Timeframe,
    pub trend: TrendDirection,
    pub signal: SignalAction,
    pub confidence: f64,
    pub strength: SignalStrength,
    pub momentum: Momentum,
    pub volatility: f64,
    pub key_levels: Option<KeyLevels>,
    pub entry_points: Vec<EntryPoint>,
}

impl AnalysisFrame {
    /// The neutral frame returned when the buffer is empty or below warm-up.
    pub fn neutral(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            trend: TrendDirection::Range,
            signal: SignalAction::Neutral,
            confidence: 0.0,
            strength: SignalStrength::Weak,
            momentum: Momentum::Flat,
            volatility: 0.0,
            key_levels: None,
            entry_points: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyPriority {
    High,
    Medium,
    Low,
}

/// One entry of the `recommended_strategies` list in the integrated verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyRecommendation {
    pub timeframe: Timeframe,
    pub style: &'static str,
    pub confidence: f64,
    pub priority: StrategyPriority,
}

/// Aggregation of the six per-timeframe frames into one verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegratedVerdict {
    pub signal: SignalAction,
    pub confidence: f64,
    pub alignment_score: f64,
    pub risk_level: RiskLevel,
    pub market_timing: MarketTiming,
    pub recommended_strategies: Vec<StrategyRecommendation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strength_buckets() {
        assert_eq!(SignalStrength::from_confidence(0.0), SignalStrength::Weak);
        assert_eq!(SignalStrength::from_confidence(49.9), SignalStrength::Weak);
        assert_eq!(SignalStrength::from_confidence(50.0), SignalStrength::Medium);
        assert_eq!(SignalStrength::from_confidence(74.9), SignalStrength::Medium);
        assert_eq!(SignalStrength::from_confidence(75.0), SignalStrength::Strong);
    }

    #[test]
    fn test_neutral_frame() {
        let frame = AnalysisFrame::neutral(Timeframe::M5);
        assert_eq!(frame.signal, SignalAction::Neutral);
        assert_eq!(frame.confidence, 0.0);
        assert!(frame.entry_points.is_empty());
        assert!(frame.key_levels.is_none());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(
            serde_json::to_string(&SignalAction::Buy).unwrap(),
            "\"BUY\""
        );
        assert_eq!(serde_json::to_string(&RiskLevel::Medium).unwrap(), "\"MED\"");
        assert_eq!(
            serde_json::to_string(&EntryKind::Pullback).unwrap(),
            "\"pullback\""
        );
    }
}
