use crate::domain::market::{Timeframe, market_timing};
use crate::domain::signal::{
    AnalysisFrame, IntegratedVerdict, RiskLevel, SignalAction, StrategyPriority,
    StrategyRecommendation,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Fixed integration weights: the long frames dominate, the minute frames
/// only nudge.
pub fn timeframe_weight(timeframe: Timeframe) -> f64 {
    match timeframe {
        Timeframe::D1 | Timeframe::H4 | Timeframe::H1 | Timeframe::M15 => 0.20,
        Timeframe::M5 | Timeframe::M1 => 0.10,
    }
}

/// The trading style a timeframe's entries belong to.
pub fn trading_style(timeframe: Timeframe) -> &'static str {
    match timeframe {
        Timeframe::M1 | Timeframe::M5 => "scalping",
        Timeframe::M15 | Timeframe::H1 => "day_trading",
        Timeframe::H4 => "position_trading",
        Timeframe::D1 => "swing_trading",
    }
}

const RECOMMENDATION_MIN_CONFIDENCE: f64 = 65.0;
const MAX_RECOMMENDATIONS: usize = 3;

/// Aggregates the per-timeframe frames into the integrated verdict.
///
/// `signal` is the weight-majority of non-neutral frames; `alignment_score`
/// is the winning share of the participating weight; `confidence` is the
/// weighted mean over the frames that voted with the winner.
pub fn integrate(
    frames: &BTreeMap<Timeframe, AnalysisFrame>,
    now: DateTime<Utc>,
) -> IntegratedVerdict {
    let mut buy_weight = 0.0;
    let mut sell_weight = 0.0;
    for (timeframe, frame) in frames {
        match frame.signal {
            SignalAction::Buy => buy_weight += timeframe_weight(*timeframe),
            SignalAction::Sell => sell_weight += timeframe_weight(*timeframe),
            SignalAction::Neutral => {}
        }
    }

    let signal = if buy_weight > sell_weight {
        SignalAction::Buy
    } else if sell_weight > buy_weight {
        SignalAction::Sell
    } else {
        SignalAction::Neutral
    };

    let participating = buy_weight + sell_weight;
    let alignment_score = if participating > 0.0 {
        buy_weight.max(sell_weight) / participating
    } else {
        0.0
    };

    let confidence = if signal == SignalAction::Neutral {
        0.0
    } else {
        let mut weighted = 0.0;
        let mut weight_sum = 0.0;
        for (timeframe, frame) in frames {
            if frame.signal == signal {
                let weight = timeframe_weight(*timeframe);
                weighted += frame.confidence * weight;
                weight_sum += weight;
            }
        }
        if weight_sum > 0.0 { weighted / weight_sum } else { 0.0 }
    };

    let risk_level = if alignment_score < 0.5 {
        RiskLevel::High
    } else if alignment_score < 0.75 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    let mut recommended_strategies: Vec<StrategyRecommendation> = frames
        .iter()
        .filter(|(_, frame)| {
            frame.signal == signal
                && signal != SignalAction::Neutral
                && frame.confidence > RECOMMENDATION_MIN_CONFIDENCE
        })
        .map(|(timeframe, frame)| StrategyRecommendation {
            timeframe: *timeframe,
            style: trading_style(*timeframe),
            confidence: frame.confidence,
            priority: if frame.confidence > 80.0 {
                StrategyPriority::High
            } else {
                StrategyPriority::Medium
            },
        })
        .collect();
    recommended_strategies
        .sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
    recommended_strategies.truncate(MAX_RECOMMENDATIONS);

    IntegratedVerdict {
        signal,
        confidence,
        alignment_score,
        risk_level,
        market_timing: market_timing(now),
        recommended_strategies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn frame(timeframe: Timeframe, signal: SignalAction, confidence: f64) -> AnalysisFrame {
        AnalysisFrame {
            confidence,
            signal,
            ..AnalysisFrame::neutral(timeframe)
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_majority_buy_with_partial_alignment() {
        // BUY on D1/H4/H1 (70/65/60), SELL on M5/M1 (55/50), NEUTRAL on M15.
        let mut frames = BTreeMap::new();
        frames.insert(Timeframe::D1, frame(Timeframe::D1, SignalAction::Buy, 70.0));
        frames.insert(Timeframe::H4, frame(Timeframe::H4, SignalAction::Buy, 65.0));
        frames.insert(Timeframe::H1, frame(Timeframe::H1, SignalAction::Buy, 60.0));
        frames.insert(
            Timeframe::M15,
            frame(Timeframe::M15, SignalAction::Neutral, 40.0),
        );
        frames.insert(Timeframe::M5, frame(Timeframe::M5, SignalAction::Sell, 55.0));
        frames.insert(Timeframe::M1, frame(Timeframe::M1, SignalAction::Sell, 50.0));

        let verdict = integrate(&frames, now());
        assert_eq!(verdict.signal, SignalAction::Buy);
        // (0.2+0.2+0.2) / (0.2+0.2+0.2+0.1+0.1) = 0.75
        assert!((verdict.alignment_score - 0.75).abs() < 1e-9);
        assert_eq!(verdict.risk_level, RiskLevel::Low);
        // (70*0.2 + 65*0.2 + 60*0.2) / 0.6 = 65
        assert!((verdict.confidence - 65.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_neutral_is_neutral() {
        let mut frames = BTreeMap::new();
        for &tf in Timeframe::all() {
            frames.insert(tf, frame(tf, SignalAction::Neutral, 30.0));
        }
        let verdict = integrate(&frames, now());
        assert_eq!(verdict.signal, SignalAction::Neutral);
        assert_eq!(verdict.alignment_score, 0.0);
        assert_eq!(verdict.confidence, 0.0);
        assert_eq!(verdict.risk_level, RiskLevel::High);
        assert!(verdict.recommended_strategies.is_empty());
    }

    #[test]
    fn test_split_vote_raises_risk() {
        let mut frames = BTreeMap::new();
        frames.insert(Timeframe::D1, frame(Timeframe::D1, SignalAction::Buy, 70.0));
        frames.insert(Timeframe::H4, frame(Timeframe::H4, SignalAction::Sell, 70.0));
        frames.insert(Timeframe::H1, frame(Timeframe::H1, SignalAction::Sell, 60.0));
        let verdict = integrate(&frames, now());
        assert_eq!(verdict.signal, SignalAction::Sell);
        // 0.4 / 0.6 = 0.667 -> MED
        assert_eq!(verdict.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_recommendations_filtered_and_capped() {
        let mut frames = BTreeMap::new();
        frames.insert(Timeframe::D1, frame(Timeframe::D1, SignalAction::Buy, 85.0));
        frames.insert(Timeframe::H4, frame(Timeframe::H4, SignalAction::Buy, 75.0));
        frames.insert(Timeframe::H1, frame(Timeframe::H1, SignalAction::Buy, 70.0));
        frames.insert(Timeframe::M15, frame(Timeframe::M15, SignalAction::Buy, 68.0));
        frames.insert(Timeframe::M5, frame(Timeframe::M5, SignalAction::Buy, 50.0));

        let verdict = integrate(&frames, now());
        assert_eq!(verdict.recommended_strategies.len(), MAX_RECOMMENDATIONS);
        assert_eq!(verdict.recommended_strategies[0].timeframe, Timeframe::D1);
        assert_eq!(
            verdict.recommended_strategies[0].priority,
            StrategyPriority::High
        );
        assert_eq!(verdict.recommended_strategies[0].style, "swing_trading");
        // The 50-confidence frame never qualifies.
        assert!(
            verdict
                .recommended_strategies
                .iter()
                .all(|r| r.confidence > RECOMMENDATION_MIN_CONFIDENCE)
        );
    }
}
