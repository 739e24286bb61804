use super::analysis::{AnalysisFrame, IntegratedVerdict};
use super::tfqe::TfqeSignal;
use crate::domain::market::{MarketStatus, SessionSummary, Symbol, Timeframe};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Whether the candle store backing a report was fresh at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFreshness {
    Fresh,
    Stale,
}

/// The `GET /signals/tfqe?symbol=S` payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TfqeReport {
    pub symbol: Symbol,
    pub generated_at: DateTime<Utc>,
    pub data_freshness: DataFreshness,
    #[serde(flatten)]
    pub signal: TfqeSignal,
}

/// The `POST /analysis/multi-timeframe` payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiTimeframeReport {
    pub timestamp: DateTime<Utc>,
    pub symbol: Symbol,
    pub timeframes: BTreeMap<Timeframe, AnalysisFrame>,
    pub integrated_strategy: IntegratedVerdict,
    pub market_session: SessionSummary,
    pub data_freshness: DataFreshness,
}

/// One row of the `GET /market/latest` payload, spread pre-derived.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteBoardEntry {
    pub symbol: Symbol,
    pub bid: Decimal,
    pub ask: Decimal,
    pub spread: Decimal,
    pub spread_pips: Decimal,
    pub timestamp: i64,
    pub status: MarketStatus,
}

/// Immutable snapshot of the latest quotes across configured symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct QuoteBoard {
    pub quotes: Vec<QuoteBoardEntry>,
}

/// Immutable snapshot of the latest TFQE evaluation across symbols.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TfqeSnapshot {
    pub generated_at: DateTime<Utc>,
    pub signals: BTreeMap<Symbol, TfqeReport>,
}

/// Immutable snapshot of the latest multi-timeframe analysis across symbols.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MtfSnapshot {
    pub generated_at: DateTime<Utc>,
    pub analyses: BTreeMap<Symbol, MultiTimeframeReport>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_tfqe_report_flattens_signal_tag() {
        let report = TfqeReport {
            symbol: Symbol::AUD_JPY,
            generated_at: Utc.with_ymd_and_hms(2024, 1, 10, 18, 0, 0).unwrap(),
            data_freshness: DataFreshness::Fresh,
            signal: TfqeSignal::OutOfSession,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["symbol"], "AUD_JPY");
        assert_eq!(json["signal"], "OUT_OF_SESSION");
        assert_eq!(json["data_freshness"], "fresh");
    }
}
