use crate::domain::errors::GatewayError;
use crate::domain::market::{Candle, MarketStatus, Quote, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Broker list payloads arrive as `{"list": [...]}`; the list may be absent
/// when there is nothing to report.
#[derive(Debug, Deserialize)]
pub struct ListData<T> {
    #[serde(default)]
    pub list: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct StatusData {
    pub status: String,
}

/// One `/v1/ticker` row. Prices arrive as strings and stay exact decimals.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerEntry {
    pub symbol: String,
    pub ask: Decimal,
    pub bid: Decimal,
    pub timestamp: DateTime<Utc>,
    pub status: String,
}

impl TickerEntry {
    pub fn into_quote(self) -> Result<Quote, GatewayError> {
        let symbol = Symbol::from_str(&self.symbol)
            .map_err(|e| GatewayError::Transport(format!("ticker row: {e}")))?;
        let status = MarketStatus::from_str(&self.status)
            .map_err(|e| GatewayError::Transport(format!("ticker row: {e}")))?;
        Ok(Quote {
            symbol,
            bid: self.bid,
            ask: self.ask,
            timestamp: self.timestamp.timestamp_millis(),
            status,
        })
    }
}

/// One `/v1/klines` row: `openTime` is epoch milliseconds as a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KlineEntry {
    pub open_time: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl KlineEntry {
    pub fn into_candle(self) -> Result<Candle, GatewayError> {
        let open_time = self
            .open_time
            .parse::<i64>()
            .map_err(|e| GatewayError::Transport(format!("kline openTime: {e}")))?;
        Ok(Candle {
            open_time,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: None,
            synthetic: false,
        })
    }
}

/// Trading rule row from `/v1/symbols`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolRule {
    pub symbol: String,
    pub min_open_order_size: Decimal,
    pub max_order_size: Decimal,
    pub size_step: Decimal,
    pub tick_size: Decimal,
}

/// `/v1/account/assets` row (one entry per settlement currency).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountAsset {
    pub equity: Decimal,
    pub available_amount: Decimal,
    pub balance: Decimal,
    pub margin: Decimal,
    pub margin_ratio: Decimal,
    pub position_loss_gain: Decimal,
    pub total_swap: Decimal,
    pub transferable_amount: Decimal,
}

/// `/v1/openPositions` row.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPosition {
    pub position_id: i64,
    pub symbol: String,
    pub side: String,
    pub size: Decimal,
    pub ordered_size: Decimal,
    pub price: Decimal,
    pub loss_gain: Decimal,
    pub total_swap: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// `/v1/positionSummary` row.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSummaryEntry {
    pub symbol: String,
    pub side: String,
    pub average_position_rate: Decimal,
    pub position_loss_gain: Decimal,
    pub sum_ordered_size: Decimal,
    pub sum_position_size: Decimal,
    pub sum_total_swap: Decimal,
}

/// `/v1/activeOrders` row.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveOrder {
    pub root_order_id: i64,
    pub order_id: i64,
    #[serde(default)]
    pub client_order_id: Option<String>,
    pub symbol: String,
    pub side: String,
    pub order_type: String,
    pub execution_type: String,
    pub settle_type: String,
    pub size: Decimal,
    #[serde(default)]
    pub price: Option<Decimal>,
    pub status: String,
    #[serde(default)]
    pub expiry: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// `/v1/executions` and `/v1/latestExecutions` row.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub execution_id: i64,
    pub order_id: i64,
    #[serde(default)]
    pub client_order_id: Option<String>,
    pub position_id: i64,
    pub symbol: String,
    pub side: String,
    pub settle_type: String,
    pub size: Decimal,
    pub price: Decimal,
    pub loss_gain: Decimal,
    pub fee: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Acknowledgement row returned by the order-entry endpoints. The broker
/// echoes slightly different field sets per endpoint, so everything beyond
/// the ids is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    pub root_order_id: i64,
    pub order_id: i64,
    #[serde(default)]
    pub client_order_id: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub execution_type: Option<String>,
    #[serde(default)]
    pub size: Option<Decimal>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Side of an order on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ticker_entry_into_quote() {
        let json = r#"{
            "symbol": "USD_JPY",
            "ask": "137.644",
            "bid": "137.632",
            "timestamp": "2018-03-30T12:34:56.789671Z",
            "status": "OPEN"
        }"#;
        let entry: TickerEntry = serde_json::from_str(json).unwrap();
        let quote = entry.into_quote().unwrap();
        assert_eq!(quote.symbol, Symbol::USD_JPY);
        assert_eq!(quote.ask, dec!(137.644));
        assert_eq!(quote.status, MarketStatus::Open);
    }

    #[test]
    fn test_kline_entry_into_candle() {
        let json = r#"{
            "openTime": "1618588800000",
            "open": "141.365",
            "high": "141.368",
            "low": "141.360",
            "close": "141.362"
        }"#;
        let entry: KlineEntry = serde_json::from_str(json).unwrap();
        let candle = entry.into_candle().unwrap();
        assert_eq!(candle.open_time, 1618588800000);
        assert_eq!(candle.close, dec!(141.362));
        assert!(candle.is_well_formed());
        assert!(!candle.synthetic);
    }

    #[test]
    fn test_unknown_ticker_symbol_is_rejected() {
        let entry = TickerEntry {
            symbol: "BTC_JPY".into(),
            ask: dec!(1),
            bid: dec!(1),
            timestamp: Utc::now(),
            status: "OPEN".into(),
        };
        assert!(entry.into_quote().is_err());
    }

    #[test]
    fn test_list_data_defaults_to_empty() {
        let data: ListData<ActiveOrder> = serde_json::from_str("{}").unwrap();
        assert!(data.list.is_empty());
    }
}
