use super::Symbol;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Broker-reported market state for the FX venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketStatus {
    Open,
    Close,
    Maintenance,
}

impl FromStr for MarketStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(MarketStatus::Open),
            "CLOSE" => Ok(MarketStatus::Close),
            "MAINTENANCE" => Ok(MarketStatus::Maintenance),
            _ => anyhow::bail!("Unknown market status: {}", s),
        }
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketStatus::Open => write!(f, "OPEN"),
            MarketStatus::Close => write!(f, "CLOSE"),
            MarketStatus::Maintenance => write!(f, "MAINTENANCE"),
        }
    }
}

/// A bid/ask snapshot for one pair. Ephemeral, latest wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub bid: Decimal,
    pub ask: Decimal,
    /// Unix timestamp in milliseconds as reported by the broker
    pub timestamp: i64,
    pub status: MarketStatus,
}

impl Quote {
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }

    /// Spread expressed in pips for this pair.
    pub fn spread_pips(&self) -> Decimal {
        self.spread() / self.symbol.pip_size()
    }

    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / dec!(2)
    }
}

/// One OHLC bar. `open_time` is aligned to the owning timeframe grid.
///
/// `synthetic` marks gap-fill bars inserted for market-closed periods: their
/// OHLC all equal the prior close, and indicator consumers may skip them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,
    #[serde(default)]
    pub synthetic: bool,
}

impl Candle {
    /// Flat bar used to fill market-closed gaps: OHLC pinned to the prior close.
    pub fn flat(open_time: i64, close: Decimal) -> Self {
        Self {
            open_time,
            open: close,
            high: close,
            low: close,
            close,
            volume: None,
            synthetic: true,
        }
    }

    /// Checks the OHLC ordering invariant: low <= open, close <= high.
    pub fn is_well_formed(&self) -> bool {
        self.low <= self.open
            && self.low <= self.close
            && self.open <= self.high
            && self.close <= self.high
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd_jpy_quote() -> Quote {
        Quote {
            symbol: Symbol::USD_JPY,
            bid: dec!(137.632),
            ask: dec!(137.644),
            timestamp: 1704067200000,
            status: MarketStatus::Open,
        }
    }

    #[test]
    fn test_spread_and_mid() {
        let q = usd_jpy_quote();
        assert_eq!(q.spread(), dec!(0.012));
        assert_eq!(q.spread_pips(), dec!(1.2));
        assert_eq!(q.mid(), dec!(137.638));
    }

    #[test]
    fn test_spread_pips_usd_quoted() {
        let q = Quote {
            symbol: Symbol::EUR_USD,
            bid: dec!(1.08010),
            ask: dec!(1.08022),
            timestamp: 0,
            status: MarketStatus::Open,
        };
        assert_eq!(q.spread_pips(), dec!(1.2));
    }

    #[test]
    fn test_market_status_round_trip() {
        for s in ["OPEN", "CLOSE", "MAINTENANCE"] {
            let status: MarketStatus = s.parse().unwrap();
            assert_eq!(status.to_string(), s);
        }
        assert!("HALTED".parse::<MarketStatus>().is_err());
    }

    #[test]
    fn test_flat_candle_is_well_formed() {
        let c = Candle::flat(0, dec!(150.0));
        assert!(c.synthetic);
        assert!(c.is_well_formed());
        assert_eq!(c.open, c.close);
        assert_eq!(c.high, c.low);
    }
}
