use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candle interval used for market data analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    H1,
    H4,
    D1,
}

impl Timeframe {
    /// Returns the duration of this timeframe in minutes
    pub fn to_minutes(&self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }

    /// Returns the duration in seconds
    pub fn duration_secs(&self) -> i64 {
        self.to_minutes() * 60
    }

    /// Returns the duration in milliseconds
    pub fn duration_ms(&self) -> i64 {
        self.duration_secs() * 1000
    }

    /// Converts to the GMO klines API interval string
    pub fn to_gmo_interval(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1min",
            Timeframe::M5 => "5min",
            Timeframe::M15 => "15min",
            Timeframe::H1 => "1hour",
            Timeframe::H4 => "4hour",
            Timeframe::D1 => "1day",
        }
    }

    /// Whether the GMO klines endpoint expects a yearly `date` (YYYY) for this
    /// interval instead of a daily one (YYYYMMDD). 4-hour and larger intervals
    /// are served per calendar year.
    pub fn uses_yearly_date(&self) -> bool {
        matches!(self, Timeframe::H4 | Timeframe::D1)
    }

    /// Human-readable label matching the published JSON shapes
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }

    /// Returns all available timeframes in ascending order
    pub fn all() -> &'static [Timeframe] {
        &[
            Timeframe::M1,
            Timeframe::M5,
            Timeframe::M15,
            Timeframe::H1,
            Timeframe::H4,
            Timeframe::D1,
        ]
    }

    /// Checks if a timestamp aligns with the start of this timeframe period
    pub fn is_period_start(&self, timestamp_ms: i64) -> bool {
        timestamp_ms % self.duration_ms() == 0
    }

    /// Returns the start timestamp (ms) of the period containing the given timestamp.
    /// Daily candles start at midnight UTC; other frames round down to the
    /// nearest period boundary.
    pub fn period_start(&self, timestamp_ms: i64) -> i64 {
        timestamp_ms - timestamp_ms.rem_euclid(self.duration_ms())
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "1m" | "m1" | "1min" => Ok(Timeframe::M1),
            "5m" | "m5" | "5min" => Ok(Timeframe::M5),
            "15m" | "m15" | "15min" => Ok(Timeframe::M15),
            "1h" | "h1" | "1hour" => Ok(Timeframe::H1),
            "4h" | "h4" | "4hour" => Ok(Timeframe::H4),
            "1d" | "d1" | "1day" => Ok(Timeframe::D1),
            _ => Err(anyhow!(
                "Invalid timeframe: '{}'. Valid options: 1m, 5m, 15m, 1h, 4h, 1d",
                s
            )),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
