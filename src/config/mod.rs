//! Configuration loading from environment variables.
//!
//! Credentials, the trading-enable flag, symbol selection, TFQE session and
//! multiplier tuning, rate-limit ceilings and the clock-skew window all load
//! here; everything has a sane default except the credentials, whose absence
//! simply downgrades the gateway to public-only.

use crate::application::strategies::TfqeConfig;
use crate::domain::market::Symbol;
use crate::infrastructure::core::rate_limiter::RateLimitConfig;
use crate::infrastructure::gmo::rest::PriceType;
use anyhow::{Context, Result, bail};
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// Order endpoints stay unreachable unless this is explicitly true.
    pub trading_enabled: bool,
    pub symbols: Vec<Symbol>,

    // TFQE tuning
    pub tfqe_session_start_min: u32,
    pub tfqe_session_end_min: u32,
    pub tfqe_atr_stop_mult: Decimal,
    pub tfqe_tp1_mult: Decimal,
    pub tfqe_tp2_mult: Decimal,

    /// Which side of the book the kline backfill requests.
    pub kline_price_type: PriceType,

    // Broker ceilings
    pub limits: RateLimitConfig,
    pub clock_skew_max_ms: i64,

    // Endpoints
    pub public_base_url: String,
    pub private_base_url: String,
    pub ws_public_url: String,
    pub ws_private_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GMO_API_KEY").ok().filter(|v| !v.is_empty());
        let api_secret = env::var("GMO_API_SECRET").ok().filter(|v| !v.is_empty());
        if api_key.is_some() != api_secret.is_some() {
            bail!("GMO_API_KEY and GMO_API_SECRET must be set together");
        }

        let symbols = parse_symbols(
            &env::var("SYMBOLS").unwrap_or_else(|_| "USD_JPY,EUR_USD,EUR_JPY,GBP_JPY".to_string()),
        )?;

        let limits = RateLimitConfig {
            public_get_per_sec: env_parse("LIMITS_PUBLIC_GET_PER_SEC", 6.0)?,
            private_get_per_sec: env_parse("LIMITS_GET_PER_SEC", 6.0)?,
            private_post_per_sec: env_parse("LIMITS_POST_PER_SEC", 1.0)?,
            ws_sub_per_sec: env_parse("LIMITS_WS_SUB_PER_SEC", 1.0)?,
        };

        Ok(Self {
            api_key,
            api_secret,
            trading_enabled: env_parse("TRADING_ENABLED", false)?,
            symbols,
            tfqe_session_start_min: parse_clock_time(
                &env::var("TFQE_SESSION_START").unwrap_or_else(|_| "16:00".to_string()),
            )
            .context("TFQE_SESSION_START")?,
            tfqe_session_end_min: parse_clock_time(
                &env::var("TFQE_SESSION_END").unwrap_or_else(|_| "24:00".to_string()),
            )
            .context("TFQE_SESSION_END")?,
            tfqe_atr_stop_mult: env_parse("TFQE_ATR_STOP_MULT", Decimal::new(15, 1))?,
            tfqe_tp1_mult: env_parse("TFQE_TP1_MULT", Decimal::ONE)?,
            tfqe_tp2_mult: env_parse("TFQE_TP2_MULT", Decimal::TWO)?,
            kline_price_type: parse_price_type(
                &env::var("KLINE_PRICE_TYPE").unwrap_or_else(|_| "ASK".to_string()),
            )?,
            limits,
            clock_skew_max_ms: env_parse("CLOCK_SKEW_MAX_MS", 5000)?,
            public_base_url: env::var("GMO_PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "https://forex-api.coin.z.com/public".to_string()),
            private_base_url: env::var("GMO_PRIVATE_BASE_URL")
                .unwrap_or_else(|_| "https://forex-api.coin.z.com/private".to_string()),
            ws_public_url: env::var("GMO_WS_PUBLIC_URL")
                .unwrap_or_else(|_| "wss://forex-api.coin.z.com/ws/public".to_string()),
            ws_private_url: env::var("GMO_WS_PRIVATE_URL")
                .unwrap_or_else(|_| "wss://forex-api.coin.z.com/ws/private".to_string()),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() && self.api_secret.is_some()
    }

    /// The strategy parameters implied by this configuration.
    pub fn tfqe_config(&self) -> TfqeConfig {
        TfqeConfig {
            session_start_min: self.tfqe_session_start_min,
            session_end_min: self.tfqe_session_end_min,
            atr_stop_mult: self.tfqe_atr_stop_mult,
            tp1_mult: self.tfqe_tp1_mult,
            tp2_mult: self.tfqe_tp2_mult,
            ..TfqeConfig::default()
        }
    }
}

fn env_parse<T: FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.is_empty() => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid {}: {} ({})", name, raw, e)),
        _ => Ok(default),
    }
}

fn parse_symbols(raw: &str) -> Result<Vec<Symbol>> {
    let mut symbols = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let symbol = Symbol::from_str(part)?;
        if !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    if symbols.is_empty() {
        bail!("SYMBOLS must name at least one currency pair");
    }
    Ok(symbols)
}

fn parse_price_type(raw: &str) -> Result<PriceType> {
    match raw.trim().to_uppercase().as_str() {
        "ASK" => Ok(PriceType::Ask),
        "BID" => Ok(PriceType::Bid),
        other => bail!("Invalid KLINE_PRICE_TYPE: {}. Must be 'ASK' or 'BID'", other),
    }
}

/// Parses an "HH:MM" clock time into minutes of day. "24:00" is accepted as
/// the exclusive end-of-day bound (1440).
fn parse_clock_time(raw: &str) -> Result<u32> {
    let (hours, minutes) = raw
        .split_once(':')
        .with_context(|| format!("expected HH:MM, got '{raw}'"))?;
    let hours: u32 = hours.parse().with_context(|| format!("bad hour in '{raw}'"))?;
    let minutes: u32 = minutes
        .parse()
        .with_context(|| format!("bad minute in '{raw}'"))?;
    if minutes > 59 || hours > 24 || (hours == 24 && minutes != 0) {
        bail!("clock time out of range: '{raw}'");
    }
    Ok(hours * 60 + minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clock_time() {
        assert_eq!(parse_clock_time("16:00").unwrap(), 960);
        assert_eq!(parse_clock_time("24:00").unwrap(), 1440);
        assert_eq!(parse_clock_time("09:30").unwrap(), 570);
        assert!(parse_clock_time("25:00").is_err());
        assert!(parse_clock_time("12:61").is_err());
        assert!(parse_clock_time("1200").is_err());
    }

    #[test]
    fn test_parse_price_type() {
        assert_eq!(parse_price_type("ask").unwrap(), PriceType::Ask);
        assert_eq!(parse_price_type("BID").unwrap(), PriceType::Bid);
        assert!(parse_price_type("MID").is_err());
    }

    #[test]
    fn test_parse_symbols() {
        let symbols = parse_symbols("USD_JPY, EUR_USD,USD_JPY").unwrap();
        assert_eq!(symbols, vec![Symbol::USD_JPY, Symbol::EUR_USD]);
        assert!(parse_symbols("").is_err());
        assert!(parse_symbols("BTC_USD").is_err());
    }
}
