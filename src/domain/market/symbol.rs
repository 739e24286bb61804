use anyhow::{Result, anyhow};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed set of currency pairs tradable on GMO Coin FX.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum Symbol {
    USD_JPY,
    EUR_JPY,
    GBP_JPY,
    AUD_JPY,
    NZD_JPY,
    CAD_JPY,
    CHF_JPY,
    TRY_JPY,
    ZAR_JPY,
    MXN_JPY,
    EUR_USD,
    GBP_USD,
    AUD_USD,
    NZD_USD,
}

/// Quote currency class. Determines pip size and display precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteKind {
    JpyQuoted,
    UsdQuoted,
}

impl Symbol {
    pub fn all() -> &'static [Symbol] {
        use Symbol::*;
        &[
            USD_JPY, EUR_JPY, GBP_JPY, AUD_JPY, NZD_JPY, CAD_JPY, CHF_JPY, TRY_JPY, ZAR_JPY,
            MXN_JPY, EUR_USD, GBP_USD, AUD_USD, NZD_USD,
        ]
    }

    pub fn quote_kind(&self) -> QuoteKind {
        match self {
            Symbol::EUR_USD | Symbol::GBP_USD | Symbol::AUD_USD | Symbol::NZD_USD => {
                QuoteKind::UsdQuoted
            }
            _ => QuoteKind::JpyQuoted,
        }
    }

    /// One pip expressed in price units: 0.01 for JPY-quoted pairs, 0.0001 otherwise.
    pub fn pip_size(&self) -> Decimal {
        match self.quote_kind() {
            QuoteKind::JpyQuoted => dec!(0.01),
            QuoteKind::UsdQuoted => dec!(0.0001),
        }
    }

    /// Display precision in fractional digits (broker quoting convention).
    pub fn price_precision(&self) -> u32 {
        match self.quote_kind() {
            QuoteKind::JpyQuoted => 3,
            QuoteKind::UsdQuoted => 5,
        }
    }

    /// The wire identifier used by the broker (identical to the Display form).
    pub fn as_str(&self) -> &'static str {
        use Symbol::*;
        match self {
            USD_JPY => "USD_JPY",
            EUR_JPY => "EUR_JPY",
            GBP_JPY => "GBP_JPY",
            AUD_JPY => "AUD_JPY",
            NZD_JPY => "NZD_JPY",
            CAD_JPY => "CAD_JPY",
            CHF_JPY => "CHF_JPY",
            TRY_JPY => "TRY_JPY",
            ZAR_JPY => "ZAR_JPY",
            MXN_JPY => "MXN_JPY",
            EUR_USD => "EUR_USD",
            GBP_USD => "GBP_USD",
            AUD_USD => "AUD_USD",
            NZD_USD => "NZD_USD",
        }
    }
}

impl FromStr for Symbol {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_uppercase().replace('/', "_");
        Symbol::all()
            .iter()
            .find(|sym| sym.as_str() == normalized)
            .copied()
            .ok_or_else(|| anyhow!("Unknown symbol: '{}'. Valid pairs: USD_JPY, EUR_JPY, ...", s))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
