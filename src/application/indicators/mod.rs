//! Pure technical-indicator kernel.
//!
//! Every function maps a slice to a same-length series of `Option<f64>`,
//! where `None` is the deterministic warm-up region. No hidden state: the
//! same input always produces the same output regardless of batching, and a
//! prefix of the input produces a prefix of the output. Precision is within
//! 1 ulp of the textbook recursions.

mod frame;
mod moving;
mod oscillator;
mod pivot;
mod trend;
mod volatility;

pub use frame::{IndicatorFrame, IndicatorParams, close_series};
pub use moving::{ema, slope_at_end, sma};
pub use oscillator::{MacdSeries, macd, rsi};
pub use pivot::{PivotLevels, classic_pivots};
pub use trend::{AdxSeries, adx};
pub use volatility::{BollingerSeries, atr, bollinger, true_range};
