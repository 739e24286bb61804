mod session;
mod symbol;
mod timeframe;
mod types;

pub use session::{
    ActivityLevel, MarketTiming, SessionSummary, TimingRecommendation, TradingSession, WeekTiming,
    market_timing, session_summary,
};
pub use symbol::{QuoteKind, Symbol};
pub use timeframe::Timeframe;
pub use types::{Candle, MarketStatus, Quote};
