mod analyzer;
mod integration;

pub use analyzer::{AnalyzerConfig, analyze_timeframe};
pub use integration::{integrate, timeframe_weight, trading_style};
