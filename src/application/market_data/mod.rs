// Market data processing modules
pub mod aggregator;
pub mod backfill;
pub mod candle_store;
pub mod ingest;

pub use aggregator::TickAggregator;
pub use backfill::KlineBackfiller;
pub use candle_store::CandleStore;
pub use ingest::MarketIngest;
