use crate::domain::market::{Candle, Symbol, Timeframe};
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Optional persistence behind the in-memory candle rings.
///
/// The core never requires a backend; when one is attached the store reads
/// and writes candle history exclusively through this interface.
#[async_trait]
pub trait CandleBackend: Send + Sync {
    /// Load up to `n` most recent candles, ascending by open_time.
    async fn load(&self, symbol: Symbol, timeframe: Timeframe, n: usize) -> Result<Vec<Candle>>;

    /// Persist one completed candle.
    async fn append(&self, symbol: Symbol, timeframe: Timeframe, candle: &Candle) -> Result<()>;
}

/// Clock-tick source consumed by periodic jobs.
///
/// Production code uses interval tickers; tests inject manual ones so the
/// publisher can be driven deterministically.
#[async_trait]
pub trait Ticker: Send {
    /// Completes when the next tick is due. Never completes after `close`.
    async fn tick(&mut self) -> Option<()>;
}

/// Wall-clock ticker with a fixed period and an optional initial alignment delay.
pub struct IntervalTicker {
    delay: Option<Duration>,
    interval: tokio::time::Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        Self::aligned(period, Duration::ZERO)
    }

    /// Ticker whose first tick fires after `delay`, then every `period`.
    pub fn aligned(period: Duration, delay: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        Self {
            delay: (delay > Duration::ZERO).then_some(delay),
            interval,
        }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> Option<()> {
        if let Some(delay) = self.delay.take() {
            tokio::time::sleep(delay).await;
            // The interval started counting at construction; resync to now.
            self.interval.reset();
            return Some(());
        }
        self.interval.tick().await;
        Some(())
    }
}

/// Test ticker driven by an mpsc channel; yields once per received message
/// and stops when the sender is dropped.
pub struct ManualTicker(pub tokio::sync::mpsc::Receiver<()>);

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> Option<()> {
        self.0.recv().await
    }
}
