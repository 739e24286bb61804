use super::aggregator::TickAggregator;
use super::candle_store::CandleStore;
use crate::domain::market::{Quote, Symbol, Timeframe};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast, watch};
use tracing::{debug, info, warn};

/// Shared latest-quote table, one slot per symbol, latest wins.
pub type LatestQuotes = Arc<RwLock<BTreeMap<Symbol, Quote>>>;

/// Worker that drains the quote ring into the candle store.
///
/// Each quote updates the latest-quote table and folds into the per-symbol
/// aggregators; candles completed by the quote are appended to the store.
/// Lag on the quote ring is tolerated: skipped quotes are stale by
/// definition and the aggregator re-synchronises on the next one.
pub struct MarketIngest {
    store: Arc<CandleStore>,
    aggregators: HashMap<Symbol, TickAggregator>,
    quote_rx: broadcast::Receiver<Quote>,
    latest: LatestQuotes,
    shutdown: watch::Receiver<bool>,
}

impl MarketIngest {
    pub fn new(
        store: Arc<CandleStore>,
        symbols: &[Symbol],
        timeframes: &[Timeframe],
        quote_rx: broadcast::Receiver<Quote>,
        latest: LatestQuotes,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let aggregators = symbols
            .iter()
            .map(|&s| (s, TickAggregator::new(s, timeframes.to_vec())))
            .collect();
        Self {
            store,
            aggregators,
            quote_rx,
            latest,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    info!("MarketIngest: shutdown");
                    return;
                }
                received = self.quote_rx.recv() => match received {
                    Ok(quote) => self.on_quote(quote).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("MarketIngest: quote ring overflowed, skipped {missed} stale quotes");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("MarketIngest: quote ring closed");
                        return;
                    }
                },
            }
        }
    }

    async fn on_quote(&mut self, quote: Quote) {
        let symbol = quote.symbol;
        let Some(aggregator) = self.aggregators.get_mut(&symbol) else {
            debug!("MarketIngest: quote for unconfigured symbol {symbol}");
            return;
        };

        {
            let mut latest = self.latest.write().await;
            latest.insert(symbol, quote.clone());
        }

        for (timeframe, candle) in aggregator.on_quote(&quote) {
            self.store.apply(symbol, timeframe, candle).await;
        }
    }
}
