use crate::application::analysis::{AnalyzerConfig, analyze_timeframe, integrate};
use crate::application::market_data::{CandleStore, KlineBackfiller};
use crate::application::market_data::ingest::LatestQuotes;
use crate::application::strategies::Strategy;
use crate::domain::market::{Symbol, Timeframe, session_summary};
use crate::domain::ports::Ticker;
use crate::domain::signal::{
    DataFreshness, MtfSnapshot, MultiTimeframeReport, QuoteBoard, QuoteBoardEntry, TfqeReport,
    TfqeSignal, TfqeSnapshot,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};

/// When the backing data is stale the published confidence is capped here.
const STALE_CONFIDENCE_CAP: f64 = 30.0;
const STALE_CONFIDENCE_CAP_U8: u8 = 30;

/// Candles handed to the analyzer per timeframe.
const ANALYSIS_LOOKBACK: usize = 200;

/// Grace period after the M15 boundary before the TFQE tick fires.
pub const TFQE_TICK_GRACE: Duration = Duration::from_secs(2);
pub const TFQE_TICK_PERIOD: Duration = Duration::from_secs(15 * 60);
pub const MTF_TICK_PERIOD: Duration = Duration::from_secs(60);

/// Delay from `now` until the next M15 boundary plus the grace period.
pub fn delay_to_next_tfqe_tick(now: DateTime<Utc>) -> Duration {
    let period_ms = TFQE_TICK_PERIOD.as_millis() as i64;
    let now_ms = now.timestamp_millis();
    let next_boundary = now_ms - now_ms.rem_euclid(period_ms) + period_ms;
    Duration::from_millis((next_boundary - now_ms) as u64) + TFQE_TICK_GRACE
}

/// Read surface of the publisher. Each snapshot sits behind an atomically
/// swapped `Arc`: a reader gets either the previous or the next snapshot in
/// full, never a torn view.
pub struct SnapshotHub {
    tfqe: RwLock<Arc<TfqeSnapshot>>,
    mtf: RwLock<Arc<MtfSnapshot>>,
    latest_quotes: LatestQuotes,
}

impl SnapshotHub {
    pub fn new(latest_quotes: LatestQuotes, started_at: DateTime<Utc>) -> Self {
        Self {
            tfqe: RwLock::new(Arc::new(TfqeSnapshot {
                generated_at: started_at,
                signals: BTreeMap::new(),
            })),
            mtf: RwLock::new(Arc::new(MtfSnapshot {
                generated_at: started_at,
                analyses: BTreeMap::new(),
            })),
            latest_quotes,
        }
    }

    /// The `GET /signals/tfqe` source.
    pub async fn tfqe(&self) -> Arc<TfqeSnapshot> {
        self.tfqe.read().await.clone()
    }

    pub async fn tfqe_for(&self, symbol: Symbol) -> Option<TfqeReport> {
        self.tfqe.read().await.signals.get(&symbol).cloned()
    }

    /// The `POST /analysis/multi-timeframe` source.
    pub async fn multi_timeframe(&self) -> Arc<MtfSnapshot> {
        self.mtf.read().await.clone()
    }

    pub async fn multi_timeframe_for(&self, symbol: Symbol) -> Option<MultiTimeframeReport> {
        self.mtf.read().await.analyses.get(&symbol).cloned()
    }

    /// The `GET /market/latest` source, spread pre-derived per row.
    pub async fn quote_board(&self) -> QuoteBoard {
        let latest = self.latest_quotes.read().await;
        QuoteBoard {
            quotes: latest
                .values()
                .map(|q| QuoteBoardEntry {
                    symbol: q.symbol,
                    bid: q.bid,
                    ask: q.ask,
                    spread: q.spread(),
                    spread_pips: q.spread_pips(),
                    timestamp: q.timestamp,
                    status: q.status,
                })
                .collect(),
        }
    }

    async fn publish_tfqe(&self, snapshot: TfqeSnapshot) {
        *self.tfqe.write().await = Arc::new(snapshot);
    }

    async fn publish_mtf(&self, snapshot: MtfSnapshot) {
        *self.mtf.write().await = Arc::new(snapshot);
    }
}

/// Periodic engine driver: wakes on its tickers, refreshes stale rings,
/// re-runs the strategy list and the analyzer, and swaps in fresh snapshots.
pub struct SignalPublisher {
    store: Arc<CandleStore>,
    backfiller: Option<Arc<KlineBackfiller>>,
    strategies: Vec<Strategy>,
    analyzer_config: AnalyzerConfig,
    symbols: Vec<Symbol>,
    hub: Arc<SnapshotHub>,
}

impl SignalPublisher {
    pub fn new(
        store: Arc<CandleStore>,
        backfiller: Option<Arc<KlineBackfiller>>,
        strategies: Vec<Strategy>,
        analyzer_config: AnalyzerConfig,
        symbols: Vec<Symbol>,
        hub: Arc<SnapshotHub>,
    ) -> Self {
        Self {
            store,
            backfiller,
            strategies,
            analyzer_config,
            symbols,
            hub,
        }
    }

    pub fn hub(&self) -> Arc<SnapshotHub> {
        self.hub.clone()
    }

    /// TFQE loop: one evaluation per M15 boundary (plus grace).
    pub async fn run_tfqe_loop(
        self: Arc<Self>,
        mut ticker: Box<dyn Ticker>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("SignalPublisher: TFQE loop shut down");
                    return;
                }
                tick = ticker.tick() => {
                    if tick.is_none() {
                        return;
                    }
                    self.tfqe_tick(Utc::now()).await;
                }
            }
        }
    }

    /// Multi-timeframe loop: one evaluation per minute.
    pub async fn run_mtf_loop(
        self: Arc<Self>,
        mut ticker: Box<dyn Ticker>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("SignalPublisher: analysis loop shut down");
                    return;
                }
                tick = ticker.tick() => {
                    if tick.is_none() {
                        return;
                    }
                    self.mtf_tick(Utc::now()).await;
                }
            }
        }
    }

    /// One full TFQE evaluation across the configured symbols.
    pub async fn tfqe_tick(&self, now: DateTime<Utc>) {
        let mut signals = BTreeMap::new();

        for &symbol in &self.symbols {
            self.refresh(symbol, &[Timeframe::H1, Timeframe::M15], now).await;
            let freshness = self
                .freshness(symbol, &[Timeframe::H1, Timeframe::M15], now)
                .await;

            for strategy in &self.strategies {
                let mut signal = strategy.tick(self.store.clone(), symbol, now).await;
                if freshness == DataFreshness::Stale {
                    cap_signal_confidence(&mut signal);
                }
                debug!("SignalPublisher: {} {} -> {:?}", strategy.name(), symbol, signal);
                signals.insert(
                    symbol,
                    TfqeReport {
                        symbol,
                        generated_at: now,
                        data_freshness: freshness,
                        signal,
                    },
                );
            }
        }

        self.hub
            .publish_tfqe(TfqeSnapshot {
                generated_at: now,
                signals,
            })
            .await;
    }

    /// One full multi-timeframe evaluation across the configured symbols.
    pub async fn mtf_tick(&self, now: DateTime<Utc>) {
        let mut analyses = BTreeMap::new();

        for &symbol in &self.symbols {
            self.refresh(symbol, Timeframe::all(), now).await;
            let freshness = self
                .freshness(symbol, &[Timeframe::M15, Timeframe::H1], now)
                .await;

            let previous_daily = self.store.last(symbol, Timeframe::D1).await;
            let mut frames = BTreeMap::new();
            for &timeframe in Timeframe::all() {
                let candles = self
                    .store
                    .snapshot(symbol, timeframe, ANALYSIS_LOOKBACK)
                    .await;
                frames.insert(
                    timeframe,
                    analyze_timeframe(
                        timeframe,
                        &candles,
                        previous_daily.as_ref(),
                        &self.analyzer_config,
                    ),
                );
            }

            let mut integrated_strategy = integrate(&frames, now);
            if freshness == DataFreshness::Stale {
                integrated_strategy.confidence =
                    integrated_strategy.confidence.min(STALE_CONFIDENCE_CAP);
            }

            analyses.insert(
                symbol,
                MultiTimeframeReport {
                    timestamp: now,
                    symbol,
                    timeframes: frames,
                    integrated_strategy,
                    market_session: session_summary(now),
                    data_freshness: freshness,
                },
            );
        }

        self.hub
            .publish_mtf(MtfSnapshot {
                generated_at: now,
                analyses,
            })
            .await;
    }

    async fn refresh(&self, symbol: Symbol, timeframes: &[Timeframe], now: DateTime<Utc>) {
        let Some(backfiller) = &self.backfiller else {
            return;
        };
        for &timeframe in timeframes {
            if let Err(e) = backfiller.ensure_fresh(symbol, timeframe, now).await {
                // Broker hiccups stay in the gateway; the engine sees only
                // staleness, which degrades confidence below.
                warn!("SignalPublisher: refresh {symbol}/{timeframe} failed: {e}");
            }
        }
    }

    async fn freshness(
        &self,
        symbol: Symbol,
        timeframes: &[Timeframe],
        now: DateTime<Utc>,
    ) -> DataFreshness {
        for &timeframe in timeframes {
            if self
                .store
                .is_stale(symbol, timeframe, now.timestamp_millis())
                .await
            {
                return DataFreshness::Stale;
            }
        }
        DataFreshness::Fresh
    }
}

fn cap_signal_confidence(signal: &mut TfqeSignal) {
    match signal {
        TfqeSignal::Buy(plan) | TfqeSignal::Sell(plan) => {
            plan.confidence = plan.confidence.min(STALE_CONFIDENCE_CAP_U8);
        }
        _ => {}
    }
}
