//! Application assembly and lifecycle.
//!
//! `Application::start` wires the gateway (limiter, signer, REST, streams)
//! into the market-data pipeline and the signal engines, spawns the
//! long-lived workers, and returns a handle whose `shutdown` tears the
//! system down in order: publisher first, then the WebSocket drains
//! (unsubscribe and token release), then the HTTP client.

use crate::application::analysis::AnalyzerConfig;
use crate::application::market_data::ingest::LatestQuotes;
use crate::application::market_data::{CandleStore, KlineBackfiller, MarketIngest};
use crate::application::publisher::{
    MTF_TICK_PERIOD, SignalPublisher, SnapshotHub, TFQE_TICK_PERIOD, delay_to_next_tfqe_tick,
};
use crate::application::strategies::tfqe_strategy;
use crate::config::Config;
use crate::domain::ports::{IntervalTicker, Ticker};
use crate::infrastructure::core::rate_limiter::RateLimiter;
use crate::infrastructure::gmo::{
    GmoRestClient, PrivateChannel, PrivateEventBus, PrivateEventReceivers,
    PrivateWsClient, PublicWsClient, PublicWsHandle, RequestSigner, quote_ring,
};
use anyhow::Result;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::domain::market::Timeframe;

pub struct Application {
    config: Config,
}

/// Running system. Dropping the handle does not stop the workers; call
/// `shutdown` for the ordered teardown.
pub struct AppHandle {
    pub hub: Arc<SnapshotHub>,
    pub gateway: Arc<GmoRestClient>,
    pub public_ws: PublicWsHandle,
    /// Private-stream queues, present when credentials were configured.
    pub private_events: Option<PrivateEventReceivers>,
    shutdown_tx: watch::Sender<bool>,
    publisher_tasks: Vec<JoinHandle<()>>,
    stream_tasks: Vec<JoinHandle<()>>,
}

impl Application {
    pub fn build(config: Config) -> Result<Self> {
        if config.trading_enabled && !config.has_credentials() {
            anyhow::bail!("TRADING_ENABLED requires GMO_API_KEY and GMO_API_SECRET");
        }
        Ok(Self { config })
    }

    pub async fn start(self) -> Result<AppHandle> {
        let config = self.config;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Gateway: one limiter and one signer, owned by the REST client and
        // shared with the streams. No broker call exists outside of them.
        let limiter = Arc::new(RateLimiter::new(config.limits));
        let signer = match (&config.api_key, &config.api_secret) {
            (Some(key), Some(secret)) => Some(Arc::new(RequestSigner::new(
                key.clone(),
                secret.clone(),
                config.clock_skew_max_ms,
            ))),
            _ => {
                info!("No credentials configured; gateway runs public-only");
                None
            }
        };
        let gateway = Arc::new(GmoRestClient::new(
            limiter.clone(),
            signer,
            config.public_base_url.clone(),
            config.private_base_url.clone(),
            config.trading_enabled,
        ));

        // Market data pipeline.
        let store = Arc::new(CandleStore::new(
            &config.symbols,
            Timeframe::all(),
            crate::application::market_data::candle_store::MIN_RING_CAPACITY,
        ));
        let backfiller = Arc::new(KlineBackfiller::new(
            gateway.clone(),
            store.clone(),
            config.kline_price_type,
        ));

        let now = Utc::now();
        for &symbol in &config.symbols {
            for &timeframe in Timeframe::all() {
                if let Err(e) = backfiller
                    .warmup(
                        symbol,
                        timeframe,
                        crate::application::market_data::candle_store::MIN_RING_CAPACITY,
                        now,
                    )
                    .await
                {
                    warn!("Warmup {symbol}/{timeframe} failed: {e}; continuing with live data only");
                }
            }
        }

        let (quote_tx, quote_rx) = quote_ring();
        let latest: LatestQuotes = Arc::new(RwLock::new(BTreeMap::new()));

        let ingest = MarketIngest::new(
            store.clone(),
            &config.symbols,
            Timeframe::all(),
            quote_rx,
            latest.clone(),
            shutdown_rx.clone(),
        );

        let (public_ws, public_ws_handle) = PublicWsClient::new(
            config.ws_public_url.clone(),
            config.symbols.clone(),
            limiter.clone(),
            quote_tx,
            shutdown_rx.clone(),
        );

        let mut stream_tasks = vec![tokio::spawn(ingest.run()), tokio::spawn(public_ws.run())];

        let private_events = if gateway.has_credentials() {
            let (bus, receivers) = PrivateEventBus::new();
            let private_ws = PrivateWsClient::new(
                config.ws_private_url.clone(),
                gateway.clone(),
                limiter.clone(),
                PrivateChannel::all().to_vec(),
                bus,
                shutdown_rx.clone(),
            );
            stream_tasks.push(tokio::spawn(private_ws.run()));
            Some(receivers)
        } else {
            None
        };

        // Signal engines.
        let hub = Arc::new(SnapshotHub::new(latest, now));
        let publisher = Arc::new(SignalPublisher::new(
            store,
            Some(backfiller),
            vec![tfqe_strategy(config.tfqe_config())],
            AnalyzerConfig::default(),
            config.symbols.clone(),
            hub.clone(),
        ));

        let tfqe_ticker: Box<dyn Ticker> = Box::new(IntervalTicker::aligned(
            TFQE_TICK_PERIOD,
            delay_to_next_tfqe_tick(Utc::now()),
        ));
        let mtf_ticker: Box<dyn Ticker> = Box::new(IntervalTicker::new(MTF_TICK_PERIOD));

        let publisher_tasks = vec![
            tokio::spawn(publisher.clone().run_tfqe_loop(tfqe_ticker, shutdown_rx.clone())),
            tokio::spawn(publisher.clone().run_mtf_loop(mtf_ticker, shutdown_rx)),
        ];

        info!(
            "Application started: {} symbols, trading {}",
            config.symbols.len(),
            if config.trading_enabled { "ENABLED" } else { "disabled" }
        );

        Ok(AppHandle {
            hub,
            gateway,
            public_ws: public_ws_handle,
            private_events,
            shutdown_tx,
            publisher_tasks,
            stream_tasks,
        })
    }
}

impl AppHandle {
    /// Ordered teardown: stop publishing, then drain the streams (which
    /// unsubscribe and release the private token), then drop the gateway.
    pub async fn shutdown(self) {
        info!("Shutdown: signalling workers");
        let _ = self.shutdown_tx.send(true);

        for task in self.publisher_tasks {
            if let Err(e) = task.await {
                warn!("Publisher task ended abnormally: {e}");
            }
        }
        info!("Shutdown: publisher stopped");

        for task in self.stream_tasks {
            if let Err(e) = task.await {
                warn!("Stream task ended abnormally: {e}");
            }
        }
        info!("Shutdown: streams drained");

        drop(self.gateway);
        info!("Shutdown complete");
    }
}
