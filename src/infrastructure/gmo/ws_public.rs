use super::dispatch::PublicFrame;
use crate::application::monitoring::PingWatchdog;
use crate::domain::errors::GatewayError;
use crate::domain::market::{Quote, Symbol};
use crate::infrastructure::core::rate_limiter::{MethodClass, RateLimiter};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

const INITIAL_BACKOFF_SECS: u64 = 1;
const MAX_BACKOFF_SECS: u64 = 60;
const WATCHDOG_POLL: Duration = Duration::from_secs(10);
const SUBSCRIBE_DEADLINE: Duration = Duration::from_secs(30);

/// Runtime subscription management for the public stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionCommand {
    Subscribe(Symbol),
    Unsubscribe(Symbol),
}

enum StreamEnd {
    Shutdown,
    Dead,
}

/// Client for the public WebSocket stream.
///
/// Owns the reconnect loop: exponential backoff from 1 s to 60 s, full
/// re-subscription on every new connection, and a byte-silence watchdog that
/// declares the socket dead after three missed server pings. Subscribe and
/// unsubscribe frames are gated by the shared 1/sec limiter.
pub struct PublicWsClient {
    url: String,
    symbols: Vec<Symbol>,
    limiter: Arc<RateLimiter>,
    quote_tx: broadcast::Sender<Quote>,
    command_rx: mpsc::Receiver<SubscriptionCommand>,
    shutdown: watch::Receiver<bool>,
}

/// Handle held by the application to adjust subscriptions at runtime.
#[derive(Clone)]
pub struct PublicWsHandle {
    command_tx: mpsc::Sender<SubscriptionCommand>,
}

impl PublicWsHandle {
    pub async fn subscribe(&self, symbol: Symbol) -> Result<(), GatewayError> {
        self.command_tx
            .send(SubscriptionCommand::Subscribe(symbol))
            .await
            .map_err(|_| GatewayError::Internal("public ws task is gone".into()))
    }

    pub async fn unsubscribe(&self, symbol: Symbol) -> Result<(), GatewayError> {
        self.command_tx
            .send(SubscriptionCommand::Unsubscribe(symbol))
            .await
            .map_err(|_| GatewayError::Internal("public ws task is gone".into()))
    }
}

impl PublicWsClient {
    pub fn new(
        url: String,
        symbols: Vec<Symbol>,
        limiter: Arc<RateLimiter>,
        quote_tx: broadcast::Sender<Quote>,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, PublicWsHandle) {
        let (command_tx, command_rx) = mpsc::channel(16);
        (
            Self {
                url,
                symbols,
                limiter,
                quote_tx,
                command_rx,
                shutdown,
            },
            PublicWsHandle { command_tx },
        )
    }

    /// Runs until shutdown is signalled. Each connection failure backs off
    /// exponentially; a successful stream resets the backoff.
    pub async fn run(mut self) {
        let mut backoff = INITIAL_BACKOFF_SECS;

        loop {
            if *self.shutdown.borrow() {
                return;
            }
            let result = connect_and_stream(
                &self.url,
                &mut self.symbols,
                &self.limiter,
                &self.quote_tx,
                &mut self.command_rx,
                &mut self.shutdown,
            )
            .await;
            match result {
                Ok(StreamEnd::Shutdown) => {
                    info!("Public WS: shutdown complete");
                    return;
                }
                Ok(StreamEnd::Dead) => {
                    warn!("Public WS: connection died, reconnecting in {}s", backoff);
                }
                Err(e) => {
                    error!("Public WS error: {}. Reconnecting in {}s", e, backoff);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(backoff)) => {}
                _ = self.shutdown.changed() => return,
            }
            backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
        }
    }
}

async fn connect_and_stream(
    url: &str,
    symbols: &mut Vec<Symbol>,
    limiter: &RateLimiter,
    quote_tx: &broadcast::Sender<Quote>,
    command_rx: &mut mpsc::Receiver<SubscriptionCommand>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<StreamEnd, GatewayError> {
    info!("Connecting to public WebSocket: {}", url);
    let (ws_stream, _) = connect_async(url)
        .await
        .map_err(|e| GatewayError::Transport(format!("public ws connect: {e}")))?;
    info!("Public WebSocket connected");

    let (mut write, mut read) = ws_stream.split();

    // Dedicated writer task so pings, subscribes and unsubscribes share one
    // sink without back-references into the reader.
    let (ws_tx, mut ws_rx) = mpsc::channel::<Message>(32);
    let writer = tokio::spawn(async move {
        while let Some(msg) = ws_rx.recv().await {
            if write.send(msg).await.is_err() {
                break;
            }
        }
    });

    // Full re-subscription on every new connection.
    for &symbol in symbols.iter() {
        send_subscription(limiter, &ws_tx, "subscribe", symbol).await?;
    }

    let mut watchdog = PingWatchdog::for_broker_stream("public");
    let mut watchdog_poll = tokio::time::interval(WATCHDOG_POLL);
    watchdog_poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let end = loop {
        tokio::select! {
            _ = shutdown.changed() => {
                // Drain: unsubscribe everything before closing.
                for &symbol in symbols.iter() {
                    let _ = send_subscription(limiter, &ws_tx, "unsubscribe", symbol).await;
                }
                let _ = ws_tx.send(Message::Close(None)).await;
                break StreamEnd::Shutdown;
            }
            _ = watchdog_poll.tick() => {
                if !watchdog.is_alive() {
                    warn!(
                        "Public WS: {}s of silence, declaring connection dead",
                        watchdog.silence().as_secs()
                    );
                    break StreamEnd::Dead;
                }
            }
            command = command_rx.recv() => {
                if let Some(command) = command {
                    apply_command(symbols, limiter, &ws_tx, command).await?;
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(message)) => {
                        watchdog.record_activity();
                        handle_message(quote_tx, &ws_tx, message).await;
                    }
                    Some(Err(e)) => {
                        error!("Public WS read error: {}", e);
                        break StreamEnd::Dead;
                    }
                    None => {
                        info!("Public WS closed by server");
                        break StreamEnd::Dead;
                    }
                }
            }
        }
    };

    writer.abort();
    Ok(end)
}

async fn apply_command(
    symbols: &mut Vec<Symbol>,
    limiter: &RateLimiter,
    ws_tx: &mpsc::Sender<Message>,
    command: SubscriptionCommand,
) -> Result<(), GatewayError> {
    match command {
        SubscriptionCommand::Subscribe(symbol) => {
            if !symbols.contains(&symbol) {
                send_subscription(limiter, ws_tx, "subscribe", symbol).await?;
                symbols.push(symbol);
            }
        }
        SubscriptionCommand::Unsubscribe(symbol) => {
            if symbols.contains(&symbol) {
                send_subscription(limiter, ws_tx, "unsubscribe", symbol).await?;
                symbols.retain(|s| *s != symbol);
            }
        }
    }
    Ok(())
}

async fn send_subscription(
    limiter: &RateLimiter,
    ws_tx: &mpsc::Sender<Message>,
    command: &str,
    symbol: Symbol,
) -> Result<(), GatewayError> {
    // One subscribe-or-unsubscribe per second per IP.
    limiter
        .acquire(MethodClass::WsSubscribe, SUBSCRIBE_DEADLINE)
        .await?;
    let frame = serde_json::json!({
        "command": command,
        "channel": "ticker",
        "symbol": symbol.as_str(),
    });
    debug!("Public WS: {} ticker {}", command, symbol);
    ws_tx
        .send(Message::Text(frame.to_string().into()))
        .await
        .map_err(|_| GatewayError::Transport("public ws writer gone".into()))
}

async fn handle_message(
    quote_tx: &broadcast::Sender<Quote>,
    ws_tx: &mpsc::Sender<Message>,
    message: Message,
) {
    match message {
        Message::Text(text) => match serde_json::from_str::<PublicFrame>(&text) {
            Ok(PublicFrame::Ticker(entry)) => match entry.into_quote() {
                Ok(quote) => {
                    // Receiver lag drops the oldest quotes, never the newest.
                    let _ = quote_tx.send(quote);
                }
                Err(e) => debug!("Public WS: skipped ticker row: {}", e),
            },
            Err(e) => {
                // Subscription acks and error frames land here.
                debug!("Public WS: non-data frame: {} ({})", text, e);
            }
        },
        Message::Ping(payload) => {
            let _ = ws_tx.send(Message::Pong(payload)).await;
        }
        Message::Close(frame) => {
            info!("Public WS close frame: {:?}", frame);
        }
        _ => {}
    }
}
