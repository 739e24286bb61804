use super::dispatch::{PrivateChannel, PrivateEventBus, PrivateFrame};
use super::rest::GmoRestClient;
use crate::application::monitoring::PingWatchdog;
use crate::domain::errors::GatewayError;
use crate::infrastructure::core::rate_limiter::{MethodClass, RateLimiter};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

const INITIAL_BACKOFF_SECS: u64 = 1;
const MAX_BACKOFF_SECS: u64 = 60;
const WATCHDOG_POLL: Duration = Duration::from_secs(10);
const SUBSCRIBE_DEADLINE: Duration = Duration::from_secs(30);
/// Tokens live 60 minutes; renew at the 50-minute mark.
const TOKEN_RENEWAL_INTERVAL: Duration = Duration::from_secs(50 * 60);

enum StreamEnd {
    Shutdown,
    Dead,
    TokenRejected,
}

/// Client for the private WebSocket stream.
///
/// Owns the access-token lifecycle: obtains a token before connecting,
/// extends it at the 50-minute mark, replaces it when the broker rejects it
/// (`ERR-5012` or connect failure), and deletes it on graceful shutdown so
/// the per-account token budget is not exhausted.
pub struct PrivateWsClient {
    base_url: String,
    rest: Arc<GmoRestClient>,
    limiter: Arc<RateLimiter>,
    channels: Vec<PrivateChannel>,
    bus: PrivateEventBus,
    shutdown: watch::Receiver<bool>,
}

impl PrivateWsClient {
    pub fn new(
        base_url: String,
        rest: Arc<GmoRestClient>,
        limiter: Arc<RateLimiter>,
        channels: Vec<PrivateChannel>,
        bus: PrivateEventBus,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            base_url,
            rest,
            limiter,
            channels,
            bus,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let mut backoff = INITIAL_BACKOFF_SECS;
        let mut token: Option<String> = None;

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            // A fresh token per connection attempt unless the current one is
            // still presumed valid. Rejected tokens are deleted so at most
            // one of ours exists at a time (the broker allows five).
            let current = match token.take() {
                Some(existing) => existing,
                None => match self.rest.create_ws_token().await {
                    Ok(t) => t,
                    Err(e) => {
                        error!("Private WS: token creation failed: {}", e);
                        tokio::select! {
                            _ = tokio::time::sleep(Duration::from_secs(backoff)) => {}
                            _ = self.shutdown.changed() => break,
                        }
                        backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
                        continue;
                    }
                },
            };

            let result = connect_and_stream(
                &self.base_url,
                &current,
                &self.rest,
                &self.limiter,
                &self.channels,
                &self.bus,
                &mut self.shutdown,
            )
            .await;
            match result {
                Ok(StreamEnd::Shutdown) => {
                    token = Some(current);
                    break;
                }
                Ok(StreamEnd::Dead) => {
                    warn!("Private WS: connection died, reconnecting in {}s", backoff);
                    token = Some(current);
                }
                Ok(StreamEnd::TokenRejected) => {
                    warn!("Private WS: token rejected, obtaining a fresh one");
                    let _ = self.rest.delete_ws_token(&current).await;
                }
                Err(e) => {
                    error!("Private WS error: {}. Reconnecting in {}s", e, backoff);
                    // Connect failures can mean the token already expired.
                    let _ = self.rest.delete_ws_token(&current).await;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(backoff)) => {}
                _ = self.shutdown.changed() => break,
            }
            backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
        }

        // Graceful shutdown: release our token.
        if let Some(token) = token {
            if let Err(e) = self.rest.delete_ws_token(&token).await {
                warn!("Private WS: token delete on shutdown failed: {}", e);
            } else {
                info!("Private WS: token released");
            }
        }
    }
}

async fn connect_and_stream(
    base_url: &str,
    token: &str,
    rest: &GmoRestClient,
    limiter: &RateLimiter,
    channels: &[PrivateChannel],
    bus: &PrivateEventBus,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<StreamEnd, GatewayError> {
    let url = format!("{base_url}/{token}");
    info!("Connecting to private WebSocket");
    let (ws_stream, _) = connect_async(&url)
        .await
        .map_err(|e| GatewayError::Transport(format!("private ws connect: {e}")))?;
    info!("Private WebSocket connected");

    let (mut write, mut read) = ws_stream.split();
    let (ws_tx, mut ws_rx) = mpsc::channel::<Message>(32);
    let writer = tokio::spawn(async move {
        while let Some(msg) = ws_rx.recv().await {
            if write.send(msg).await.is_err() {
                break;
            }
        }
    });

    for &channel in channels {
        send_subscription(limiter, &ws_tx, "subscribe", channel).await?;
    }

    let mut watchdog = PingWatchdog::for_broker_stream("private");
    let mut watchdog_poll = tokio::time::interval(WATCHDOG_POLL);
    watchdog_poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut renewal = tokio::time::interval(TOKEN_RENEWAL_INTERVAL);
    renewal.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    renewal.tick().await; // the first interval tick fires immediately

    let end = loop {
        tokio::select! {
            _ = shutdown.changed() => {
                for &channel in channels {
                    let _ = send_subscription(limiter, &ws_tx, "unsubscribe", channel).await;
                }
                let _ = ws_tx.send(Message::Close(None)).await;
                break StreamEnd::Shutdown;
            }
            _ = renewal.tick() => {
                match rest.extend_ws_token(token).await {
                    Ok(()) => debug!("Private WS: token extended"),
                    Err(e) => {
                        warn!("Private WS: token extension failed: {}", e);
                        break StreamEnd::TokenRejected;
                    }
                }
            }
            _ = watchdog_poll.tick() => {
                if !watchdog.is_alive() {
                    warn!(
                        "Private WS: {}s of silence, declaring connection dead",
                        watchdog.silence().as_secs()
                    );
                    break StreamEnd::Dead;
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(message)) => {
                        watchdog.record_activity();
                        if let Some(end) = handle_message(bus, &ws_tx, message).await {
                            break end;
                        }
                    }
                    Some(Err(e)) => {
                        error!("Private WS read error: {}", e);
                        break StreamEnd::Dead;
                    }
                    None => {
                        info!("Private WS closed by server");
                        break StreamEnd::Dead;
                    }
                }
            }
        }
    };

    writer.abort();
    Ok(end)
}

async fn send_subscription(
    limiter: &RateLimiter,
    ws_tx: &mpsc::Sender<Message>,
    command: &str,
    channel: PrivateChannel,
) -> Result<(), GatewayError> {
    limiter
        .acquire(MethodClass::WsSubscribe, SUBSCRIBE_DEADLINE)
        .await?;
    let mut frame = serde_json::json!({
        "command": command,
        "channel": channel.wire_name(),
    });
    // Position summaries also stream on a fixed 5-second cadence.
    if channel == PrivateChannel::PositionSummaryEvents {
        frame["option"] = serde_json::Value::String("PERIODIC".into());
    }
    debug!("Private WS: {} {}", command, channel.wire_name());
    ws_tx
        .send(Message::Text(frame.to_string().into()))
        .await
        .map_err(|_| GatewayError::Transport("private ws writer gone".into()))
}

/// Returns Some(end) when the frame demands ending the stream.
async fn handle_message(
    bus: &PrivateEventBus,
    ws_tx: &mpsc::Sender<Message>,
    message: Message,
) -> Option<StreamEnd> {
    match message {
        Message::Text(text) => {
            match serde_json::from_str::<PrivateFrame>(&text) {
                Ok(frame) => {
                    bus.dispatch(frame).await;
                }
                Err(_) => {
                    // Error frames arrive untagged; an expired token must
                    // trigger a token refresh rather than a plain retry.
                    if text.contains("ERR-5012") {
                        warn!("Private WS: broker reports expired token");
                        return Some(StreamEnd::TokenRejected);
                    }
                    debug!("Private WS: non-data frame: {}", text);
                }
            }
            None
        }
        Message::Ping(payload) => {
            let _ = ws_tx.send(Message::Pong(payload)).await;
            None
        }
        Message::Close(frame) => {
            info!("Private WS close frame: {:?}", frame);
            None
        }
        _ => None,
    }
}
