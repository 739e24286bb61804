use super::dto::{Execution, OpenPosition, PositionSummaryEntry, TickerEntry};
use crate::domain::market::Quote;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, warn};

/// Capacity of the quote ring. Overflow drops the oldest entries: a stale
/// quote has no value, a fresh one always does.
pub const QUOTE_RING_CAPACITY: usize = 1024;

/// Capacity of the lossless event queues. Producers block on overflow.
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// How long a lossless producer may block before the stall is surfaced.
pub const CONSUMER_STALL_AFTER: Duration = Duration::from_secs(5);

/// Channels on the private stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivateChannel {
    ExecutionEvents,
    OrderEvents,
    PositionEvents,
    PositionSummaryEvents,
}

impl PrivateChannel {
    pub fn wire_name(&self) -> &'static str {
        match self {
            PrivateChannel::ExecutionEvents => "executionEvents",
            PrivateChannel::OrderEvents => "orderEvents",
            PrivateChannel::PositionEvents => "positionEvents",
            PrivateChannel::PositionSummaryEvents => "positionSummaryEvents",
        }
    }

    pub fn all() -> &'static [PrivateChannel] {
        &[
            PrivateChannel::ExecutionEvents,
            PrivateChannel::OrderEvents,
            PrivateChannel::PositionEvents,
            PrivateChannel::PositionSummaryEvents,
        ]
    }
}

/// One inbound frame on the public stream, tagged by channel.
#[derive(Debug, Deserialize)]
#[serde(tag = "channel")]
pub enum PublicFrame {
    #[serde(rename = "ticker")]
    Ticker(TickerEntry),
}

/// Order lifecycle event on the private stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
    pub order_id: i64,
    pub root_order_id: i64,
    #[serde(default)]
    pub client_order_id: Option<String>,
    pub symbol: String,
    pub side: String,
    pub execution_type: String,
    pub settle_type: String,
    pub order_status: String,
    pub order_size: Decimal,
    #[serde(default)]
    pub order_price: Option<Decimal>,
    pub order_timestamp: DateTime<Utc>,
}

/// One inbound frame on the private stream, tagged by channel.
#[derive(Debug, Deserialize)]
#[serde(tag = "channel", rename_all = "camelCase")]
pub enum PrivateFrame {
    ExecutionEvents(Execution),
    OrderEvents(OrderEvent),
    PositionEvents(OpenPosition),
    PositionSummaryEvents(PositionSummaryEntry),
}

/// Consumer handles for the private stream queues.
pub struct PrivateEventReceivers {
    pub executions: mpsc::Receiver<Execution>,
    pub orders: mpsc::Receiver<OrderEvent>,
    pub positions: mpsc::Receiver<OpenPosition>,
    pub position_summaries: mpsc::Receiver<PositionSummaryEntry>,
}

/// Producer side of the private stream queues.
///
/// Execution, order and position events are lossless: the producer blocks
/// when a consumer falls behind, and a watchdog reports the stall after 5 s
/// rather than dropping a fill.
pub struct PrivateEventBus {
    executions: mpsc::Sender<Execution>,
    orders: mpsc::Sender<OrderEvent>,
    positions: mpsc::Sender<OpenPosition>,
    position_summaries: mpsc::Sender<PositionSummaryEntry>,
}

impl PrivateEventBus {
    pub fn new() -> (Self, PrivateEventReceivers) {
        let (executions_tx, executions_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (orders_tx, orders_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (positions_tx, positions_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (summaries_tx, summaries_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        (
            Self {
                executions: executions_tx,
                orders: orders_tx,
                positions: positions_tx,
                position_summaries: summaries_tx,
            },
            PrivateEventReceivers {
                executions: executions_rx,
                orders: orders_rx,
                positions: positions_rx,
                position_summaries: summaries_rx,
            },
        )
    }

    pub async fn dispatch(&self, frame: PrivateFrame) {
        match frame {
            PrivateFrame::ExecutionEvents(event) => {
                send_lossless(&self.executions, event, "executionEvents").await
            }
            PrivateFrame::OrderEvents(event) => {
                send_lossless(&self.orders, event, "orderEvents").await
            }
            PrivateFrame::PositionEvents(event) => {
                send_lossless(&self.positions, event, "positionEvents").await
            }
            PrivateFrame::PositionSummaryEvents(event) => {
                send_lossless(&self.position_summaries, event, "positionSummaryEvents").await
            }
        }
    }
}

/// Blocking send with a stall watchdog. Never drops the message: execution
/// and order events must arrive in broker-emitted order, every one of them.
async fn send_lossless<T>(tx: &mpsc::Sender<T>, message: T, channel: &'static str) {
    let mut stall_reported = false;
    loop {
        match tokio::time::timeout(CONSUMER_STALL_AFTER, tx.reserve()).await {
            Ok(Ok(permit)) => {
                permit.send(message);
                return;
            }
            Ok(Err(_closed)) => {
                warn!(channel, "consumer dropped its receiver; event discarded");
                return;
            }
            Err(_elapsed) => {
                if !stall_reported {
                    error!(
                        channel,
                        stalled_secs = CONSUMER_STALL_AFTER.as_secs(),
                        "WS_CONSUMER_STALL: consumer is not draining its queue"
                    );
                    stall_reported = true;
                }
                // The watchdog only reports; the producer keeps blocking so
                // ordering and losslessness are preserved.
            }
        }
    }
}

/// Creates the quote ring. Slow consumers observe `Lagged` and skip to the
/// newest quotes instead of stalling the socket reader.
pub fn quote_ring() -> (broadcast::Sender<Quote>, broadcast::Receiver<Quote>) {
    broadcast::channel(QUOTE_RING_CAPACITY)
}
