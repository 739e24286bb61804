mod tfqe;

pub use tfqe::{TfqeConfig, evaluate, tfqe_strategy};

use crate::application::market_data::CandleStore;
use crate::domain::market::Symbol;
use crate::domain::signal::TfqeSignal;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use std::sync::Arc;

type TickFn = Arc<
    dyn Fn(Arc<CandleStore>, Symbol, DateTime<Utc>) -> BoxFuture<'static, TfqeSignal>
        + Send
        + Sync,
>;

/// A strategy is a name plus a tick function over the candle store; the
/// publisher composes a list of these and runs them each cycle.
#[derive(Clone)]
pub struct Strategy {
    name: &'static str,
    tick: TickFn,
}

impl Strategy {
    pub fn new(name: &'static str, tick: TickFn) -> Self {
        Self { name, tick }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn tick(
        &self,
        store: Arc<CandleStore>,
        symbol: Symbol,
        now: DateTime<Utc>,
    ) -> TfqeSignal {
        (self.tick)(store, symbol, now).await
    }
}
