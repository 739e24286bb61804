use crate::domain::errors::GatewayError;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Method classes the broker limits independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodClass {
    PublicGet,
    PrivateGet,
    PrivatePost,
    WsSubscribe,
}

impl MethodClass {
    fn name(&self) -> &'static str {
        match self {
            MethodClass::PublicGet => "public-get",
            MethodClass::PrivateGet => "private-get",
            MethodClass::PrivatePost => "private-post",
            MethodClass::WsSubscribe => "ws-subscribe",
        }
    }
}

/// Per-class request rates, tokens per second.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub public_get_per_sec: f64,
    pub private_get_per_sec: f64,
    pub private_post_per_sec: f64,
    pub ws_sub_per_sec: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            public_get_per_sec: 6.0,
            private_get_per_sec: 6.0,
            private_post_per_sec: 1.0,
            ws_sub_per_sec: 1.0,
        }
    }
}

/// Continuous-refill token bucket. Burst capacity equals one second's rate,
/// so the broker's per-second ceiling holds over any sliding window.
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(rate_per_sec: f64, now: Instant) -> Self {
        Self {
            capacity: rate_per_sec,
            tokens: rate_per_sec,
            refill_per_sec: rate_per_sec,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Takes one token, or returns how long the caller must wait for it.
    fn try_take(&mut self, now: Instant) -> Result<(), Duration> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(deficit / self.refill_per_sec))
        }
    }
}

/// Token-bucket governor shared by every outgoing broker call.
///
/// One bucket per method class; callers queue FIFO on the bucket mutex, so
/// a burst of requests drains in submission order. Every acquire carries a
/// deadline and resolves to `Cancelled` when it elapses.
pub struct RateLimiter {
    buckets: HashMap<MethodClass, Mutex<TokenBucket>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let now = Instant::now();
        let mut buckets = HashMap::new();
        buckets.insert(
            MethodClass::PublicGet,
            Mutex::new(TokenBucket::new(config.public_get_per_sec, now)),
        );
        buckets.insert(
            MethodClass::PrivateGet,
            Mutex::new(TokenBucket::new(config.private_get_per_sec, now)),
        );
        buckets.insert(
            MethodClass::PrivatePost,
            Mutex::new(TokenBucket::new(config.private_post_per_sec, now)),
        );
        buckets.insert(
            MethodClass::WsSubscribe,
            Mutex::new(TokenBucket::new(config.ws_sub_per_sec, now)),
        );
        Self { buckets }
    }

    /// Waits for a token of the given class, giving up after `deadline`.
    pub async fn acquire(
        &self,
        class: MethodClass,
        deadline: Duration,
    ) -> Result<(), GatewayError> {
        tokio::time::timeout(deadline, self.acquire_inner(class))
            .await
            .map_err(|_| {
                debug!(class = class.name(), "rate limiter acquire cancelled");
                GatewayError::Cancelled
            })
    }

    async fn acquire_inner(&self, class: MethodClass) {
        let bucket = self
            .buckets
            .get(&class)
            .expect("all method classes are registered at construction");

        // The wait happens while holding the bucket lock: queued callers are
        // granted strictly in lock-acquisition order.
        let mut guard = bucket.lock().await;
        loop {
            match guard.try_take(Instant::now()) {
                Ok(()) => return,
                Err(wait) => tokio::time::sleep(wait).await,
            }
        }
    }
}
