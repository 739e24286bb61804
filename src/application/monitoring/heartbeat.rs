use std::time::{Duration, Instant};
use tracing::debug;

/// Watchdog for detecting silent (zombie) WebSocket connections.
///
/// The broker pings once per minute; a connection that stays byte-silent for
/// three ping intervals is declared dead and must be re-established.
pub struct PingWatchdog {
    last_bytes_at: Instant,
    ping_interval: Duration,
    missed_limit: u32,
    name: String,
}

impl PingWatchdog {
    pub fn new(name: &str, ping_interval: Duration, missed_limit: u32) -> Self {
        Self {
            last_bytes_at: Instant::now(),
            ping_interval,
            missed_limit,
            name: name.to_string(),
        }
    }

    /// Watchdog tuned to the broker's once-per-minute server ping.
    pub fn for_broker_stream(name: &str) -> Self {
        Self::new(name, Duration::from_secs(60), 3)
    }

    /// Record that any bytes arrived on the socket.
    pub fn record_activity(&mut self) {
        self.last_bytes_at = Instant::now();
    }

    /// True while the connection is considered alive.
    pub fn is_alive(&self) -> bool {
        let silence = self.last_bytes_at.elapsed();
        let limit = self.ping_interval * self.missed_limit;
        if silence > limit {
            debug!(
                "PingWatchdog[{}]: {:?} of silence exceeds {:?} ({} missed pings)",
                self.name, silence, limit, self.missed_limit
            );
            return false;
        }
        true
    }

    pub fn silence(&self) -> Duration {
        self.last_bytes_at.elapsed()
    }
}
