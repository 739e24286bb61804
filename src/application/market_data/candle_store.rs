use crate::domain::market::{Candle, Symbol, Timeframe};
use crate::domain::ports::CandleBackend;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, warn};

/// Minimum ring capacity: enough history for the longest indicator lookback
/// (ADX needs 2x14 bars, the analyzer slope another handful) with generous
/// headroom.
pub const MIN_RING_CAPACITY: usize = 500;

/// A candle is stale once its age exceeds 1.5x the timeframe duration.
const STALENESS_FACTOR_NUM: i64 = 3;
const STALENESS_FACTOR_DEN: i64 = 2;

struct CandleRing {
    candles: VecDeque<Candle>,
    capacity: usize,
}

impl CandleRing {
    fn new(capacity: usize) -> Self {
        Self {
            candles: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push_back_bounded(&mut self, candle: Candle) {
        if self.candles.len() == self.capacity {
            self.candles.pop_front();
        }
        self.candles.push_back(candle);
    }
}

/// In-memory candle history, one fixed-capacity ring per (symbol, timeframe).
///
/// Single-writer / many-reader: writers hold the lock only for the O(1)
/// upsert, readers clone a bounded slice. Every read is a point-in-time
/// snapshot; a reader never observes a half-applied append.
pub struct CandleStore {
    rings: HashMap<(Symbol, Timeframe), RwLock<CandleRing>>,
    backend: Option<Arc<dyn CandleBackend>>,
}

impl CandleStore {
    /// Builds rings for the full (symbol, timeframe) grid up front, so the
    /// map itself is immutable and lookups never contend.
    pub fn new(symbols: &[Symbol], timeframes: &[Timeframe], capacity: usize) -> Self {
        Self::with_backend(symbols, timeframes, capacity, None)
    }

    /// Store with an attached persistence backend: completed real candles
    /// are appended to it, and `hydrate` can preload the rings from it.
    pub fn with_backend(
        symbols: &[Symbol],
        timeframes: &[Timeframe],
        capacity: usize,
        backend: Option<Arc<dyn CandleBackend>>,
    ) -> Self {
        let capacity = capacity.max(MIN_RING_CAPACITY);
        let mut rings = HashMap::new();
        for &symbol in symbols {
            for &timeframe in timeframes {
                rings.insert((symbol, timeframe), RwLock::new(CandleRing::new(capacity)));
            }
        }
        Self { rings, backend }
    }

    /// Preloads every ring from the attached backend.
    pub async fn hydrate(&self) {
        let Some(backend) = &self.backend else { return };
        for (&(symbol, timeframe), ring) in &self.rings {
            let capacity = ring.read().await.capacity;
            match backend.load(symbol, timeframe, capacity).await {
                Ok(candles) if !candles.is_empty() => {
                    self.backfill(symbol, timeframe, candles).await;
                }
                Ok(_) => {}
                Err(e) => warn!("CandleStore: hydrate {symbol}/{timeframe} failed: {e}"),
            }
        }
    }

    fn ring(&self, symbol: Symbol, timeframe: Timeframe) -> Option<&RwLock<CandleRing>> {
        self.rings.get(&(symbol, timeframe))
    }

    /// Merges a batch of historical candles (any order, possibly overlapping
    /// what is already present). Real bars replace synthetic fills at the
    /// same open_time.
    pub async fn backfill(&self, symbol: Symbol, timeframe: Timeframe, batch: Vec<Candle>) {
        let Some(ring) = self.ring(symbol, timeframe) else {
            warn!("CandleStore: backfill for unconfigured pair {symbol}/{timeframe}");
            return;
        };
        let mut guard = ring.write().await;

        let mut merged: Vec<Candle> = guard.candles.iter().cloned().collect();
        for candle in batch {
            if !candle.is_well_formed() {
                warn!(
                    "CandleStore: dropping malformed candle {symbol}/{timeframe} @ {}",
                    candle.open_time
                );
                continue;
            }
            match merged.binary_search_by_key(&candle.open_time, |c| c.open_time) {
                Ok(idx) => {
                    if merged[idx].synthetic && !candle.synthetic {
                        merged[idx] = candle;
                    }
                }
                Err(idx) => merged.insert(idx, candle),
            }
        }

        let capacity = guard.capacity;
        if merged.len() > capacity {
            merged.drain(..merged.len() - capacity);
        }
        guard.candles = merged.into();
    }

    /// Upserts one candle at the head of the ring.
    ///
    /// Equal open_time replaces the current bar (the open candle being
    /// refreshed); a later open_time first fills any market-closed gap with
    /// flat bars at the prior close, then appends. Out-of-order history is
    /// ignored here; `backfill` owns that path.
    pub async fn apply(&self, symbol: Symbol, timeframe: Timeframe, candle: Candle) {
        let Some(ring) = self.ring(symbol, timeframe) else {
            warn!("CandleStore: apply for unconfigured pair {symbol}/{timeframe}");
            return;
        };
        if !candle.is_well_formed() {
            warn!(
                "CandleStore: dropping malformed candle {symbol}/{timeframe} @ {}",
                candle.open_time
            );
            return;
        }
        let mut guard = ring.write().await;

        let Some((last_open_time, prior_close)) =
            guard.candles.back().map(|c| (c.open_time, c.close))
        else {
            guard.push_back_bounded(candle);
            return;
        };

        let duration = timeframe.duration_ms();
        if candle.open_time == last_open_time {
            if let Some(slot) = guard.candles.back_mut() {
                *slot = candle;
            }
            return;
        }
        if candle.open_time < last_open_time {
            return;
        }

        // Gap fill, bounded by ring capacity so a long closure cannot spin.
        let gap_bars = (candle.open_time - last_open_time) / duration - 1;
        let fill_from = if gap_bars > guard.capacity as i64 {
            candle.open_time - guard.capacity as i64 * duration
        } else {
            last_open_time + duration
        };
        let mut open_time = fill_from;
        while open_time < candle.open_time {
            guard.push_back_bounded(Candle::flat(open_time, prior_close));
            open_time += duration;
        }

        if let Some(backend) = &self.backend {
            if !candle.synthetic {
                let backend = backend.clone();
                let persisted = candle.clone();
                tokio::spawn(async move {
                    if let Err(e) = backend.append(symbol, timeframe, &persisted).await {
                        error!("CandleStore: persist {symbol}/{timeframe} failed: {e}");
                    }
                });
            }
        }
        guard.push_back_bounded(candle);
    }

    /// Point-in-time snapshot of the most recent `n` candles, ascending.
    pub async fn snapshot(&self, symbol: Symbol, timeframe: Timeframe, n: usize) -> Vec<Candle> {
        match self.ring(symbol, timeframe) {
            Some(ring) => {
                let guard = ring.read().await;
                let start = guard.candles.len().saturating_sub(n);
                guard.candles.iter().skip(start).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    pub async fn last(&self, symbol: Symbol, timeframe: Timeframe) -> Option<Candle> {
        let ring = self.ring(symbol, timeframe)?;
        let guard = ring.read().await;
        guard.candles.back().cloned()
    }

    pub async fn len(&self, symbol: Symbol, timeframe: Timeframe) -> usize {
        match self.ring(symbol, timeframe) {
            Some(ring) => ring.read().await.candles.len(),
            None => 0,
        }
    }

    /// True when the newest candle is older than 1.5x the timeframe duration
    /// (or the ring is empty).
    pub async fn is_stale(&self, symbol: Symbol, timeframe: Timeframe, now_ms: i64) -> bool {
        match self.last(symbol, timeframe).await {
            Some(last) => {
                let age = now_ms - last.open_time;
                age * STALENESS_FACTOR_DEN > timeframe.duration_ms() * STALENESS_FACTOR_NUM
            }
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn candle(open_time: i64, close: Decimal) -> Candle {
        Candle {
            open_time,
            open: close,
            high: close + dec!(0.01),
            low: close - dec!(0.01),
            close,
            volume: None,
            synthetic: false,
        }
    }

    fn store() -> CandleStore {
        CandleStore::new(&[Symbol::USD_JPY], &[Timeframe::M15], MIN_RING_CAPACITY)
    }

    const M15_MS: i64 = 15 * 60 * 1000;

    #[tokio::test]
    async fn test_apply_appends_in_order() {
        let store = store();
        for i in 0..5 {
            store
                .apply(Symbol::USD_JPY, Timeframe::M15, candle(i * M15_MS, dec!(150)))
                .await;
        }
        let snapshot = store.snapshot(Symbol::USD_JPY, Timeframe::M15, 10).await;
        assert_eq!(snapshot.len(), 5);
        for pair in snapshot.windows(2) {
            assert_eq!(pair[1].open_time - pair[0].open_time, M15_MS);
        }
    }

    #[tokio::test]
    async fn test_apply_replaces_open_candle() {
        let store = store();
        store
            .apply(Symbol::USD_JPY, Timeframe::M15, candle(0, dec!(150.0)))
            .await;
        store
            .apply(Symbol::USD_JPY, Timeframe::M15, candle(0, dec!(150.5)))
            .await;
        assert_eq!(store.len(Symbol::USD_JPY, Timeframe::M15).await, 1);
        let last = store.last(Symbol::USD_JPY, Timeframe::M15).await.unwrap();
        assert_eq!(last.close, dec!(150.5));
    }

    #[tokio::test]
    async fn test_gap_is_filled_with_flat_bars() {
        let store = store();
        store
            .apply(Symbol::USD_JPY, Timeframe::M15, candle(0, dec!(150.0)))
            .await;
        // Skip three periods.
        store
            .apply(Symbol::USD_JPY, Timeframe::M15, candle(4 * M15_MS, dec!(150.2)))
            .await;

        let snapshot = store.snapshot(Symbol::USD_JPY, Timeframe::M15, 10).await;
        assert_eq!(snapshot.len(), 5);
        for filler in &snapshot[1..4] {
            assert!(filler.synthetic);
            assert_eq!(filler.close, dec!(150.0));
            assert_eq!(filler.open, filler.close);
        }
        // Monotonic grid with no holes.
        for pair in snapshot.windows(2) {
            assert_eq!(pair[1].open_time - pair[0].open_time, M15_MS);
        }
    }

    #[tokio::test]
    async fn test_backfill_merges_and_prefers_real_bars() {
        let store = store();
        store
            .apply(Symbol::USD_JPY, Timeframe::M15, candle(0, dec!(150.0)))
            .await;
        store
            .apply(Symbol::USD_JPY, Timeframe::M15, candle(2 * M15_MS, dec!(150.2)))
            .await;
        // The gap at 1*M15 was flat-filled; backfill now provides the real bar.
        store
            .backfill(
                Symbol::USD_JPY,
                Timeframe::M15,
                vec![candle(M15_MS, dec!(150.1))],
            )
            .await;

        let snapshot = store.snapshot(Symbol::USD_JPY, Timeframe::M15, 10).await;
        assert_eq!(snapshot.len(), 3);
        assert!(!snapshot[1].synthetic);
        assert_eq!(snapshot[1].close, dec!(150.1));
    }

    #[tokio::test]
    async fn test_ring_is_bounded() {
        let store = store();
        let n = MIN_RING_CAPACITY as i64 + 50;
        for i in 0..n {
            store
                .apply(Symbol::USD_JPY, Timeframe::M15, candle(i * M15_MS, dec!(150)))
                .await;
        }
        assert_eq!(
            store.len(Symbol::USD_JPY, Timeframe::M15).await,
            MIN_RING_CAPACITY
        );
        let snapshot = store.snapshot(Symbol::USD_JPY, Timeframe::M15, 1).await;
        assert_eq!(snapshot[0].open_time, (n - 1) * M15_MS);
    }

    #[tokio::test]
    async fn test_staleness() {
        let store = store();
        assert!(store.is_stale(Symbol::USD_JPY, Timeframe::M15, 0).await);

        store
            .apply(Symbol::USD_JPY, Timeframe::M15, candle(0, dec!(150)))
            .await;
        // Age exactly one duration: fresh.
        assert!(!store.is_stale(Symbol::USD_JPY, Timeframe::M15, M15_MS).await);
        // Age beyond 1.5x duration: stale.
        assert!(
            store
                .is_stale(Symbol::USD_JPY, Timeframe::M15, M15_MS * 2)
                .await
        );
    }

    struct RecordingBackend {
        seed: Vec<Candle>,
        appended: std::sync::Mutex<Vec<(Symbol, Timeframe, i64)>>,
    }

    #[async_trait::async_trait]
    impl crate::domain::ports::CandleBackend for RecordingBackend {
        async fn load(
            &self,
            _symbol: Symbol,
            _timeframe: Timeframe,
            n: usize,
        ) -> anyhow::Result<Vec<Candle>> {
            let start = self.seed.len().saturating_sub(n);
            Ok(self.seed[start..].to_vec())
        }

        async fn append(
            &self,
            symbol: Symbol,
            timeframe: Timeframe,
            candle: &Candle,
        ) -> anyhow::Result<()> {
            self.appended
                .lock()
                .unwrap()
                .push((symbol, timeframe, candle.open_time));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_backend_hydrates_and_receives_appends() {
        let backend = std::sync::Arc::new(RecordingBackend {
            seed: vec![candle(0, dec!(150.0)), candle(M15_MS, dec!(150.1))],
            appended: std::sync::Mutex::new(Vec::new()),
        });
        let store = CandleStore::with_backend(
            &[Symbol::USD_JPY],
            &[Timeframe::M15],
            MIN_RING_CAPACITY,
            Some(backend.clone()),
        );

        store.hydrate().await;
        assert_eq!(store.len(Symbol::USD_JPY, Timeframe::M15).await, 2);

        store
            .apply(Symbol::USD_JPY, Timeframe::M15, candle(2 * M15_MS, dec!(150.2)))
            .await;
        // The append is fired asynchronously; give it a beat.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let appended = backend.appended.lock().unwrap();
        assert_eq!(appended.as_slice(), &[(Symbol::USD_JPY, Timeframe::M15, 2 * M15_MS)]);
    }

    #[tokio::test]
    async fn test_out_of_order_apply_is_ignored() {
        let store = store();
        store
            .apply(Symbol::USD_JPY, Timeframe::M15, candle(2 * M15_MS, dec!(150)))
            .await;
        store
            .apply(Symbol::USD_JPY, Timeframe::M15, candle(M15_MS, dec!(149)))
            .await;
        assert_eq!(store.len(Symbol::USD_JPY, Timeframe::M15).await, 1);
    }
}
