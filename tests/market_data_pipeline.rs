//! Quotes through the aggregator into the store: grid invariants hold
//! end-to-end.

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use rustfx::application::market_data::{CandleStore, TickAggregator};
use rustfx::domain::market::{MarketStatus, Quote, Symbol, Timeframe};
use std::sync::Arc;

const M1_MS: i64 = 60_000;
const M15_MS: i64 = 900_000;

fn quote(ts: i64, mid: f64) -> Quote {
    let half_spread = 0.006;
    let d = |v: f64| Decimal::from_f64(v).unwrap().round_dp(3);
    Quote {
        symbol: Symbol::USD_JPY,
        bid: d(mid - half_spread),
        ask: d(mid + half_spread),
        timestamp: ts,
        status: MarketStatus::Open,
    }
}

#[tokio::test]
async fn candle_grid_is_monotonic_and_gapless() {
    let store = Arc::new(CandleStore::new(
        &[Symbol::USD_JPY],
        &[Timeframe::M1, Timeframe::M15],
        500,
    ));
    let mut aggregator =
        TickAggregator::new(Symbol::USD_JPY, vec![Timeframe::M1, Timeframe::M15]);

    // Two hours of quotes every 20 seconds, with a 25-minute hole in the
    // middle (venue closed).
    let mut ts = 0i64;
    while ts < 2 * 3_600_000 {
        if !(40 * M1_MS..65 * M1_MS).contains(&ts) {
            let mid = 150.0 + (ts as f64 / 3_600_000.0) * 0.2;
            for (timeframe, candle) in aggregator.on_quote(&quote(ts, mid)) {
                store.apply(Symbol::USD_JPY, timeframe, candle).await;
            }
        }
        ts += 20_000;
    }

    for timeframe in [Timeframe::M1, Timeframe::M15] {
        let candles = store.snapshot(Symbol::USD_JPY, timeframe, 500).await;
        assert!(!candles.is_empty());
        // Consecutive open_times differ by exactly the timeframe duration.
        for pair in candles.windows(2) {
            assert_eq!(
                pair[1].open_time - pair[0].open_time,
                timeframe.duration_ms(),
                "hole or overlap in the {timeframe} grid"
            );
        }
        for candle in &candles {
            assert!(candle.is_well_formed());
        }
    }

    // The closed stretch appears as synthetic flat bars on M1.
    let m1 = store.snapshot(Symbol::USD_JPY, Timeframe::M1, 500).await;
    let synthetic = m1.iter().filter(|c| c.synthetic).count();
    assert!(synthetic >= 20, "expected flat fills, found {synthetic}");

    // Flat bars pin all four prices to the prior close.
    for candle in m1.iter().filter(|c| c.synthetic) {
        assert_eq!(candle.open, candle.close);
        assert_eq!(candle.high, candle.low);
    }
}

#[tokio::test]
async fn m15_boundary_closes_exactly_on_the_quarter_hour() {
    let store = Arc::new(CandleStore::new(
        &[Symbol::USD_JPY],
        &[Timeframe::M15],
        500,
    ));
    let mut aggregator = TickAggregator::new(Symbol::USD_JPY, vec![Timeframe::M15]);

    for (timeframe, candle) in aggregator.on_quote(&quote(14 * M1_MS + 59_000, 150.10)) {
        store.apply(Symbol::USD_JPY, timeframe, candle).await;
    }
    assert_eq!(store.len(Symbol::USD_JPY, Timeframe::M15).await, 0);

    // The quote at exactly 00:15:00 completes the first bar.
    for (timeframe, candle) in aggregator.on_quote(&quote(M15_MS, 150.20)) {
        store.apply(Symbol::USD_JPY, timeframe, candle).await;
    }
    let closed = store.last(Symbol::USD_JPY, Timeframe::M15).await.unwrap();
    assert_eq!(closed.open_time, 0);
    assert_eq!(closed.close, Decimal::from_f64(150.10).unwrap().round_dp(3));

    let open = aggregator.open_candle(Timeframe::M15).unwrap();
    assert_eq!(open.open_time, M15_MS);
}
