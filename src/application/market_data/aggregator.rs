use crate::domain::market::{Candle, Quote, Symbol, Timeframe};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug)]
struct CandleBuilder {
    open_time: i64,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
}

impl CandleBuilder {
    fn new(open_time: i64, price: Decimal) -> Self {
        Self {
            open_time,
            open: price,
            high: price,
            low: price,
            close: price,
        }
    }

    fn update(&mut self, price: Decimal) {
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
        self.close = price;
    }

    fn build(&self) -> Candle {
        Candle {
            open_time: self.open_time,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: None,
            synthetic: false,
        }
    }
}

/// Folds inbound quotes into open candles, one builder per timeframe.
///
/// Rotation rule: a candle with open_time T closes at T + duration; a quote
/// stamped at or past the boundary first emits the closed candle, then opens
/// the next one. Gaps longer than one duration are emitted as flat bars at
/// the prior close so the grid stays hole-free across market closures.
pub struct TickAggregator {
    symbol: Symbol,
    timeframes: Vec<Timeframe>,
    builders: HashMap<Timeframe, CandleBuilder>,
}

impl TickAggregator {
    pub fn new(symbol: Symbol, timeframes: Vec<Timeframe>) -> Self {
        Self {
            symbol,
            timeframes,
            builders: HashMap::new(),
        }
    }

    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    /// Processes one quote at its mid price. Returns all candles completed by
    /// this quote (several timeframes can rotate on the same boundary).
    pub fn on_quote(&mut self, quote: &Quote) -> Vec<(Timeframe, Candle)> {
        let price = quote.mid();
        let mut completed = Vec::new();

        for &timeframe in &self.timeframes {
            let period = timeframe.period_start(quote.timestamp);

            match self.builders.get_mut(&timeframe) {
                None => {
                    debug!(
                        "TickAggregator: {} {} first quote, opening candle @ {}",
                        self.symbol, timeframe, period
                    );
                    self.builders
                        .insert(timeframe, CandleBuilder::new(period, price));
                }
                Some(builder) if period == builder.open_time => {
                    builder.update(price);
                }
                Some(builder) if period > builder.open_time => {
                    let closed = builder.build();
                    let prior_close = closed.close;
                    let duration = timeframe.duration_ms();
                    completed.push((timeframe, closed));

                    // Market-closed stretch: one flat bar per skipped period.
                    let mut missing = builder.open_time + duration;
                    while missing < period {
                        completed.push((timeframe, Candle::flat(missing, prior_close)));
                        missing += duration;
                    }

                    *builder = CandleBuilder::new(period, price);
                }
                Some(_) => {
                    // Late quote from before the open candle's period.
                    debug!(
                        "TickAggregator: {} {} dropping late quote @ {}",
                        self.symbol, timeframe, quote.timestamp
                    );
                }
            }
        }

        completed
    }

    /// The current open (incomplete) candle for a timeframe, if any.
    pub fn open_candle(&self, timeframe: Timeframe) -> Option<Candle> {
        self.builders.get(&timeframe).map(CandleBuilder::build)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::MarketStatus;
    use rust_decimal_macros::dec;

    const M15_MS: i64 = 15 * 60 * 1000;

    fn quote(ts: i64, bid: Decimal, ask: Decimal) -> Quote {
        Quote {
            symbol: Symbol::USD_JPY,
            bid,
            ask,
            timestamp: ts,
            status: MarketStatus::Open,
        }
    }

    fn m15_aggregator() -> TickAggregator {
        TickAggregator::new(Symbol::USD_JPY, vec![Timeframe::M15])
    }

    #[test]
    fn test_quotes_within_period_update_open_candle() {
        let mut agg = m15_aggregator();

        assert!(agg.on_quote(&quote(0, dec!(150.00), dec!(150.01))).is_empty());
        assert!(
            agg.on_quote(&quote(60_000, dec!(150.10), dec!(150.11)))
                .is_empty()
        );
        assert!(
            agg.on_quote(&quote(120_000, dec!(149.90), dec!(149.91)))
                .is_empty()
        );

        let open = agg.open_candle(Timeframe::M15).unwrap();
        assert_eq!(open.open, dec!(150.005));
        assert_eq!(open.high, dec!(150.105));
        assert_eq!(open.low, dec!(149.905));
        assert_eq!(open.close, dec!(149.905));
    }

    #[test]
    fn test_quote_exactly_on_boundary_rotates() {
        let mut agg = m15_aggregator();
        agg.on_quote(&quote(0, dec!(150.00), dec!(150.01)));
        agg.on_quote(&quote(M15_MS - 1, dec!(150.20), dec!(150.21)));

        // Quote exactly at HH:15 closes the previous bar and opens the next.
        let completed = agg.on_quote(&quote(M15_MS, dec!(150.30), dec!(150.31)));
        assert_eq!(completed.len(), 1);
        let (tf, candle) = &completed[0];
        assert_eq!(*tf, Timeframe::M15);
        assert_eq!(candle.open_time, 0);
        assert_eq!(candle.close, dec!(150.205));

        let next_open = agg.open_candle(Timeframe::M15).unwrap();
        assert_eq!(next_open.open_time, M15_MS);
        assert_eq!(next_open.open, dec!(150.305));
    }

    #[test]
    fn test_gap_emits_flat_bars() {
        let mut agg = m15_aggregator();
        agg.on_quote(&quote(0, dec!(150.00), dec!(150.02)));

        // Next quote lands 4 periods later (market was closed).
        let completed = agg.on_quote(&quote(4 * M15_MS, dec!(150.40), dec!(150.42)));
        assert_eq!(completed.len(), 4);
        assert!(!completed[0].1.synthetic);
        for (_, flat) in &completed[1..] {
            assert!(flat.synthetic);
            assert_eq!(flat.close, dec!(150.01));
        }
        // Contiguous open_times across real and flat bars.
        let times: Vec<i64> = completed.iter().map(|(_, c)| c.open_time).collect();
        assert_eq!(times, vec![0, M15_MS, 2 * M15_MS, 3 * M15_MS]);
    }

    #[test]
    fn test_multiple_timeframes_rotate_together() {
        let mut agg =
            TickAggregator::new(Symbol::USD_JPY, vec![Timeframe::M1, Timeframe::M15]);
        agg.on_quote(&quote(0, dec!(150.00), dec!(150.02)));

        // One minute in: M1 rotates, M15 does not.
        let completed = agg.on_quote(&quote(60_000, dec!(150.10), dec!(150.12)));
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].0, Timeframe::M1);

        // At the quarter hour both rotate.
        let completed = agg.on_quote(&quote(M15_MS, dec!(150.20), dec!(150.22)));
        let frames: Vec<Timeframe> = completed.iter().map(|(tf, _)| *tf).collect();
        assert!(frames.contains(&Timeframe::M1));
        assert!(frames.contains(&Timeframe::M15));
    }

    #[test]
    fn test_late_quote_is_dropped() {
        let mut agg = m15_aggregator();
        agg.on_quote(&quote(M15_MS, dec!(150.00), dec!(150.02)));
        let before = agg.open_candle(Timeframe::M15).unwrap();

        assert!(agg.on_quote(&quote(0, dec!(140.00), dec!(140.02))).is_empty());
        let after = agg.open_candle(Timeframe::M15).unwrap();
        assert_eq!(before, after);
    }
}
