use super::candle_store::CandleStore;
use crate::domain::errors::GatewayError;
use crate::domain::market::{Symbol, Timeframe};
use crate::infrastructure::gmo::rest::{GmoRestClient, PriceType};
use chrono::{DateTime, Datelike, Duration as ChronoDuration, Utc, Weekday};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Give up walking backwards after this many consecutive empty pages; the
/// history simply does not reach further.
const MAX_CONSECUTIVE_EMPTY: usize = 5;
/// Hard cap on how far the intraday walker looks back, in calendar days.
const MAX_DAYS_BACK: i64 = 40;
/// Hard cap on how far the yearly walker looks back.
const MAX_YEARS_BACK: i32 = 3;

/// Fills candle rings from the broker's kline endpoint.
///
/// The endpoint serves one `date` page per request: `YYYYMMDD` for intraday
/// intervals, `YYYY` for 4-hour and larger ones. Warm-up therefore walks
/// backwards page by page (skipping FX weekend days) until the ring holds
/// enough history.
pub struct KlineBackfiller {
    rest: Arc<GmoRestClient>,
    store: Arc<CandleStore>,
    price_type: PriceType,
}

impl KlineBackfiller {
    pub fn new(rest: Arc<GmoRestClient>, store: Arc<CandleStore>, price_type: PriceType) -> Self {
        Self {
            rest,
            store,
            price_type,
        }
    }

    /// Backfills one ring up to `target` candles. Returns how many candles
    /// the ring holds afterwards.
    pub async fn warmup(
        &self,
        symbol: Symbol,
        timeframe: Timeframe,
        target: usize,
        now: DateTime<Utc>,
    ) -> Result<usize, GatewayError> {
        let mut collected: Vec<crate::domain::market::Candle> = Vec::new();
        let mut consecutive_empty = 0usize;

        if timeframe.uses_yearly_date() {
            for years_back in 0..=MAX_YEARS_BACK {
                if collected.len() >= target {
                    break;
                }
                let year = now.year() - years_back;
                let page = self
                    .fetch_page(symbol, timeframe, &format!("{year}"))
                    .await?;
                if page.is_empty() {
                    consecutive_empty += 1;
                    if consecutive_empty >= MAX_CONSECUTIVE_EMPTY {
                        break;
                    }
                } else {
                    consecutive_empty = 0;
                    collected.extend(page);
                }
            }
        } else {
            let mut day = now.date_naive();
            let mut days_walked = 0i64;
            while collected.len() < target && days_walked < MAX_DAYS_BACK {
                days_walked += 1;
                let current = day;
                day -= ChronoDuration::days(1);

                // FX is closed on Saturday; Sunday pages are empty too.
                if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
                    continue;
                }
                let date = current.format("%Y%m%d").to_string();
                let page = self.fetch_page(symbol, timeframe, &date).await?;
                if page.is_empty() {
                    consecutive_empty += 1;
                    if consecutive_empty >= MAX_CONSECUTIVE_EMPTY {
                        warn!(
                            "KlineBackfiller: {symbol}/{timeframe} ran dry after {} empty days",
                            consecutive_empty
                        );
                        break;
                    }
                } else {
                    consecutive_empty = 0;
                    collected.extend(page);
                }
            }
        }

        if collected.is_empty() {
            warn!("KlineBackfiller: no history available for {symbol}/{timeframe}");
        } else {
            collected.sort_by_key(|c| c.open_time);
            self.store.backfill(symbol, timeframe, collected).await;
        }

        let len = self.store.len(symbol, timeframe).await;
        info!("KlineBackfiller: {symbol}/{timeframe} warmed up with {len} candles");
        Ok(len)
    }

    /// Refreshes a ring whose newest candle has gone stale, fetching just the
    /// current page (plus the previous one shortly after a page boundary).
    pub async fn ensure_fresh(
        &self,
        symbol: Symbol,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        if !self
            .store
            .is_stale(symbol, timeframe, now.timestamp_millis())
            .await
        {
            return Ok(());
        }
        debug!("KlineBackfiller: {symbol}/{timeframe} stale, refreshing");

        let mut pages = Vec::new();
        if timeframe.uses_yearly_date() {
            pages.push(format!("{}", now.year()));
        } else {
            pages.push(now.date_naive().format("%Y%m%d").to_string());
            // Just past midnight the current page may still be empty.
            let previous = now.date_naive() - ChronoDuration::days(1);
            pages.push(previous.format("%Y%m%d").to_string());
        }

        let mut merged = Vec::new();
        for date in pages {
            merged.extend(self.fetch_page(symbol, timeframe, &date).await?);
            if !merged.is_empty() && !timeframe.uses_yearly_date() {
                // The newest page sufficed.
                break;
            }
        }
        if !merged.is_empty() {
            merged.sort_by_key(|c| c.open_time);
            self.store.backfill(symbol, timeframe, merged).await;
        }
        Ok(())
    }

    async fn fetch_page(
        &self,
        symbol: Symbol,
        timeframe: Timeframe,
        date: &str,
    ) -> Result<Vec<crate::domain::market::Candle>, GatewayError> {
        match self
            .rest
            .get_klines(symbol, self.price_type, timeframe, date)
            .await
        {
            Ok(candles) => Ok(candles),
            // A page outside the venue's history answers MARKET_CLOSED-like
            // validation errors rather than an empty list; treat as empty.
            Err(GatewayError::Validation { .. }) | Err(GatewayError::MarketClosed { .. }) => {
                Ok(Vec::new())
            }
            Err(other) => Err(other),
        }
    }
}
