use super::dto::{
    AccountAsset, ActiveOrder, Execution, KlineEntry, ListData, OpenPosition,
    PositionSummaryEntry, StatusData, SymbolRule, TickerEntry,
};
use super::envelope::{Decoded, decode_empty_envelope, decode_envelope};
use super::signer::RequestSigner;
use crate::domain::errors::GatewayError;
use crate::domain::market::{Candle, MarketStatus, Quote, Symbol, Timeframe};
use crate::infrastructure::core::http_client_factory::{HttpClientFactory, build_url_with_query};
use crate::infrastructure::core::rate_limiter::{MethodClass, RateLimiter};
use chrono::Utc;
use rand::Rng;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest_middleware::ClientWithMiddleware;
use serde::de::DeserializeOwned;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

const DEFAULT_CALL_DEADLINE: Duration = Duration::from_secs(10);
const MAX_ATTEMPTS: usize = 3;
const RETRY_BUDGET: Duration = Duration::from_secs(5);
const BACKOFF_BASE_MS: u64 = 250;
const BACKOFF_CAP_MS: u64 = 2_000;

/// Which side of a kline (bid or ask series) to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceType {
    Bid,
    Ask,
}

impl PriceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceType::Bid => "BID",
            PriceType::Ask => "ASK",
        }
    }
}

/// Typed client for the broker's REST surface.
///
/// Every call funnels through the shared rate limiter before it touches the
/// network; private calls are signed per attempt so retried requests never
/// reuse a stale timestamp.
pub struct GmoRestClient {
    public_http: ClientWithMiddleware,
    private_http: Client,
    limiter: Arc<RateLimiter>,
    signer: Option<Arc<RequestSigner>>,
    public_base: String,
    private_base: String,
    call_deadline: Duration,
    pub(crate) trading_enabled: bool,
}

impl GmoRestClient {
    pub fn new(
        limiter: Arc<RateLimiter>,
        signer: Option<Arc<RequestSigner>>,
        public_base: String,
        private_base: String,
        trading_enabled: bool,
    ) -> Self {
        Self {
            public_http: HttpClientFactory::public_client(DEFAULT_CALL_DEADLINE),
            private_http: HttpClientFactory::private_client(DEFAULT_CALL_DEADLINE),
            limiter,
            signer,
            public_base,
            private_base,
            call_deadline: DEFAULT_CALL_DEADLINE,
            trading_enabled,
        }
    }

    pub fn limiter(&self) -> Arc<RateLimiter> {
        self.limiter.clone()
    }

    pub fn has_credentials(&self) -> bool {
        self.signer.is_some()
    }

    // ---- public read ----

    pub async fn get_status(&self) -> Result<MarketStatus, GatewayError> {
        let decoded: Decoded<StatusData> = self.public_get("/v1/status", &[]).await?;
        MarketStatus::from_str(&decoded.data.status)
            .map_err(|e| GatewayError::Transport(e.to_string()))
    }

    /// Latest rates for all pairs, filtered down to the known symbol set.
    pub async fn get_ticker(&self) -> Result<Vec<Quote>, GatewayError> {
        let decoded: Decoded<Vec<TickerEntry>> = self.public_get("/v1/ticker", &[]).await?;
        let mut quotes = Vec::with_capacity(decoded.data.len());
        for entry in decoded.data {
            // The broker may list pairs outside our fixed enumeration; skip them.
            if Symbol::from_str(&entry.symbol).is_ok() {
                quotes.push(entry.into_quote()?);
            }
        }
        Ok(quotes)
    }

    /// OHLC bars for one (symbol, interval, date) page. `date` is `YYYYMMDD`
    /// for intraday intervals and `YYYY` for 4-hour and larger ones.
    pub async fn get_klines(
        &self,
        symbol: Symbol,
        price_type: PriceType,
        timeframe: Timeframe,
        date: &str,
    ) -> Result<Vec<Candle>, GatewayError> {
        let decoded: Decoded<Vec<KlineEntry>> = self
            .public_get(
                "/v1/klines",
                &[
                    ("symbol", symbol.as_str()),
                    ("priceType", price_type.as_str()),
                    ("interval", timeframe.to_gmo_interval()),
                    ("date", date),
                ],
            )
            .await?;
        decoded
            .data
            .into_iter()
            .map(KlineEntry::into_candle)
            .collect()
    }

    /// Trading rules per pair (min/max sizes, tick size).
    pub async fn get_symbols(&self) -> Result<Vec<SymbolRule>, GatewayError> {
        let decoded: Decoded<Vec<SymbolRule>> = self.public_get("/v1/symbols", &[]).await?;
        Ok(decoded.data)
    }

    // ---- private read ----

    pub async fn get_assets(&self) -> Result<Vec<AccountAsset>, GatewayError> {
        let decoded: Decoded<Vec<AccountAsset>> =
            self.private_get("/v1/account/assets", &[]).await?;
        Ok(decoded.data)
    }

    pub async fn get_open_positions(
        &self,
        symbol: Option<Symbol>,
    ) -> Result<Vec<OpenPosition>, GatewayError> {
        let mut params = Vec::new();
        if let Some(symbol) = symbol {
            params.push(("symbol", symbol.as_str().to_string()));
        }
        let decoded: Decoded<ListData<OpenPosition>> =
            self.private_get("/v1/openPositions", &params).await?;
        Ok(decoded.data.list)
    }

    pub async fn get_position_summary(
        &self,
        symbol: Option<Symbol>,
    ) -> Result<Vec<PositionSummaryEntry>, GatewayError> {
        let mut params = Vec::new();
        if let Some(symbol) = symbol {
            params.push(("symbol", symbol.as_str().to_string()));
        }
        let decoded: Decoded<ListData<PositionSummaryEntry>> =
            self.private_get("/v1/positionSummary", &params).await?;
        Ok(decoded.data.list)
    }

    pub async fn get_active_orders(
        &self,
        symbol: Option<Symbol>,
    ) -> Result<Vec<ActiveOrder>, GatewayError> {
        let mut params = Vec::new();
        if let Some(symbol) = symbol {
            params.push(("symbol", symbol.as_str().to_string()));
        }
        let decoded: Decoded<ListData<ActiveOrder>> =
            self.private_get("/v1/activeOrders", &params).await?;
        Ok(decoded.data.list)
    }

    pub async fn get_executions(
        &self,
        order_id: i64,
    ) -> Result<Vec<Execution>, GatewayError> {
        let decoded: Decoded<ListData<Execution>> = self
            .private_get("/v1/executions", &[("orderId", order_id.to_string())])
            .await?;
        Ok(decoded.data.list)
    }

    pub async fn get_latest_executions(
        &self,
        symbol: Symbol,
        count: u32,
    ) -> Result<Vec<Execution>, GatewayError> {
        let decoded: Decoded<ListData<Execution>> = self
            .private_get(
                "/v1/latestExecutions",
                &[
                    ("symbol", symbol.as_str().to_string()),
                    ("count", count.to_string()),
                ],
            )
            .await?;
        Ok(decoded.data.list)
    }

    // ---- ws-auth token lifecycle ----

    pub async fn create_ws_token(&self) -> Result<String, GatewayError> {
        let decoded: Decoded<String> = self.private_write("POST", "/v1/ws-auth", "", false).await?;
        Ok(decoded.data)
    }

    pub async fn extend_ws_token(&self, token: &str) -> Result<(), GatewayError> {
        let body = serde_json::json!({ "token": token }).to_string();
        self.private_write_empty("PUT", "/v1/ws-auth", &body).await
    }

    pub async fn delete_ws_token(&self, token: &str) -> Result<(), GatewayError> {
        let body = serde_json::json!({ "token": token }).to_string();
        self.private_write_empty("DELETE", "/v1/ws-auth", &body).await
    }

    // ---- plumbing ----

    fn require_signer(&self) -> Result<&Arc<RequestSigner>, GatewayError> {
        self.signer.as_ref().ok_or_else(|| {
            GatewayError::Auth {
                code: None,
                message: "api.key/api.secret not configured; gateway is public-only".into(),
            }
        })
    }

    async fn public_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Decoded<T>, GatewayError> {
        self.limiter
            .acquire(MethodClass::PublicGet, self.call_deadline)
            .await?;

        let url = build_url_with_query(&format!("{}{}", self.public_base, path), params);
        let response = self.public_http.get(&url).send().await?;
        let http_status = response.status();
        let body = response.text().await.map_err(GatewayError::from)?;

        if http_status.as_u16() == 429 {
            return Err(GatewayError::RateLimited { code: "HTTP-429".into() });
        }
        decode_envelope(&body)
    }

    /// Signed GET with bounded transient retry. Each attempt re-acquires a
    /// limiter token and re-signs with a fresh timestamp.
    async fn private_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Decoded<T>, GatewayError> {
        let signer = self.require_signer()?.clone();
        let started = Instant::now();
        let mut backoff_ms = BACKOFF_BASE_MS;

        for attempt in 1..=MAX_ATTEMPTS {
            self.limiter
                .acquire(MethodClass::PrivateGet, self.call_deadline)
                .await?;

            let result = self.private_get_once::<T>(&signer, path, params).await;
            match result {
                Ok(decoded) => return Ok(decoded),
                Err(err) if err.is_transient() && attempt < MAX_ATTEMPTS => {
                    let wait = decorrelated_jitter(&mut backoff_ms);
                    if started.elapsed() + wait > RETRY_BUDGET {
                        return Err(err);
                    }
                    warn!(path, attempt, wait_ms = wait.as_millis() as u64, error = %err,
                        "transient private GET failure, backing off");
                    tokio::time::sleep(wait).await;
                }
                Err(err) => return Err(err),
            }
        }
        Err(GatewayError::Internal("retry loop exhausted".into()))
    }

    async fn private_get_once<T: DeserializeOwned>(
        &self,
        signer: &RequestSigner,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Decoded<T>, GatewayError> {
        let now_ms = Utc::now().timestamp_millis();
        let headers = signer.sign("GET", path, "", now_ms)?;

        let query: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let url = build_url_with_query(&format!("{}{}", self.private_base, path), &query);

        let response = self
            .private_http
            .get(&url)
            .headers(private_headers(&headers, false)?)
            .send()
            .await?;
        let http_status = response.status();
        let body = response.text().await.map_err(GatewayError::from)?;

        if http_status.as_u16() == 429 {
            return Err(GatewayError::RateLimited { code: "HTTP-429".into() });
        }
        if http_status.is_server_error() {
            return Err(GatewayError::Transport(format!(
                "broker returned HTTP {http_status}"
            )));
        }

        let decoded: Decoded<T> = decode_envelope(&body)?;
        if let Some(responsetime) = decoded.responsetime {
            signer.observe_server_time(responsetime.timestamp_millis(), now_ms);
        }
        Ok(decoded)
    }

    /// Signed write. `retryable` must only be true when the payload carries a
    /// client order id, otherwise a resend could double-fill.
    pub(crate) async fn private_write<T: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        body: &str,
        retryable: bool,
    ) -> Result<Decoded<T>, GatewayError> {
        let signer = self.require_signer()?.clone();
        let started = Instant::now();
        let mut backoff_ms = BACKOFF_BASE_MS;
        let attempts = if retryable { MAX_ATTEMPTS } else { 1 };

        for attempt in 1..=attempts {
            self.limiter
                .acquire(MethodClass::PrivatePost, self.call_deadline)
                .await?;

            let result = self.private_write_once::<T>(&signer, method, path, body).await;
            match result {
                Ok(decoded) => return Ok(decoded),
                Err(err) if err.is_transient() && attempt < attempts => {
                    let wait = decorrelated_jitter(&mut backoff_ms);
                    if started.elapsed() + wait > RETRY_BUDGET {
                        return Err(err);
                    }
                    debug!(path, attempt, "retrying idempotent private write");
                    tokio::time::sleep(wait).await;
                }
                Err(err) => return Err(err),
            }
        }
        Err(GatewayError::Internal("retry loop exhausted".into()))
    }

    async fn private_write_once<T: DeserializeOwned>(
        &self,
        signer: &RequestSigner,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<Decoded<T>, GatewayError> {
        let now_ms = Utc::now().timestamp_millis();
        let headers = signer.sign(method, path, body, now_ms)?;
        let url = format!("{}{}", self.private_base, path);

        let request = match method {
            "POST" => self.private_http.post(&url),
            "PUT" => self.private_http.put(&url),
            "DELETE" => self.private_http.delete(&url),
            other => {
                return Err(GatewayError::Internal(format!(
                    "unsupported write method {other}"
                )));
            }
        };

        let response = request
            .headers(private_headers(&headers, true)?)
            .body(body.to_string())
            .send()
            .await?;
        let http_status = response.status();
        let text = response.text().await.map_err(GatewayError::from)?;

        if http_status.as_u16() == 429 {
            return Err(GatewayError::RateLimited { code: "HTTP-429".into() });
        }
        if http_status.is_server_error() {
            return Err(GatewayError::Transport(format!(
                "broker returned HTTP {http_status}"
            )));
        }

        let decoded: Decoded<T> = decode_envelope(&text)?;
        if let Some(responsetime) = decoded.responsetime {
            signer.observe_server_time(responsetime.timestamp_millis(), now_ms);
        }
        Ok(decoded)
    }

    async fn private_write_empty(
        &self,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<(), GatewayError> {
        let signer = self.require_signer()?.clone();
        self.limiter
            .acquire(MethodClass::PrivatePost, self.call_deadline)
            .await?;

        let now_ms = Utc::now().timestamp_millis();
        let headers = signer.sign(method, path, body, now_ms)?;
        let url = format!("{}{}", self.private_base, path);

        let request = match method {
            "PUT" => self.private_http.put(&url),
            "DELETE" => self.private_http.delete(&url),
            other => {
                return Err(GatewayError::Internal(format!(
                    "unsupported write method {other}"
                )));
            }
        };
        let response = request
            .headers(private_headers(&headers, true)?)
            .body(body.to_string())
            .send()
            .await?;
        let text = response.text().await.map_err(GatewayError::from)?;
        decode_empty_envelope(&text)?;
        Ok(())
    }
}

fn private_headers(
    signed: &super::signer::SignedHeaders,
    with_body: bool,
) -> Result<HeaderMap, GatewayError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        "API-KEY",
        HeaderValue::from_str(&signed.api_key)
            .map_err(|_| GatewayError::Config("api.key contains invalid characters".into()))?,
    );
    headers.insert(
        "API-TIMESTAMP",
        HeaderValue::from_str(&signed.timestamp)
            .map_err(|_| GatewayError::Internal("timestamp header".into()))?,
    );
    headers.insert(
        "API-SIGN",
        HeaderValue::from_str(&signed.sign)
            .map_err(|_| GatewayError::Internal("sign header".into()))?,
    );
    if with_body {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    Ok(headers)
}

/// Decorrelated exponential backoff with jitter: each wait is drawn from
/// [base, prev*3], capped, so concurrent retriers spread out.
fn decorrelated_jitter(prev_ms: &mut u64) -> Duration {
    let upper = (*prev_ms * 3).clamp(BACKOFF_BASE_MS + 1, BACKOFF_CAP_MS);
    let next = rand::thread_rng().gen_range(BACKOFF_BASE_MS..upper);
    *prev_ms = next;
    Duration::from_millis(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::core::rate_limiter::RateLimitConfig;

    fn client(signer: Option<Arc<RequestSigner>>) -> GmoRestClient {
        GmoRestClient::new(
            Arc::new(RateLimiter::new(RateLimitConfig::default())),
            signer,
            "https://forex-api.coin.z.com/public".into(),
            "https://forex-api.coin.z.com/private".into(),
            false,
        )
    }

    #[tokio::test]
    async fn test_private_read_requires_credentials() {
        let client = client(None);
        let err = client.get_assets().await.unwrap_err();
        assert!(matches!(err, GatewayError::Auth { code: None, .. }));
    }

    #[test]
    fn test_backoff_stays_within_cap() {
        let mut prev = BACKOFF_BASE_MS;
        for _ in 0..10 {
            let wait = decorrelated_jitter(&mut prev);
            assert!(wait >= Duration::from_millis(BACKOFF_BASE_MS));
            assert!(wait <= Duration::from_millis(BACKOFF_CAP_MS));
        }
    }

    #[test]
    fn test_price_type_wire_names() {
        assert_eq!(PriceType::Bid.as_str(), "BID");
        assert_eq!(PriceType::Ask.as_str(), "ASK");
    }
}
