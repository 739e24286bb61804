use crate::domain::errors::GatewayError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

type HmacSha256 = Hmac<Sha256>;

/// Headers attached to every private request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub api_key: String,
    pub timestamp: String,
    pub sign: String,
}

/// Builds `API-KEY / API-TIMESTAMP / API-SIGN` triples.
///
/// The signing message is `timestamp_ms || method || path || body` where
/// `path` starts at `/v1/...` (the `/private` prefix is never part of the
/// message) and `body` is the literal JSON for writes, empty for reads.
///
/// Credentials live here and nowhere else; they are never logged and never
/// cross the WebSocket boundary.
pub struct RequestSigner {
    api_key: String,
    secret_key: String,
    max_skew_ms: i64,
    server_offset_ms: AtomicI64,
    offset_known: AtomicBool,
}

impl RequestSigner {
    pub fn new(api_key: String, secret_key: String, max_skew_ms: i64) -> Self {
        Self {
            api_key,
            secret_key,
            max_skew_ms,
            server_offset_ms: AtomicI64::new(0),
            offset_known: AtomicBool::new(false),
        }
    }

    /// Record the broker-reported time from a response so the skew check
    /// tracks the server clock rather than trusting the local one.
    pub fn observe_server_time(&self, server_ms: i64, local_ms: i64) {
        self.server_offset_ms
            .store(server_ms - local_ms, Ordering::Relaxed);
        self.offset_known.store(true, Ordering::Relaxed);
    }

    /// Signs one request. Refuses with `ClockSkew` when the local clock has
    /// drifted outside the allowed window from the last observed server time.
    pub fn sign(
        &self,
        method: &str,
        path: &str,
        body: &str,
        now_ms: i64,
    ) -> Result<SignedHeaders, GatewayError> {
        debug_assert!(path.starts_with("/v1/"), "sign path must start at /v1");

        if self.offset_known.load(Ordering::Relaxed) {
            let skew = self.server_offset_ms.load(Ordering::Relaxed).abs();
            if skew > self.max_skew_ms {
                return Err(GatewayError::ClockSkew {
                    skew_ms: skew,
                    max_ms: self.max_skew_ms,
                });
            }
        }

        let timestamp = now_ms.to_string();
        let message = format!("{timestamp}{method}{path}{body}");

        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(message.as_bytes());
        let sign = hex::encode(mac.finalize().into_bytes());

        Ok(SignedHeaders {
            api_key: self.api_key.clone(),
            timestamp,
            sign,
        })
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Secret intentionally omitted.
        f.debug_struct("RequestSigner")
            .field("max_skew_ms", &self.max_skew_ms)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> RequestSigner {
        RequestSigner::new("test-key".into(), "test-secret".into(), 5000)
    }

    fn reference_sign(secret: &str, message: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_sign_matches_reference_hmac() {
        let headers = signer()
            .sign("GET", "/v1/account/assets", "", 1618588800000)
            .unwrap();

        assert_eq!(headers.api_key, "test-key");
        assert_eq!(headers.timestamp, "1618588800000");
        assert_eq!(
            headers.sign,
            reference_sign("test-secret", "1618588800000GET/v1/account/assets")
        );
    }

    #[test]
    fn test_sign_includes_body_for_writes() {
        let body = r#"{"symbol":"USD_JPY","side":"BUY","size":"10000","executionType":"MARKET"}"#;
        let headers = signer().sign("POST", "/v1/order", body, 1618588800000).unwrap();

        assert_eq!(
            headers.sign,
            reference_sign(
                "test-secret",
                &format!("1618588800000POST/v1/order{body}")
            )
        );
    }

    #[test]
    fn test_sign_is_lowercase_hex() {
        let headers = signer().sign("GET", "/v1/ticker", "", 1).unwrap();
        assert_eq!(headers.sign.len(), 64);
        assert!(
            headers
                .sign
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        );
    }

    #[test]
    fn test_refuses_on_clock_skew() {
        let signer = signer();
        // Local clock 8 seconds behind the server.
        signer.observe_server_time(1618588808000, 1618588800000);
        let err = signer
            .sign("GET", "/v1/account/assets", "", 1618588800000)
            .unwrap_err();
        assert!(matches!(err, GatewayError::ClockSkew { skew_ms: 8000, .. }));
    }

    #[test]
    fn test_signs_within_skew_window() {
        let signer = signer();
        signer.observe_server_time(1618588801000, 1618588800000);
        assert!(signer.sign("GET", "/v1/openPositions", "", 1618588800000).is_ok());
    }
}
