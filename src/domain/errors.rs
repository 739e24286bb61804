use thiserror::Error;

/// Errors surfaced by the broker gateway.
///
/// Transient categories (`RateLimited`, `Maintenance`, `Transport`) are
/// recovered inside the gateway with bounded backoff; everything else
/// propagates to the caller unchanged.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication rejected ({code:?}): {message}")]
    Auth {
        code: Option<String>,
        message: String,
    },

    #[error("Clock skew {skew_ms}ms exceeds allowed {max_ms}ms; refusing to sign")]
    ClockSkew { skew_ms: i64, max_ms: i64 },

    #[error("Rate limited by broker ({code})")]
    RateLimited { code: String },

    #[error("Broker under maintenance ({code})")]
    Maintenance { code: String },

    #[error("Market closed{}", .code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    MarketClosed { code: Option<String> },

    #[error("Broker rejected parameters ({code}): {message}")]
    Validation { code: String, message: String },

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Operation cancelled before a rate-limit token was granted")]
    Cancelled,

    #[error("Consumer of the '{channel}' channel stalled for more than {stalled_secs}s")]
    ConsumerStall { channel: String, stalled_secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Transient failures are safe to retry for idempotent requests.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::RateLimited { .. }
                | GatewayError::Maintenance { .. }
                | GatewayError::Transport(_)
        )
    }

    /// Maps a broker `message_code` (e.g. "ERR-5003") onto the taxonomy.
    pub fn from_broker_code(code: &str, message: &str) -> Self {
        match code {
            "ERR-5003" => GatewayError::RateLimited {
                code: code.to_string(),
            },
            "ERR-5010" | "ERR-5011" | "ERR-5012" => GatewayError::Auth {
                code: Some(code.to_string()),
                message: message.to_string(),
            },
            "ERR-5201" | "ERR-5202" => GatewayError::Maintenance {
                code: code.to_string(),
            },
            "ERR-5218" => GatewayError::MarketClosed {
                code: Some(code.to_string()),
            },
            _ => GatewayError::Validation {
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

impl From<reqwest_middleware::Error> for GatewayError {
    fn from(err: reqwest_middleware::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Transport(format!("deserialisation failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_code_mapping() {
        assert!(matches!(
            GatewayError::from_broker_code("ERR-5003", "too many requests"),
            GatewayError::RateLimited { .. }
        ));
        assert!(matches!(
            GatewayError::from_broker_code("ERR-5012", "token expired"),
            GatewayError::Auth { .. }
        ));
        assert!(matches!(
            GatewayError::from_broker_code("ERR-5201", "maintenance"),
            GatewayError::Maintenance { .. }
        ));
        assert!(matches!(
            GatewayError::from_broker_code("ERR-5218", "market closed"),
            GatewayError::MarketClosed { .. }
        ));
        assert!(matches!(
            GatewayError::from_broker_code("ERR-5126", "invalid size"),
            GatewayError::Validation { .. }
        ));
    }

    #[test]
    fn test_transient_classification() {
        assert!(
            GatewayError::RateLimited {
                code: "ERR-5003".into()
            }
            .is_transient()
        );
        assert!(GatewayError::Transport("connection reset".into()).is_transient());
        assert!(
            !GatewayError::Auth {
                code: None,
                message: "missing key".into()
            }
            .is_transient()
        );
        assert!(!GatewayError::Cancelled.is_transient());
    }

    #[test]
    fn test_display_carries_broker_code() {
        let err = GatewayError::from_broker_code("ERR-5126", "size below minimum");
        let msg = err.to_string();
        assert!(msg.contains("ERR-5126"));
        assert!(msg.contains("size below minimum"));
    }
}
