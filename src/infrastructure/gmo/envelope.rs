use crate::domain::errors::GatewayError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Error entry carried by a failed broker response.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerMessage {
    #[serde(rename = "message_code")]
    pub code: String,
    #[serde(rename = "message_string")]
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope<T> {
    status: i64,
    data: Option<T>,
    messages: Option<Vec<BrokerMessage>>,
    responsetime: Option<DateTime<Utc>>,
}

/// A successfully decoded broker response.
#[derive(Debug)]
pub struct Decoded<T> {
    pub data: T,
    pub responsetime: Option<DateTime<Utc>>,
}

/// Decodes the broker envelope `{status, data, messages?, responsetime}`.
///
/// This is the single point where raw broker JSON becomes typed values:
/// `status != 0` is mapped through the error taxonomy using the first
/// `message_code`, so nothing beyond this function ever sees the raw shape.
pub fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<Decoded<T>, GatewayError> {
    let raw: RawEnvelope<T> = serde_json::from_str(body)?;

    if raw.status != 0 {
        return Err(map_failure(raw.status, raw.messages.unwrap_or_default()));
    }

    let data = raw.data.ok_or_else(|| {
        GatewayError::Transport("broker success envelope missing data field".to_string())
    })?;

    Ok(Decoded {
        data,
        responsetime: raw.responsetime,
    })
}

/// Decodes an envelope whose success form carries no `data` (e.g. ws-auth
/// extend/delete).
pub fn decode_empty_envelope(body: &str) -> Result<Option<DateTime<Utc>>, GatewayError> {
    let raw: RawEnvelope<serde_json::Value> = serde_json::from_str(body)?;
    if raw.status != 0 {
        return Err(map_failure(raw.status, raw.messages.unwrap_or_default()));
    }
    Ok(raw.responsetime)
}

fn map_failure(status: i64, messages: Vec<BrokerMessage>) -> GatewayError {
    match messages.first() {
        Some(msg) => GatewayError::from_broker_code(&msg.code, &msg.text),
        None => GatewayError::Transport(format!(
            "broker returned status {status} with no error messages"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct StatusData {
        status: String,
    }

    #[test]
    fn test_decode_success_envelope() {
        let body = r#"{
            "status": 0,
            "data": {"status": "OPEN"},
            "responsetime": "2019-03-19T02:15:06.001Z"
        }"#;
        let decoded: Decoded<StatusData> = decode_envelope(body).unwrap();
        assert_eq!(decoded.data.status, "OPEN");
        assert!(decoded.responsetime.is_some());
    }

    #[test]
    fn test_decode_failure_maps_code() {
        let body = r#"{
            "status": 1,
            "messages": [{"message_code": "ERR-5003", "message_string": "Requests are too many."}],
            "responsetime": "2019-03-19T02:15:06.001Z"
        }"#;
        let err = decode_envelope::<StatusData>(body).unwrap_err();
        assert!(matches!(err, GatewayError::RateLimited { .. }));
    }

    #[test]
    fn test_decode_auth_failure() {
        let body = r#"{
            "status": 1,
            "messages": [{"message_code": "ERR-5011", "message_string": "Invalid API-SIGN."}]
        }"#;
        let err = decode_envelope::<StatusData>(body).unwrap_err();
        assert!(matches!(err, GatewayError::Auth { .. }));
    }

    #[test]
    fn test_decode_garbage_is_transport_error() {
        let err = decode_envelope::<StatusData>("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }

    #[test]
    fn test_success_without_data_is_transport_error() {
        let err = decode_envelope::<StatusData>(r#"{"status": 0}"#).unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }

    #[test]
    fn test_empty_envelope_success() {
        let rt = decode_empty_envelope(
            r#"{"status": 0, "responsetime": "2019-03-19T02:15:06.001Z"}"#,
        )
        .unwrap();
        assert!(rt.is_some());
    }
}
