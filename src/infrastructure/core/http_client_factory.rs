use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Duration;

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// HTTP client for the public read path: transient failures (connect
    /// errors, 5xx) are retried by middleware up to 3 times.
    pub fn public_client(timeout: Duration) -> ClientWithMiddleware {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

        ClientBuilder::new(Self::base_client(timeout))
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    }

    /// HTTP client for the private path. No retry middleware: every private
    /// attempt must be re-signed with a fresh timestamp, so the caller owns
    /// the retry loop.
    pub fn private_client(timeout: Duration) -> Client {
        Self::base_client(timeout)
    }

    fn base_client(timeout: Duration) -> Client {
        Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new())
    }
}

/// Helper function to build a URL with query parameters.
/// reqwest-middleware does not expose the `.query()` builder, so the query
/// string is assembled manually and appended to the URL.
pub fn build_url_with_query<K, V>(base_url: &str, params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    if params.is_empty() {
        return base_url.to_string();
    }

    let query_string: String = params
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                urlencoding_encode(k.as_ref()),
                urlencoding_encode(v.as_ref())
            )
        })
        .collect::<Vec<_>>()
        .join("&");

    if base_url.contains('?') {
        format!("{}&{}", base_url, query_string)
    } else {
        format!("{}?{}", base_url, query_string)
    }
}

/// Simple URL encoding function for query parameter values.
fn urlencoding_encode(s: &str) -> String {
    let mut encoded = String::new();
    for c in s.chars() {
        match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => {
                encoded.push(c);
            }
            _ => {
                for byte in c.to_string().as_bytes() {
                    encoded.push_str(&format!("%{:02X}", byte));
                }
            }
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_with_query() {
        let url = build_url_with_query(
            "https://forex-api.coin.z.com/public/v1/klines",
            &[
                ("symbol", "USD_JPY"),
                ("priceType", "ASK"),
                ("interval", "15min"),
                ("date", "20240110"),
            ],
        );
        assert_eq!(
            url,
            "https://forex-api.coin.z.com/public/v1/klines?symbol=USD_JPY&priceType=ASK&interval=15min&date=20240110"
        );
    }

    #[test]
    fn test_build_url_without_params() {
        let empty: [(&str, &str); 0] = [];
        assert_eq!(
            build_url_with_query("https://example.com/v1/status", &empty),
            "https://example.com/v1/status"
        );
    }
}
