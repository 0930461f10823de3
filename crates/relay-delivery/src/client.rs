//! HTTP transport for workflow deliveries.
//!
//! Owns everything per-call: timeout, redirects, TLS, retries. Responses are
//! classified by status code alone; the body is never read, so a slow or
//! oversized response cannot stall or bloat the dispatcher.

use std::{collections::HashMap, fmt, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use url::Url;

use crate::{
    error::{DeliveryError, Result},
    retry::{RetryDecision, RetryPolicy},
};

/// Configuration for the HTTP transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Timeout for one HTTP attempt.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
    /// Maximum number of redirects to follow.
    pub max_redirects: u32,
    /// Whether to verify TLS certificates.
    pub verify_tls: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(crate::DEFAULT_TIMEOUT_SECONDS),
            user_agent: format!("relay/{}", env!("CARGO_PKG_VERSION")),
            max_redirects: 3,
            verify_tls: true,
        }
    }
}

/// One outbound POST.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Destination endpoint.
    pub url: Url,
    /// Extra request headers.
    pub headers: HashMap<String, String>,
    /// Request body, sent verbatim.
    pub body: Bytes,
    /// Declared content type of the body.
    pub content_type: String,
}

/// Successful delivery metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResponse {
    /// HTTP status code (2xx).
    pub status_code: u16,
    /// Attempts it took, including the successful one.
    pub attempts: u32,
    /// Time from first attempt to final response.
    pub duration: Duration,
}

/// Sends one delivery to one endpoint.
///
/// Implementations own timeout and retry behavior. A returned error is
/// final for this delivery.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// POSTs the request and classifies the response.
    async fn post(&self, request: TransportRequest) -> Result<DeliveryResponse>;
}

/// reqwest-backed transport with per-call timeout and retries.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
    retry_policy: RetryPolicy,
}

impl HttpTransport {
    /// Creates a transport with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::ConfigurationError` if the HTTP client cannot
    /// be configured with the provided settings.
    pub fn new(config: ClientConfig, retry_policy: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects as usize))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| {
                DeliveryError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, config, retry_policy })
    }

    /// Creates a transport with default configuration and retry policy.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ClientConfig::default(), RetryPolicy::default())
    }

    /// Sends a single attempt.
    async fn attempt(&self, request: &TransportRequest) -> Result<u16> {
        let mut http_request = self
            .client
            .post(request.url.clone())
            .header(CONTENT_TYPE, &request.content_type)
            .body(request.body.clone());

        for (key, value) in &request.headers {
            if !is_managed_header(key) {
                http_request = http_request.header(key, value);
            }
        }

        let response = match http_request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                let timeout_ms = u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX);
                return Err(DeliveryError::timeout(timeout_ms));
            },
            Err(e) if e.is_connect() => {
                return Err(DeliveryError::network(format!("connection failed: {e}")));
            },
            Err(e) => return Err(DeliveryError::network(e.to_string())),
        };

        let status = response.status();
        if status.is_success() {
            return Ok(status.as_u16());
        }

        let retry_after = extract_retry_after_seconds(response.headers());
        Err(DeliveryError::from_status(status.as_u16(), retry_after))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, request: TransportRequest) -> Result<DeliveryResponse> {
        let started = Instant::now();
        let mut attempt_number = 1;

        loop {
            tracing::debug!(attempt = attempt_number, "sending delivery attempt");

            let error = match self.attempt(&request).await {
                Ok(status_code) => {
                    return Ok(DeliveryResponse {
                        status_code,
                        attempts: attempt_number,
                        duration: started.elapsed(),
                    });
                },
                Err(error) => error,
            };

            tracing::warn!(attempt = attempt_number, error = %error, "delivery attempt failed");

            match self.retry_policy.decide(attempt_number, &error) {
                RetryDecision::Retry { delay } => {
                    tokio::time::sleep(delay).await;
                    attempt_number += 1;
                },
                RetryDecision::GiveUp { reason } => {
                    tracing::debug!(attempt = attempt_number, %reason, "giving up on delivery");
                    if attempt_number > 1 {
                        return Err(DeliveryError::retries_exhausted(attempt_number, error));
                    }
                    return Err(error);
                },
            }
        }
    }
}

/// Headers the transport sets itself and callers may not override.
fn is_managed_header(header_name: &str) -> bool {
    let lowercase = header_name.to_lowercase();
    matches!(
        lowercase.as_str(),
        "content-length"
            | "content-type"
            | "host"
            | "user-agent"
            | "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Extracts a Retry-After delay in seconds.
///
/// Supports both the seconds form and the HTTP-date form; returns `None`
/// when the header is missing or unparseable.
pub fn extract_retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    let retry_after = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = retry_after.parse::<u64>() {
        return Some(seconds);
    }

    let date_time = chrono::DateTime::parse_from_rfc2822(retry_after).ok()?;
    let wait = date_time.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(wait.to_std().map(|d| d.as_secs()).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_request(url: &str) -> TransportRequest {
        let mut headers = HashMap::new();
        headers.insert("X-Signature".to_string(), "abc123".to_string());

        TransportRequest {
            url: Url::parse(url).unwrap(),
            headers,
            body: Bytes::from_static(br#"{"event":"x"}"#),
            content_type: "application/json".to_string(),
        }
    }

    fn fast_retries(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter_factor: 0.0,
            ..RetryPolicy::default()
        }
    }

    fn transport(max_retries: u32) -> HttpTransport {
        let config = ClientConfig { timeout: Duration::from_millis(500), ..Default::default() };
        HttpTransport::new(config, fast_retries(max_retries)).unwrap()
    }

    #[tokio::test]
    async fn successful_delivery() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .and(matchers::path("/workflow"))
            .and(matchers::header("content-type", "application/json"))
            .and(matchers::header("X-Signature", "abc123"))
            .and(matchers::body_string(r#"{"event":"x"}"#))
            .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let response = transport(0)
            .post(test_request(&format!("{}/workflow", mock_server.uri())))
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.attempts, 1);
    }

    #[tokio::test]
    async fn non_json_success_body_is_ignored() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/json")
                    .set_body_string("I lied, this is not JSON"),
            )
            .mount(&mock_server)
            .await;

        let response = transport(0).post(test_request(&mock_server.uri())).await.unwrap();
        assert_eq!(response.status_code, 200);
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let error = transport(3).post(test_request(&mock_server.uri())).await.unwrap_err();

        assert!(matches!(error, DeliveryError::ClientError { status_code: 404 }));
        assert_eq!(error.attempts(), 1);
    }

    #[tokio::test]
    async fn server_error_retried_until_exhausted() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&mock_server)
            .await;

        let error = transport(2).post(test_request(&mock_server.uri())).await.unwrap_err();

        assert_eq!(error.attempts(), 3);
        assert_eq!(error.status_code(), Some(503));
    }

    #[tokio::test]
    async fn server_error_recovers_on_retry() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&mock_server)
            .await;

        let response = transport(2).post(test_request(&mock_server.uri())).await.unwrap();

        assert_eq!(response.status_code, 202);
        assert_eq!(response.attempts, 2);
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&mock_server)
            .await;

        let error = transport(0).post(test_request(&mock_server.uri())).await.unwrap_err();
        assert!(matches!(error, DeliveryError::Timeout { timeout_ms: 500 }));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        // Port 9 (discard) is not listening on test hosts.
        let error = transport(0).post(test_request("http://127.0.0.1:9/")).await.unwrap_err();
        assert!(matches!(error, DeliveryError::NetworkError { .. }));
    }

    #[test]
    fn retry_after_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_retry_after_seconds(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("120"));
        assert_eq!(extract_retry_after_seconds(&headers), Some(120));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(extract_retry_after_seconds(&headers), Some(0));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(extract_retry_after_seconds(&headers), None);
    }

    #[test]
    fn managed_headers_identified() {
        assert!(is_managed_header("Content-Length"));
        assert!(is_managed_header("content-type"));
        assert!(is_managed_header("Host"));
        assert!(is_managed_header("USER-AGENT"));

        assert!(!is_managed_header("X-Signature"));
        assert!(!is_managed_header("Authorization"));
    }
}
