//! REST transport
//!
//! [ReqwestTransport] owns the per-environment base URL, authentication and
//! the retry policy: 429 and 5xx responses are retried with exponential
//! backoff and jitter (honoring `Retry-After`), everything else is returned
//! to the caller as a final response. Logical rejections are mapped to
//! [ClientError::Api] by [RestResponse::expect_success].

use crate::auth::Auth;
use crate::errors::{ClientError, ClientResult};
use async_trait::async_trait;
use rand::Rng;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const MAX_ATTEMPTS: u32 = 5;
const BACKOFF_BASE: Duration = Duration::from_millis(400);
const BACKOFF_CAP: Duration = Duration::from_secs(5);

/// One request against the tenant
#[derive(Debug, Clone)]
pub struct RestRequest {
    pub method: Method,
    /// Path below the environment base URL, starting with `/`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RestRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::PUT,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Final response of one request, after any transport-level retries
#[derive(Debug, Clone)]
pub struct RestResponse {
    pub status: u16,
    pub body: Vec<u8>,
    /// Server-side correlation id, carried into error messages
    pub correlation_id: Option<String>,
}

impl RestResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    pub fn json<T: DeserializeOwned>(&self) -> ClientResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Map a non-2xx response to the logical [ClientError::Api].
    pub fn expect_success(self) -> ClientResult<RestResponse> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ClientError::Api {
                status: self.status,
                message: self.text(),
                correlation_id: self.correlation_id,
            })
        }
    }
}

/// Sends requests against one environment.
///
/// Implementations retry retryable server responses internally; the response
/// handed back is always final.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: RestRequest) -> ClientResult<RestResponse>;
}

/// reqwest-backed transport with auth, retries and per-request deadlines
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    auth: Auth,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, auth: Auth, timeout: Duration) -> ClientResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    fn is_retryable(status: reqwest::StatusCode) -> bool {
        status.as_u16() == 429 || status.is_server_error()
    }

    fn retry_delay(attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(after) = retry_after {
            return after.min(BACKOFF_CAP);
        }
        let backoff = BACKOFF_BASE
            .checked_mul(1 << attempt.min(4))
            .unwrap_or(BACKOFF_CAP)
            .min(BACKOFF_CAP);
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..200));
        backoff + jitter
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: RestRequest) -> ClientResult<RestResponse> {
        let url = format!("{}{}", self.base_url, request.path);

        let mut attempt = 0;
        loop {
            let authorization = self.auth.authorization_header().await?;
            let mut builder = self
                .client
                .request(request.method.clone(), &url)
                .header("Authorization", authorization);
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await?;
            let status = response.status();

            if Self::is_retryable(status) {
                attempt += 1;
                if attempt < MAX_ATTEMPTS {
                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .map(Duration::from_secs);
                    let delay = Self::retry_delay(attempt, retry_after);
                    warn!(
                        %url,
                        status = status.as_u16(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying request after server response"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                let message = response.text().await.unwrap_or_default();
                return Err(ClientError::RetriesExhausted {
                    url,
                    attempts: attempt,
                    status: status.as_u16(),
                    message,
                });
            }

            let correlation_id = response
                .headers()
                .get("x-trackingid")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            debug!(%url, status = status.as_u16(), "Request finished");

            let body = response.bytes().await?.to_vec();
            return Ok(RestResponse {
                status: status.as_u16(),
                body,
                correlation_id,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ReqwestTransport::is_retryable(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(ReqwestTransport::is_retryable(reqwest::StatusCode::BAD_GATEWAY));
        assert!(!ReqwestTransport::is_retryable(reqwest::StatusCode::BAD_REQUEST));
        assert!(!ReqwestTransport::is_retryable(reqwest::StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_retry_after_header_wins_over_backoff() {
        let delay = ReqwestTransport::retry_delay(1, Some(Duration::from_secs(2)));
        assert_eq!(delay, Duration::from_secs(2));
    }

    #[test]
    fn test_backoff_is_capped() {
        for attempt in 0..10 {
            let delay = ReqwestTransport::retry_delay(attempt, None);
            assert!(delay <= BACKOFF_CAP + Duration::from_millis(200));
        }
    }

    #[test]
    fn test_expect_success_maps_logical_errors() {
        let response = RestResponse {
            status: 400,
            body: b"bad scope".to_vec(),
            correlation_id: Some("abc-123".into()),
        };
        let err = response.expect_success().unwrap_err();
        assert!(err.is_logical());
        assert_eq!(err.status(), Some(400));
        assert!(err.to_string().contains("abc-123"));
    }
}
