//! Authentication for tenant requests
//!
//! Classic and settings APIs take an API token; platform APIs take an OAuth2
//! client-credentials bearer token, fetched lazily and cached until shortly
//! before expiry.

use crate::errors::{ClientError, ClientResult};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Default SSO token endpoint used when the manifest does not override it.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://sso.dynatrace.com/sso/oauth2/token";

/// Tokens are refreshed this long before their reported expiry.
const EXPIRY_SLACK: Duration = Duration::from_secs(60);

/// OAuth client-credentials configuration
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_endpoint: Option<String>,
}

/// Authentication method of one transport
pub enum Auth {
    /// `Authorization: Api-Token <token>`
    Token(String),
    /// `Authorization: Bearer <token>` from client-credentials
    OAuth(OAuthTokenSource),
}

impl Auth {
    pub fn oauth(config: OAuthConfig) -> ClientResult<Self> {
        Ok(Auth::OAuth(OAuthTokenSource::new(config)?))
    }

    /// Value for the `Authorization` header.
    pub async fn authorization_header(&self) -> ClientResult<String> {
        match self {
            Auth::Token(token) => Ok(format!("Api-Token {token}")),
            Auth::OAuth(source) => Ok(format!("Bearer {}", source.bearer_token().await?)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Lazily fetched, cached OAuth2 client-credentials token
pub struct OAuthTokenSource {
    http: reqwest::Client,
    config: OAuthConfig,
    cached: Mutex<Option<CachedToken>>,
}

impl OAuthTokenSource {
    pub fn new(config: OAuthConfig) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            config,
            cached: Mutex::new(None),
        })
    }

    async fn bearer_token(&self) -> ClientResult<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.access_token.clone());
            }
        }

        let endpoint = self
            .config
            .token_endpoint
            .as_deref()
            .unwrap_or(DEFAULT_TOKEN_ENDPOINT);
        debug!(endpoint, "Requesting OAuth access token");

        let response = self
            .http
            .post(endpoint)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ClientError::OAuth(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::OAuth(format!("{status}: {body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ClientError::OAuth(e.to_string()))?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(300));
        let expires_at = Instant::now() + lifetime.saturating_sub(EXPIRY_SLACK);
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at,
        });

        Ok(token.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_auth_builds_api_token_header() {
        let auth = Auth::Token("dt0c01.secret".to_string());
        let header = auth.authorization_header().await.unwrap();
        assert_eq!(header, "Api-Token dt0c01.secret");
    }
}
