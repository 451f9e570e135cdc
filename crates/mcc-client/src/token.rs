//! Access-token cache for the manager account.
//!
//! One refresh-token exchange serves every request until the access token
//! is about to expire.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::{McError, Result};

/// Tokens closer than this to expiry are treated as expired.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        self.expires_at > Instant::now() + EXPIRY_MARGIN
    }
}

pub struct TokenCache {
    http: reqwest::Client,
    endpoint: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    current: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
            current: Mutex::new(None),
        }
    }

    /// Return a valid access token, exchanging the refresh token only when
    /// the cached one is missing or about to expire.
    ///
    /// The lock is held across the exchange so concurrent callers that
    /// observe the same expiry share one refresh.
    pub async fn access_token(&self) -> Result<String> {
        let mut current = self.current.lock().await;

        if let Some(token) = current.as_ref() {
            if token.is_fresh() {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.exchange().await?;
        let access_token = fresh.access_token.clone();
        *current = Some(fresh);

        Ok(access_token)
    }

    /// Drop the cached token, forcing the next call to refresh.
    pub async fn invalidate(&self) {
        *self.current.lock().await = None;
    }

    async fn exchange(&self) -> Result<CachedToken> {
        tracing::debug!("Exchanging refresh token for a new access token");

        let response = self
            .http
            .post(&self.endpoint)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {}", err.error, description),
                    None => err.error,
                },
                Err(_) => format!("{} - {}", status, body),
            };
            tracing::error!("Token exchange failed: {}", message);
            return Err(McError::Token(message));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| McError::Token(format!("Invalid token response: {}", e)))?;

        Ok(CachedToken {
            access_token: tokens.access_token,
            expires_at: Instant::now() + Duration::from_secs(tokens.expires_in),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cache_for(server: &MockServer) -> TokenCache {
        TokenCache::new(
            reqwest::Client::new(),
            format!("{}/token", server.uri()),
            "client-id",
            "client-secret",
            "refresh-token",
        )
    }

    #[tokio::test]
    async fn test_reuses_token_within_validity() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.cached",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cache = cache_for(&server);
        assert_eq!(cache.access_token().await.unwrap(), "ya29.cached");
        assert_eq!(cache.access_token().await.unwrap(), "ya29.cached");
    }

    #[tokio::test]
    async fn test_refreshes_when_token_expires_inside_margin() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.short",
                "expires_in": 30
            })))
            .expect(2)
            .mount(&server)
            .await;

        let cache = cache_for(&server);
        cache.access_token().await.unwrap();
        cache.access_token().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalidate_forces_exchange() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.again",
                "expires_in": 3599
            })))
            .expect(2)
            .mount(&server)
            .await;

        let cache = cache_for(&server);
        cache.access_token().await.unwrap();
        cache.invalidate().await;
        cache.access_token().await.unwrap();
    }

    #[tokio::test]
    async fn test_error_response_maps_to_token_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })))
            .mount(&server)
            .await;

        let err = cache_for(&server).access_token().await.unwrap_err();
        match err {
            McError::Token(message) => assert!(message.starts_with("invalid_grant")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
