//! Auth-related types and configuration.

use serde::{Deserialize, Serialize};

pub use shared_types::AuthUserResponse;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (local user ID)
    pub sub: String,
    /// Google account email, when known
    pub email: Option<String>,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

/// Validated user from JWT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
}

/// Auth configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_duration_days: i64,
    pub cookie_name: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub oauth_redirect_uri: String,
    pub google_auth_url: String,
    pub google_token_url: String,
    pub google_userinfo_url: String,
}

impl AuthConfig {
    /// Load auth configuration from environment variables.
    ///
    /// Required env vars:
    /// - `JWT_SECRET`: Secret key for signing JWTs
    /// - `GOOGLE_CLIENT_ID`: Google OAuth client ID
    /// - `GOOGLE_CLIENT_SECRET`: Google OAuth client secret
    /// - `OAUTH_REDIRECT_URI`: OAuth callback URI
    pub fn from_env() -> Result<Self, String> {
        let jwt_secret =
            std::env::var("JWT_SECRET").map_err(|_| "JWT_SECRET must be set".to_string())?;

        Ok(Self {
            jwt_secret,
            token_duration_days: 7,
            cookie_name: "auth_token".to_string(),
            google_client_id: std::env::var("GOOGLE_CLIENT_ID")
                .map_err(|_| "GOOGLE_CLIENT_ID must be set".to_string())?,
            google_client_secret: std::env::var("GOOGLE_CLIENT_SECRET")
                .map_err(|_| "GOOGLE_CLIENT_SECRET must be set".to_string())?,
            oauth_redirect_uri: std::env::var("OAUTH_REDIRECT_URI")
                .map_err(|_| "OAUTH_REDIRECT_URI must be set".to_string())?,
            google_auth_url: GOOGLE_AUTH_URL.to_string(),
            google_token_url: std::env::var("GOOGLE_TOKEN_ENDPOINT")
                .unwrap_or_else(|_| GOOGLE_TOKEN_URL.to_string()),
            google_userinfo_url: GOOGLE_USERINFO_URL.to_string(),
        })
    }
}
