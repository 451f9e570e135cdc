use std::path::PathBuf;
use std::time::Duration;

use crate::error::{McError, Result};

pub const DEFAULT_API_BASE: &str = "https://googleads.googleapis.com";
pub const DEFAULT_API_VERSION: &str = "v20";
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Settings for talking to the Google Ads API as the manager account.
#[derive(Debug, Clone)]
pub struct McConfig {
    /// Scheme and host of the Google Ads REST API
    pub api_base: String,
    pub api_version: String,
    pub developer_token: String,
    /// Manager (MCC) customer ID, sent as `login-customer-id`
    pub login_customer_id: String,
    pub client_id: String,
    pub client_secret: String,
    /// Long-lived refresh token of the manager account
    pub refresh_token: String,
    pub token_endpoint: String,
    pub request_timeout: Duration,
    /// Optional TOML file extending the built-in geo/language catalog
    pub catalog_path: Option<PathBuf>,
}

impl McConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `GOOGLE_ADS_DEVELOPER_TOKEN`
    /// - `GOOGLE_ADS_MCC_ID`
    /// - `GOOGLE_ADS_REFRESH_TOKEN`
    /// - `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET`
    pub fn from_env() -> Result<Self> {
        let required = |name: &str| {
            std::env::var(name).map_err(|_| McError::Config(format!("{} must be set", name)))
        };

        let timeout_secs = std::env::var("GOOGLE_ADS_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(15);

        Ok(Self {
            api_base: std::env::var("GOOGLE_ADS_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            api_version: std::env::var("GOOGLE_ADS_API_VERSION")
                .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string()),
            developer_token: required("GOOGLE_ADS_DEVELOPER_TOKEN")?,
            login_customer_id: shared_types::canonical_customer_id(&required(
                "GOOGLE_ADS_MCC_ID",
            )?),
            client_id: required("GOOGLE_CLIENT_ID")?,
            client_secret: required("GOOGLE_CLIENT_SECRET")?,
            refresh_token: required("GOOGLE_ADS_REFRESH_TOKEN")?,
            token_endpoint: std::env::var("GOOGLE_TOKEN_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_TOKEN_ENDPOINT.to_string()),
            request_timeout: Duration::from_secs(timeout_secs),
            catalog_path: std::env::var("ADS_CATALOG_PATH").ok().map(PathBuf::from),
        })
    }
}
