use anyhow::{Context, Result};
use std::env;

pub const DEFAULT_OAUTH_DOCS_URL: &str =
    "https://developers.google.com/google-ads/api/docs/oauth/overview";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    /// External batch status sync endpoint
    pub batch_sync_url: Option<String>,
    /// Shared secret Pub/Sub pushes must present
    pub pubsub_verification_token: Option<String>,
    /// Guards the internal ledger endpoints (`x-internal-token`)
    pub internal_api_token: Option<String>,
    pub oauth_docs_url: String,
    /// Currency for balances created by a first posting
    pub default_currency: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            batch_sync_url: non_empty_var("BATCH_SYNC_URL"),
            pubsub_verification_token: non_empty_var("PUBSUB_VERIFICATION_TOKEN"),
            internal_api_token: non_empty_var("INTERNAL_API_TOKEN"),
            oauth_docs_url: env::var("OAUTH_DOCS_URL")
                .unwrap_or_else(|_| DEFAULT_OAUTH_DOCS_URL.to_string()),
            default_currency: env::var("DEFAULT_CURRENCY").unwrap_or_else(|_| "USD".to_string()),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// True when `RUST_ENV=production`; cookies get the `Secure` flag.
pub fn is_production() -> bool {
    env::var("RUST_ENV").unwrap_or_default() == "production"
}
