//! Google OAuth for Ads, Analytics, Tag Manager and YouTube.
//!
//! State lives only in short-lived cookies set by the start route and
//! cleared by the callback.

mod handlers;
pub mod pkce;

use std::fmt;

use axum::http::{header, HeaderValue};
use axum::response::Response;

pub use handlers::{oauth_callback, oauth_start};

/// `provider` value under which Google tokens are stored.
pub const TOKEN_PROVIDER: &str = "google";

pub const STATE_COOKIE: &str = "oauth_state";
pub const VERIFIER_COOKIE: &str = "oauth_code_verifier";
pub const REDIRECT_COOKIE: &str = "oauth_redirect";

/// Lifetime of the state cookies.
pub const FLOW_COOKIE_MAX_AGE_SECS: i64 = 10 * 60;

/// Stored refresh tokens outlive the access token by far.
pub const REFRESH_COOKIE_MAX_AGE_SECS: i64 = 30 * 24 * 60 * 60;

pub const SCOPES: [&str; 6] = [
    "https://www.googleapis.com/auth/adwords",
    "https://www.googleapis.com/auth/analytics.readonly",
    "https://www.googleapis.com/auth/tagmanager.readonly",
    "https://www.googleapis.com/auth/youtube.readonly",
    "openid",
    "email",
];

/// Google product a consent flow was started for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoogleService {
    Ads,
    Analytics,
    TagManager,
    YouTube,
}

impl GoogleService {
    /// Infer the service from the page that started the flow.
    pub fn from_redirect(path: &str) -> Self {
        let path = path.to_ascii_lowercase();
        if path.contains("analytics") {
            GoogleService::Analytics
        } else if path.contains("tag-manager") || path.contains("gtm") {
            GoogleService::TagManager
        } else if path.contains("youtube") {
            GoogleService::YouTube
        } else {
            GoogleService::Ads
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GoogleService::Ads => "google-ads",
            GoogleService::Analytics => "google-analytics",
            GoogleService::TagManager => "google-tag-manager",
            GoogleService::YouTube => "youtube",
        }
    }

    pub fn cookie_prefix(&self) -> &'static str {
        match self {
            GoogleService::Ads => "google_ads",
            GoogleService::Analytics => "google_analytics",
            GoogleService::TagManager => "google_tag_manager",
            GoogleService::YouTube => "youtube",
        }
    }
}

impl fmt::Display for GoogleService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keep post-login redirects on this site.
pub fn sanitize_redirect(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

/// Append one `Set-Cookie` header per cookie.
pub(crate) fn append_cookies(response: &mut Response, cookies: &[String]) {
    for cookie in cookies {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!("Dropping unencodable cookie: {}", e),
        }
    }
}
