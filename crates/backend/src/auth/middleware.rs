//! Request authentication for protected routes.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

use crate::config::is_production;
use crate::error::ApiError;
use crate::AppState;

use super::jwt;
use super::types::{AuthConfig, AuthUser, Claims};

/// Protected handlers take `AuthUser` as an argument; the session token is
/// read from the auth cookie first, then from `Authorization: Bearer`.
#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(&parts.headers, &state.auth_config)
    }
}

/// Value of the cookie `name`, if the request carries it.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| cookie::Cookie::parse(pair.trim()).ok())
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}

fn extract_token_from_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|s| s.to_string())
}

/// Extract and validate the session user from request headers.
pub fn authenticate(headers: &HeaderMap, config: &AuthConfig) -> Result<AuthUser, ApiError> {
    let token = read_cookie(headers, &config.cookie_name)
        .or_else(|| extract_token_from_header(headers))
        .ok_or_else(|| ApiError::unauthorized("Missing authentication"))?;

    let claims: Claims = jwt::validate_token(config, &token)
        .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;

    Ok(AuthUser {
        user_id: claims.sub,
        email: claims.email,
    })
}

/// Build a `Set-Cookie` value with the flags every cookie here shares.
pub fn build_cookie(name: &str, value: &str, max_age_secs: i64) -> String {
    let secure = if is_production() { "; Secure" } else { "" };
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        name, value, max_age_secs, secure
    )
}

/// Build an auth cookie string.
pub fn build_auth_cookie(name: &str, value: &str, days: i64) -> String {
    build_cookie(name, value, days * 24 * 60 * 60)
}

pub fn clear_cookie(name: &str) -> String {
    build_cookie(name, "", 0)
}

/// Compare shared secrets without short-circuiting on the first mismatch.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}
