use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared_types::{AccountLinkStatus, StatusSource};

use crate::auth::{
    authenticate, build_auth_cookie, build_cookie, clear_cookie, constant_time_eq, jwt,
    read_cookie,
};
use crate::store::OAuthTokenUpsert;
use crate::AppState;

use super::{
    append_cookies, pkce, sanitize_redirect, GoogleService, FLOW_COOKIE_MAX_AGE_SECS,
    REDIRECT_COOKIE, REFRESH_COOKIE_MAX_AGE_SECS, SCOPES, STATE_COOKIE, TOKEN_PROVIDER,
    VERIFIER_COOKIE,
};

const OAUTH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
pub struct OAuthStartQuery {
    pub redirect: Option<String>,
}

/// Step 1: send the browser to Google's consent screen.
pub async fn oauth_start(
    State(state): State<AppState>,
    Query(query): Query<OAuthStartQuery>,
) -> Response {
    let config = &state.auth_config;
    let redirect = sanitize_redirect(query.redirect.as_deref());
    let verifier = pkce::generate_code_verifier();
    let csrf_state = pkce::generate_state();
    let scope = SCOPES.join(" ");

    let auth_url = format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}\
         &access_type=offline&prompt=consent&include_granted_scopes=true\
         &state={}&code_challenge={}&code_challenge_method=S256",
        config.google_auth_url,
        urlencoding::encode(&config.google_client_id),
        urlencoding::encode(&config.oauth_redirect_uri),
        urlencoding::encode(&scope),
        csrf_state,
        pkce::code_challenge(&verifier),
    );

    tracing::debug!(service = %GoogleService::from_redirect(&redirect), "Starting Google OAuth");

    let mut response = Redirect::to(&auth_url).into_response();
    append_cookies(
        &mut response,
        &[
            build_cookie(STATE_COOKIE, &csrf_state, FLOW_COOKIE_MAX_AGE_SECS),
            build_cookie(VERIFIER_COOKIE, &verifier, FLOW_COOKIE_MAX_AGE_SECS),
            build_cookie(
                REDIRECT_COOKIE,
                &urlencoding::encode(&redirect),
                FLOW_COOKIE_MAX_AGE_SECS,
            ),
        ],
    );
    response
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    code: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    grant_type: &'a str,
    code_verifier: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: String,
}

fn flow_cookies_cleared() -> Vec<String> {
    vec![
        clear_cookie(STATE_COOKIE),
        clear_cookie(VERIFIER_COOKIE),
        clear_cookie(REDIRECT_COOKIE),
    ]
}

fn error_redirect(state: &AppState, message: &str) -> Response {
    tracing::warn!("OAuth callback failed: {}", message);
    let target = format!(
        "/oauth-error?message={}&docs={}",
        urlencoding::encode(message),
        urlencoding::encode(&state.config.oauth_docs_url)
    );
    let mut response = Redirect::to(&target).into_response();
    append_cookies(&mut response, &flow_cookies_cleared());
    response
}

async fn exchange_code(
    state: &AppState,
    code: &str,
    verifier: &str,
) -> anyhow::Result<TokenResponse> {
    let config = &state.auth_config;
    let response = state
        .http
        .post(&config.google_token_url)
        .timeout(OAUTH_TIMEOUT)
        .form(&TokenRequest {
            code,
            client_id: &config.google_client_id,
            client_secret: &config.google_client_secret,
            redirect_uri: &config.oauth_redirect_uri,
            grant_type: "authorization_code",
            code_verifier: verifier,
        })
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("token endpoint returned {}: {}", status.as_u16(), body);
    }

    Ok(response.json().await?)
}

async fn fetch_email(state: &AppState, access_token: &str) -> anyhow::Result<String> {
    let info: UserInfo = state
        .http
        .get(&state.auth_config.google_userinfo_url)
        .timeout(OAUTH_TIMEOUT)
        .bearer_auth(access_token)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(info.email)
}

/// Record customers the new token can reach as linked. Accounts the user
/// already has keep their stored status and details.
async fn discover_ads_accounts(state: &AppState, user_id: &str, access_token: &str) {
    let customers = match state.mcc.list_accessible_customers(access_token).await {
        Ok(customers) => customers,
        Err(e) => {
            tracing::warn!(user_id = %user_id, "Accessible customer discovery failed: {}", e);
            return;
        }
    };

    let mut added = 0;
    for customer_id in &customers {
        match state
            .store
            .insert_link_if_absent(
                user_id,
                customer_id,
                AccountLinkStatus::Linked,
                StatusSource::OAuth,
            )
            .await
        {
            Ok(true) => added += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(customer_id = %customer_id, "Failed to record linked account: {:?}", e)
            }
        }
    }

    tracing::info!(
        user_id = %user_id,
        count = customers.len(),
        added,
        "Discovered Google Ads accounts"
    );
}

fn success_page(service: GoogleService) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Connected</title></head>
<body>
<p>Connected. You can close this window.</p>
<script>
  (function () {{
    var message = {{ type: "oauth-success", service: "{service}" }};
    try {{ new BroadcastChannel("oauth").postMessage(message); }} catch (e) {{}}
    if (window.opener) {{ window.opener.postMessage(message, window.location.origin); }}
    window.close();
  }})();
</script>
</body>
</html>
"#,
        service = service.as_str()
    )
}

/// Step 2: Google redirects back here with an authorization code.
pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<OAuthCallbackParams>,
    headers: HeaderMap,
) -> Response {
    if let Some(error) = params.error.as_deref() {
        return error_redirect(&state, &format!("Google returned an error: {}", error));
    }
    let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) else {
        return error_redirect(&state, "Missing authorization code");
    };

    let expected_state = read_cookie(&headers, STATE_COOKIE);
    let state_matches = match (expected_state.as_deref(), params.state.as_deref()) {
        (Some(expected), Some(actual)) => constant_time_eq(expected.as_bytes(), actual.as_bytes()),
        _ => false,
    };
    if !state_matches {
        return error_redirect(&state, "Invalid OAuth state");
    }

    let Some(verifier) = read_cookie(&headers, VERIFIER_COOKIE) else {
        return error_redirect(&state, "Missing PKCE verifier");
    };

    let redirect = read_cookie(&headers, REDIRECT_COOKIE)
        .and_then(|raw| urlencoding::decode(&raw).ok().map(|s| s.into_owned()))
        .unwrap_or_else(|| "/".to_string());
    let service = GoogleService::from_redirect(&redirect);

    let tokens = match exchange_code(&state, code, &verifier).await {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::error!(service = %service, "Token exchange failed: {:?}", e);
            return error_redirect(&state, "Token exchange failed");
        }
    };

    let (user_id, email) = match authenticate(&headers, &state.auth_config) {
        Ok(user) => (user.user_id, user.email),
        Err(_) => match fetch_email(&state, &tokens.access_token).await {
            Ok(email) => (email.clone(), Some(email)),
            Err(e) => {
                tracing::error!("Userinfo lookup failed: {:?}", e);
                return error_redirect(&state, "Could not identify the Google account");
            }
        },
    };

    let expires_in = tokens.expires_in.unwrap_or(3600);
    if let Err(e) = state
        .store
        .upsert_oauth_token(OAuthTokenUpsert {
            user_id: &user_id,
            provider: TOKEN_PROVIDER,
            access_token: &tokens.access_token,
            refresh_token: tokens.refresh_token.as_deref(),
            expires_at: Some(Utc::now() + chrono::Duration::seconds(expires_in)),
            scope: tokens.scope.as_deref(),
        })
        .await
    {
        tracing::error!(user_id = %user_id, "Failed to store OAuth tokens: {:?}", e);
    }

    if service == GoogleService::Ads {
        discover_ads_accounts(&state, &user_id, &tokens.access_token).await;
    }

    let prefix = service.cookie_prefix();
    let mut cookies = vec![build_cookie(
        &format!("{}_access_token", prefix),
        &tokens.access_token,
        expires_in,
    )];
    if let Some(refresh) = tokens.refresh_token.as_deref() {
        cookies.push(build_cookie(
            &format!("{}_refresh_token", prefix),
            refresh,
            REFRESH_COOKIE_MAX_AGE_SECS,
        ));
    }
    match jwt::create_token(&state.auth_config, &user_id, email) {
        Ok(session) => cookies.push(build_auth_cookie(
            &state.auth_config.cookie_name,
            &session,
            state.auth_config.token_duration_days,
        )),
        Err(e) => tracing::error!("Failed to create session token: {}", e),
    }
    cookies.extend(flow_cookies_cleared());

    tracing::info!(user_id = %user_id, service = %service, "Google OAuth completed");

    let mut response = Html(success_page(service)).into_response();
    append_cookies(&mut response, &cookies);
    response
}
