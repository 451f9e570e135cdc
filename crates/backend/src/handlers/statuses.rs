//! Pull side of `/api/google-ads/batch-refresh-statuses`.

use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use shared_types::{
    display_customer_id, AccountLinkStatus, BatchRefreshResponse, ClientRequestResponse,
    StatusSource,
};

use crate::auth::{read_cookie, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::oauth::TOKEN_PROVIDER;
use crate::AppState;

const BATCH_SYNC_TIMEOUT: Duration = Duration::from_secs(15);

/// Refresh-token cookies checked in order, before the token stored at
/// consent time.
const REFRESH_COOKIES: [&str; 2] = ["google_ads_refresh_token", "google_refresh_token"];

#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    #[serde(default, rename = "forceRefresh")]
    pub force_refresh: bool,
}

#[derive(Debug, Serialize)]
struct BatchSyncRequest<'a> {
    refresh_token: &'a str,
    customer_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BatchSyncResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    accounts: Vec<BatchSyncAccount>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BatchSyncAccount {
    customer_id: String,
    status: String,
}

async fn cached_links(state: &AppState, user_id: &str) -> ApiResult<Vec<ClientRequestResponse>> {
    let rows = state.store.list_links(user_id).await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

async fn call_batch_sync(
    state: &AppState,
    url: &str,
    refresh_token: &str,
    customer_ids: Vec<String>,
) -> ApiResult<Vec<BatchSyncAccount>> {
    let response = state
        .http
        .post(url)
        .timeout(BATCH_SYNC_TIMEOUT)
        .json(&BatchSyncRequest {
            refresh_token,
            customer_ids,
        })
        .send()
        .await
        .map_err(|e| ApiError::Upstream(format!("Batch sync request failed: {}", e)))?;

    let status = response.status();
    let body: BatchSyncResponse = response
        .json()
        .await
        .map_err(|e| ApiError::Upstream(format!("Batch sync returned invalid JSON: {}", e)))?;

    if !status.is_success() || !body.success {
        return Err(ApiError::Upstream(body.error.unwrap_or_else(|| {
            format!("Batch sync failed with status {}", status.as_u16())
        })));
    }

    Ok(body.accounts)
}

/// Return the caller's link records, optionally refreshing them first.
pub async fn batch_refresh_statuses(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<RefreshQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<BatchRefreshResponse>> {
    if !query.force_refresh {
        return Ok(Json(BatchRefreshResponse {
            success: true,
            refreshed: false,
            accounts: cached_links(&state, &user.user_id).await?,
        }));
    }

    let cookie_token = REFRESH_COOKIES
        .iter()
        .find_map(|name| read_cookie(&headers, name));
    let refresh_token = match cookie_token {
        Some(token) => token,
        None => state
            .store
            .stored_refresh_token(&user.user_id, TOKEN_PROVIDER)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Google Ads is not connected"))?,
    };

    let url = state
        .config
        .batch_sync_url
        .as_deref()
        .ok_or_else(|| ApiError::missing_env("BATCH_SYNC_URL"))?;

    let customer_ids = state
        .store
        .list_links(&user.user_id)
        .await?
        .iter()
        .map(|row| display_customer_id(&row.customer_id))
        .collect::<Vec<_>>();

    tracing::info!(
        user_id = %user.user_id,
        count = customer_ids.len(),
        "Refreshing account statuses from batch sync"
    );

    let accounts = call_batch_sync(&state, url, &refresh_token, customer_ids).await?;

    for account in accounts {
        let Some(status) = AccountLinkStatus::from_str(&account.status) else {
            tracing::warn!(
                customer_id = %account.customer_id,
                "Skipping unknown status '{}' from batch sync",
                account.status
            );
            continue;
        };
        state
            .store
            .update_status(
                &account.customer_id,
                Some(&user.user_id),
                status,
                StatusSource::BatchSync,
            )
            .await?;
    }

    Ok(Json(BatchRefreshResponse {
        success: true,
        refreshed: true,
        accounts: cached_links(&state, &user.user_id).await?,
    }))
}
