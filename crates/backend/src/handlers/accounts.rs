use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared_types::{
    AccountLinkStatus, ClientRequestResponse, CreateSubAccountRequest, LinkAccountRequest,
    LinkDetails, StatusSource,
};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Map Google's `CustomerStatus` onto a link status.
fn link_status_for(customer_status: Option<&str>) -> AccountLinkStatus {
    match customer_status.unwrap_or_default() {
        "ENABLED" => AccountLinkStatus::Enabled,
        "CANCELED" | "CANCELLED" | "CLOSED" => AccountLinkStatus::Cancelled,
        "SUSPENDED" => AccountLinkStatus::Suspended,
        _ => AccountLinkStatus::RefreshNeeded,
    }
}

pub async fn list_accounts(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<ClientRequestResponse>>> {
    let rows = state.store.list_links(&user.user_id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Create a sub-account under the manager account and record it for the
/// caller.
pub async fn create_account(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateSubAccountRequest>,
) -> ApiResult<(StatusCode, Json<ClientRequestResponse>)> {
    let account = state
        .mcc
        .create_sub_account(
            &payload.descriptive_name,
            &payload.currency_code,
            &payload.time_zone,
        )
        .await?;

    let details = LinkDetails {
        descriptive_name: Some(payload.descriptive_name.trim().to_string()),
        currency_code: Some(payload.currency_code.to_uppercase()),
        time_zone: Some(payload.time_zone),
        manager: Some(false),
        link_resource_name: None,
    };

    let row = state
        .store
        .upsert_link(
            &user.user_id,
            &account.customer_id,
            AccountLinkStatus::Active,
            &details,
            StatusSource::Mcc,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(row.into())))
}

/// Invite an existing customer account; the link stays pending until the
/// customer accepts it in Google Ads.
pub async fn link_account(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<LinkAccountRequest>,
) -> ApiResult<(StatusCode, Json<ClientRequestResponse>)> {
    let link_resource_name = state.mcc.link_existing_account(&payload.customer_id).await?;

    let details = LinkDetails {
        link_resource_name: Some(link_resource_name),
        ..LinkDetails::default()
    };

    let row = state
        .store
        .upsert_link(
            &user.user_id,
            &payload.customer_id,
            AccountLinkStatus::Pending,
            &details,
            StatusSource::Mcc,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(row.into())))
}

/// Read the customer's live status from Google Ads and store it. The link
/// resource name from an earlier invitation is kept.
pub async fn get_account_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(customer_id): Path<String>,
) -> ApiResult<Json<ClientRequestResponse>> {
    if !state
        .store
        .user_has_customer(&user.user_id, &customer_id)
        .await?
    {
        return Err(ApiError::not_found(format!("Account {}", customer_id)));
    }

    let info = state.mcc.customer_status(&customer_id).await?;
    let status = link_status_for(info.status.as_deref());

    let details = LinkDetails {
        descriptive_name: info.descriptive_name,
        currency_code: info.currency_code,
        time_zone: info.time_zone,
        manager: Some(info.manager),
        link_resource_name: None,
    };

    let row = state
        .store
        .upsert_link(
            &user.user_id,
            &customer_id,
            status,
            &details,
            StatusSource::Mcc,
        )
        .await?;

    Ok(Json(row.into()))
}
