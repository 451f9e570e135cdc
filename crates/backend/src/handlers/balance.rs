//! Furriyadh balance endpoints.
//!
//! Reads are per session user. Postings come from the payment and spend
//! reconciliation jobs and are guarded by a shared internal token.

use axum::{extract::State, http::HeaderMap, Json};
use shared_types::{BalanceResponse, LedgerEntryRequest};

use crate::auth::{constant_time_eq, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::ledger::{Ledger, LedgerError};
use crate::AppState;

pub const INTERNAL_TOKEN_HEADER: &str = "x-internal-token";

fn require_internal_token(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    let expected = state
        .config
        .internal_api_token
        .as_deref()
        .ok_or_else(|| ApiError::missing_env("INTERNAL_API_TOKEN"))?;

    let presented = headers
        .get(INTERNAL_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing internal token"))?;

    if !constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
        return Err(ApiError::unauthorized("Invalid internal token"));
    }
    Ok(())
}

pub async fn get_balance(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<BalanceResponse>> {
    let response = match state.store.get_balance(&user.user_id).await? {
        Some(record) => Ledger::from_record(&record).to_response(&record.currency_code),
        None => Ledger::default().to_response(&state.config.default_currency),
    };
    Ok(Json(response))
}

async fn post_entry(
    state: &AppState,
    entry: &LedgerEntryRequest,
    apply: impl FnOnce(&mut Ledger, i64) -> Result<(), LedgerError>,
) -> ApiResult<BalanceResponse> {
    if entry.user_id.trim().is_empty() {
        return Err(ApiError::bad_request("user_id is required"));
    }

    let existing = state.store.get_balance(&entry.user_id).await?;
    let (mut ledger, currency) = match &existing {
        Some(record) => (Ledger::from_record(record), record.currency_code.clone()),
        None => (
            Ledger::default(),
            entry
                .currency_code
                .clone()
                .unwrap_or_else(|| state.config.default_currency.clone())
                .to_uppercase(),
        ),
    };

    if let Some(requested) = entry.currency_code.as_deref() {
        if !requested.eq_ignore_ascii_case(&currency) {
            return Err(ApiError::bad_request(format!(
                "Balance is kept in {}, not {}",
                currency, requested
            )));
        }
    }

    apply(&mut ledger, entry.amount_micros)?;

    let saved = state
        .store
        .save_balance(&entry.user_id, &currency, &ledger)
        .await?;

    tracing::info!(
        user_id = %entry.user_id,
        amount_micros = entry.amount_micros,
        remaining_micros = ledger.remaining(),
        status = ledger.status.as_str(),
        "Ledger posting applied"
    );

    Ok(ledger.to_response(&saved.currency_code))
}

pub async fn post_deposit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(entry): Json<LedgerEntryRequest>,
) -> ApiResult<Json<BalanceResponse>> {
    require_internal_token(&state, &headers)?;
    Ok(Json(post_entry(&state, &entry, Ledger::deposit).await?))
}

pub async fn post_charge(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(entry): Json<LedgerEntryRequest>,
) -> ApiResult<Json<BalanceResponse>> {
    require_internal_token(&state, &headers)?;
    Ok(Json(post_entry(&state, &entry, Ledger::charge).await?))
}
