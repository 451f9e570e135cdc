use axum::{
    routing::{get, post},
    Router,
};

use crate::auth::{auth_logout, auth_me};
use crate::handlers::{accounts, balance, campaigns, health_check, statuses};
use crate::{oauth, webhook, AppState};

/// All API routes. Layers (CORS, tracing) are added by the caller.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Session routes
        .route("/api/auth/me", get(auth_me))
        .route("/api/auth/logout", post(auth_logout))
        // OAuth routes
        .route("/api/oauth/google/start", get(oauth::oauth_start))
        .route("/api/oauth/google/callback", get(oauth::oauth_callback))
        // Account status: pull refresh and Pub/Sub push share a path
        .route(
            "/api/google-ads/batch-refresh-statuses",
            get(statuses::batch_refresh_statuses).post(webhook::receive),
        )
        // Account routes
        .route(
            "/api/accounts",
            get(accounts::list_accounts).post(accounts::create_account),
        )
        .route("/api/accounts/link", post(accounts::link_account))
        .route("/api/accounts/:customer_id", get(accounts::get_account_status))
        // Campaign routes
        .route("/api/campaigns", post(campaigns::create_campaign))
        // Balance routes
        .route("/api/balance", get(balance::get_balance))
        .route("/api/balance/deposits", post(balance::post_deposit))
        .route("/api/balance/charges", post(balance::post_charge))
        .with_state(state)
}
