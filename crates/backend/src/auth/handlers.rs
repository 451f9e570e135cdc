//! Session HTTP handlers.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::AppState;

use super::{clear_cookie, types::AuthUserResponse, AuthUser};

/// Get current authenticated user info.
pub async fn auth_me(user: AuthUser) -> Json<AuthUserResponse> {
    Json(AuthUserResponse {
        user_id: user.user_id,
        email: user.email,
    })
}

/// Logout - clear auth cookie.
pub async fn auth_logout(State(state): State<AppState>) -> impl IntoResponse {
    let cookie = clear_cookie(&state.auth_config.cookie_name);

    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, "/".to_string()), (header::SET_COOKIE, cookie)],
    )
}
