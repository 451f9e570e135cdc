//! JSON API handlers.

pub mod accounts;
pub mod balance;
pub mod campaigns;
pub mod statuses;

use axum::http::StatusCode;

pub async fn health_check() -> StatusCode {
    StatusCode::OK
}
