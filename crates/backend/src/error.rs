//! Unified error handling for the backend API.
//!
//! Handlers return [`ApiResult`] and use `?`; every error renders as an
//! `{error, details}` JSON body with a matching status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel_async::pooled_connection::deadpool::PoolError;
use mcc_client::McError;
use serde::Serialize;
use thiserror::Error;

use crate::ledger::LedgerError;

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Unified error type for API handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Database connection pool error
    #[error("Database connection error")]
    ConnectionPool(#[source] PoolError),

    /// Database query error
    #[error("Database error: {0}")]
    Database(#[source] diesel::result::Error),

    /// Generic store/anyhow error
    #[error("{0}")]
    Internal(#[source] anyhow::Error),

    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Environment variable missing
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication required but not provided or invalid
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not permitted to access resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A service we depend on failed
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Google Ads call failed or was rejected before sending
    #[error(transparent)]
    Ads(#[from] McError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ApiError {
    /// Create a not found error with a custom message
    pub fn not_found(resource: impl Into<String>) -> Self {
        ApiError::NotFound(resource.into())
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    /// Create a config error for missing env vars
    pub fn missing_env(var_name: &str) -> Self {
        ApiError::Config(format!("{} environment variable must be set", var_name))
    }
}

/// Store errors arrive as `anyhow`; recover the pool and diesel causes so
/// they keep their own status codes.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<PoolError>() {
            Ok(pool) => return ApiError::ConnectionPool(pool),
            Err(err) => err,
        };
        match err.downcast::<diesel::result::Error>() {
            Ok(db) => ApiError::Database(db),
            Err(err) => ApiError::Internal(err),
        }
    }
}

fn ads_error_parts(e: &McError) -> (StatusCode, String, Option<serde_json::Value>) {
    match e {
        McError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
        McError::InvalidCustomerId(id) => (
            StatusCode::BAD_REQUEST,
            format!("Invalid customer ID: {}", id),
            None,
        ),
        McError::StepFailed {
            step,
            source,
            report,
        } => (
            StatusCode::BAD_GATEWAY,
            format!("Campaign creation failed at {}: {}", step, source),
            serde_json::to_value(report.as_ref()).ok(),
        ),
        McError::Config(msg) | McError::Catalog(msg) => {
            tracing::error!("Google Ads client misconfigured: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server configuration error".to_string(),
                None,
            )
        }
        other => {
            tracing::error!("Google Ads error: {}", other);
            (
                StatusCode::BAD_GATEWAY,
                "Google Ads request failed".to_string(),
                Some(serde_json::Value::String(other.to_string())),
            )
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match &self {
            ApiError::ConnectionPool(e) => {
                tracing::error!("Connection pool error: {:?}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Database connection unavailable".to_string(),
                    None,
                )
            }
            ApiError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                match e {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        "Resource not found".to_string(),
                        None,
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Database operation failed".to_string(),
                        None,
                    ),
                }
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
            ApiError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                format!("{} not found", resource),
                None,
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            ApiError::Config(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server configuration error".to_string(),
                    None,
                )
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone(), None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone(), None),
            ApiError::Upstream(msg) => {
                tracing::warn!("Upstream failure: {}", msg);
                (StatusCode::BAD_GATEWAY, msg.clone(), None)
            }
            ApiError::Ads(e) => ads_error_parts(e),
            ApiError::Ledger(e) => {
                let status = match e {
                    LedgerError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
                    LedgerError::AccountSuspended | LedgerError::AccountClosed => {
                        StatusCode::FORBIDDEN
                    }
                    LedgerError::Overflow => StatusCode::UNPROCESSABLE_ENTITY,
                };
                (status, e.to_string(), None)
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
