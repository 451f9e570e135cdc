//! Session authentication.
//!
//! This module provides:
//! - JWT session token creation and validation
//! - the `AuthUser` extractor for protected routes
//! - cookie helpers shared with the OAuth handlers

mod handlers;
pub mod jwt;
mod middleware;
pub mod types;

pub use handlers::{auth_logout, auth_me};
pub use middleware::{
    authenticate, build_auth_cookie, build_cookie, clear_cookie, constant_time_eq, read_cookie,
};
pub use types::{AuthConfig, AuthUser};
