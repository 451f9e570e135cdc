use axum::http::{header, HeaderName, Method};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mcc_client::{McConfig, MccClient};

mod auth;
mod config;
mod db;
pub mod error;
mod handlers;
mod ledger;
mod models;
mod oauth;
mod routes;
mod schema;
mod store;
mod webhook;

#[cfg(test)]
mod test_helpers;

use auth::AuthConfig;
use config::AppConfig;
use store::{AccountStore, PgStore};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AccountStore>,
    pub mcc: Arc<MccClient>,
    pub config: Arc<AppConfig>,
    pub auth_config: AuthConfig,
    /// Client for OAuth and batch-sync calls
    pub http: reqwest::Client,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("backend=debug,mcc_client=debug,tower_http=debug")
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let auth_config = AuthConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let mcc = MccClient::new(McConfig::from_env()?)?;

    if config.pubsub_verification_token.is_none() {
        tracing::warn!("PUBSUB_VERIFICATION_TOKEN not set; webhook pushes will be rejected");
    }
    if config.batch_sync_url.is_none() {
        tracing::warn!("BATCH_SYNC_URL not set; forced status refreshes will fail");
    }

    // Establish database connection pool
    let pool = db::establish_connection_pool(&config.database_url)?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let port = config.port;
    let state = AppState {
        store: Arc::new(PgStore::new(pool)),
        mcc: Arc::new(mcc),
        config: Arc::new(config),
        auth_config,
        http,
    };

    let app = routes::build_router(state)
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build CORS layer based on environment configuration.
///
/// If CORS_ALLOWED_ORIGINS is set, only those origins are allowed.
/// If not set, defaults to permissive CORS (for development only).
fn build_cors_layer() -> CorsLayer {
    let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS").ok();

    match allowed_origins {
        Some(origins) => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                tracing::warn!(
                    "CORS_ALLOWED_ORIGINS is set but empty, using permissive CORS (not recommended for production)"
                );
                CorsLayer::permissive()
            } else {
                tracing::info!("CORS configured for origins: {:?}", origins);
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([
                        header::CONTENT_TYPE,
                        header::AUTHORIZATION,
                        HeaderName::from_static(handlers::balance::INTERNAL_TOKEN_HEADER),
                    ])
                    .allow_credentials(true)
            }
        }
        None => {
            tracing::warn!(
                "CORS_ALLOWED_ORIGINS not set, using permissive CORS (not recommended for production)"
            );
            CorsLayer::permissive()
        }
    }
}
