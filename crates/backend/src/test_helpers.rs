//! Shared fixtures for handler tests: an in-memory [`AccountStore`] and an
//! [`AppState`] whose outbound calls all point at one mock server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::to_bytes;
use axum::response::Response;
use chrono::Utc;
use mcc_client::{McConfig, MccClient};
use shared_types::{
    canonical_customer_id, AccountBalance, AccountLinkStatus, ClientRequest, LinkDetails,
    StatusSource,
};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::auth::{jwt, AuthConfig};
use crate::config::{AppConfig, DEFAULT_OAUTH_DOCS_URL};
use crate::ledger::Ledger;
use crate::store::{AccountStore, OAuthTokenUpsert};
use crate::AppState;

pub const PUBSUB_TOKEN: &str = "pubsub-secret";
pub const INTERNAL_TOKEN: &str = "internal-secret";

pub type StatusWrite = (String, Option<String>, AccountLinkStatus, StatusSource);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredToken {
    pub user_id: String,
    pub provider: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

#[derive(Default)]
pub struct MemoryStore {
    links: Mutex<Vec<ClientRequest>>,
    status_writes: Mutex<Vec<StatusWrite>>,
    tokens: Mutex<Vec<StoredToken>>,
    balances: Mutex<Vec<AccountBalance>>,
}

impl MemoryStore {
    /// Every `update_status` call, in order, with the ID as passed in.
    pub fn status_updates(&self) -> Vec<StatusWrite> {
        self.status_writes.lock().unwrap().clone()
    }

    pub fn oauth_tokens(&self) -> Vec<StoredToken> {
        self.tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn list_links(&self, user_id: &str) -> anyhow::Result<Vec<ClientRequest>> {
        let mut rows: Vec<ClientRequest> = self
            .links
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn user_has_customer(&self, user_id: &str, customer_id: &str) -> anyhow::Result<bool> {
        let customer_id = canonical_customer_id(customer_id);
        Ok(self
            .links
            .lock()
            .unwrap()
            .iter()
            .any(|row| row.user_id == user_id && row.customer_id == customer_id))
    }

    async fn upsert_link(
        &self,
        user_id: &str,
        customer_id: &str,
        status: AccountLinkStatus,
        details: &LinkDetails,
        source: StatusSource,
    ) -> anyhow::Result<ClientRequest> {
        let customer_id = canonical_customer_id(customer_id);
        let now = Utc::now();
        let mut links = self.links.lock().unwrap();

        if let Some(row) = links
            .iter_mut()
            .find(|row| row.user_id == user_id && row.customer_id == customer_id)
        {
            row.status = status.as_str().to_string();
            row.link_details = merge_details(&row.link_details, details)?;
            row.status_source = source.as_str().to_string();
            row.updated_at = now;
            return Ok(row.clone());
        }

        let row = ClientRequest {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            customer_id,
            status: status.as_str().to_string(),
            link_details: serde_json::to_string(details)?,
            status_source: source.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };
        links.push(row.clone());
        Ok(row)
    }

    async fn insert_link_if_absent(
        &self,
        user_id: &str,
        customer_id: &str,
        status: AccountLinkStatus,
        source: StatusSource,
    ) -> anyhow::Result<bool> {
        if self.user_has_customer(user_id, customer_id).await? {
            return Ok(false);
        }
        self.upsert_link(user_id, customer_id, status, &LinkDetails::default(), source)
            .await?;
        Ok(true)
    }

    async fn update_status(
        &self,
        customer_id: &str,
        user_id: Option<&str>,
        status: AccountLinkStatus,
        source: StatusSource,
    ) -> anyhow::Result<usize> {
        self.status_writes.lock().unwrap().push((
            customer_id.to_string(),
            user_id.map(str::to_string),
            status,
            source,
        ));

        let canonical = canonical_customer_id(customer_id);
        let mut updated = 0;
        for row in self.links.lock().unwrap().iter_mut() {
            if row.customer_id == canonical && user_id.map_or(true, |u| row.user_id == u) {
                row.status = status.as_str().to_string();
                row.status_source = source.as_str().to_string();
                row.updated_at = Utc::now();
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn upsert_oauth_token(&self, token: OAuthTokenUpsert<'_>) -> anyhow::Result<()> {
        let mut tokens = self.tokens.lock().unwrap();
        let stored = StoredToken {
            user_id: token.user_id.to_string(),
            provider: token.provider.to_string(),
            access_token: token.access_token.to_string(),
            refresh_token: token.refresh_token.map(str::to_string),
        };
        match tokens
            .iter_mut()
            .find(|t| t.user_id == stored.user_id && t.provider == stored.provider)
        {
            Some(existing) => {
                let previous_refresh = existing.refresh_token.take();
                *existing = StoredToken {
                    refresh_token: stored.refresh_token.or(previous_refresh),
                    ..stored
                };
            }
            None => tokens.push(stored),
        }
        Ok(())
    }

    async fn stored_refresh_token(
        &self,
        user_id: &str,
        provider: &str,
    ) -> anyhow::Result<Option<String>> {
        Ok(self
            .tokens
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.user_id == user_id && t.provider == provider)
            .and_then(|t| t.refresh_token.clone()))
    }

    async fn get_balance(&self, user_id: &str) -> anyhow::Result<Option<AccountBalance>> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.user_id == user_id)
            .cloned())
    }

    async fn save_balance(
        &self,
        user_id: &str,
        currency_code: &str,
        ledger: &Ledger,
    ) -> anyhow::Result<AccountBalance> {
        let mut balances = self.balances.lock().unwrap();
        let record = AccountBalance {
            id: balances
                .iter()
                .find(|b| b.user_id == user_id)
                .map(|b| b.id)
                .unwrap_or_else(Uuid::new_v4),
            user_id: user_id.to_string(),
            currency_code: currency_code.to_string(),
            deposited_micros: ledger.deposited_micros,
            spent_micros: ledger.spent_micros,
            commission_micros: ledger.commission_micros,
            status: ledger.status.as_str().to_string(),
            updated_at: Utc::now(),
        };
        balances.retain(|b| b.user_id != user_id);
        balances.push(record.clone());
        Ok(record)
    }
}

/// Same result as the `jsonb ||` merge the Postgres store runs.
fn merge_details(stored: &str, details: &LinkDetails) -> anyhow::Result<String> {
    let mut merged: serde_json::Map<String, serde_json::Value> = serde_json::from_str(stored)?;
    if let serde_json::Value::Object(newer) = serde_json::to_value(details)? {
        merged.extend(newer);
    }
    Ok(serde_json::to_string(&merged)?)
}

pub fn test_auth_config(base: &str) -> AuthConfig {
    AuthConfig {
        jwt_secret: "test-jwt-secret".to_string(),
        token_duration_days: 7,
        cookie_name: "auth_token".to_string(),
        google_client_id: "client-id".to_string(),
        google_client_secret: "client-secret".to_string(),
        oauth_redirect_uri: "http://localhost:3000/api/oauth/google/callback".to_string(),
        google_auth_url: format!("{}/o/oauth2/v2/auth", base),
        google_token_url: format!("{}/oauth/token", base),
        google_userinfo_url: format!("{}/oauth/userinfo", base),
    }
}

pub fn test_app_config(base: &str) -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".to_string(),
        port: 0,
        batch_sync_url: Some(format!("{}/batch-sync", base)),
        pubsub_verification_token: Some(PUBSUB_TOKEN.to_string()),
        internal_api_token: Some(INTERNAL_TOKEN.to_string()),
        oauth_docs_url: DEFAULT_OAUTH_DOCS_URL.to_string(),
        default_currency: "USD".to_string(),
    }
}

pub fn test_mcc_config(base: &str) -> McConfig {
    McConfig {
        api_base: base.to_string(),
        api_version: "v20".to_string(),
        developer_token: "dev-token".to_string(),
        login_customer_id: "9998887777".to_string(),
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        refresh_token: "mcc-refresh-token".to_string(),
        token_endpoint: format!("{}/token", base),
        request_timeout: Duration::from_secs(5),
        catalog_path: None,
    }
}

/// Token endpoint used by the manager account client.
pub async fn mount_google_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.mcc",
            "expires_in": 3599
        })))
        .mount(server)
        .await;
}

pub struct TestContext {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
}

impl TestContext {
    /// State whose Google, batch-sync and token URLs all live under `base`.
    pub async fn new(base: &str) -> Self {
        let store = Arc::new(MemoryStore::default());
        let mcc = MccClient::new(test_mcc_config(base)).expect("mcc client builds");

        let state = AppState {
            store: store.clone(),
            mcc: Arc::new(mcc),
            config: Arc::new(test_app_config(base)),
            auth_config: test_auth_config(base),
            http: reqwest::Client::new(),
        };

        Self { state, store }
    }

    pub fn session_token(&self, user_id: &str) -> String {
        jwt::create_token(&self.state.auth_config, user_id, None).expect("token signs")
    }
}

pub async fn read_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    serde_json::from_slice(&bytes).expect("body is JSON")
}

pub async fn read_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    String::from_utf8_lossy(&bytes).into_owned()
}
