//! Persistence seam for handlers.
//!
//! Handlers depend on [`AccountStore`] rather than on a connection pool so
//! they can run against Postgres in production and an in-memory store in
//! tests. Customer IDs are canonicalized (digits only) before they reach
//! the database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel_async::pooled_connection::deadpool::Object;
use diesel_async::AsyncPgConnection;
use shared_types::{
    canonical_customer_id, AccountBalance, AccountLinkStatus, ClientRequest, LinkDetails,
    StatusSource,
};

use crate::db::{self, DbPool};
use crate::ledger::Ledger;

/// Tokens to persist after an OAuth exchange.
#[derive(Debug, Clone)]
pub struct OAuthTokenUpsert<'a> {
    pub user_id: &'a str,
    pub provider: &'a str,
    pub access_token: &'a str,
    pub refresh_token: Option<&'a str>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<&'a str>,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Link records owned by `user_id`, newest first.
    async fn list_links(&self, user_id: &str) -> anyhow::Result<Vec<ClientRequest>>;

    async fn user_has_customer(&self, user_id: &str, customer_id: &str) -> anyhow::Result<bool>;

    /// Create or update a link record. Detail fields left `None` keep
    /// whatever was stored before.
    async fn upsert_link(
        &self,
        user_id: &str,
        customer_id: &str,
        status: AccountLinkStatus,
        details: &LinkDetails,
        source: StatusSource,
    ) -> anyhow::Result<ClientRequest>;

    /// Record a link only if the user has none for this customer. Returns
    /// `true` when a new row was created.
    async fn insert_link_if_absent(
        &self,
        user_id: &str,
        customer_id: &str,
        status: AccountLinkStatus,
        source: StatusSource,
    ) -> anyhow::Result<bool>;

    /// Overwrite the status of a customer's link records. With `user_id`
    /// set only that user's record changes. Returns the number of rows
    /// updated.
    async fn update_status(
        &self,
        customer_id: &str,
        user_id: Option<&str>,
        status: AccountLinkStatus,
        source: StatusSource,
    ) -> anyhow::Result<usize>;

    async fn upsert_oauth_token(&self, token: OAuthTokenUpsert<'_>) -> anyhow::Result<()>;

    /// Refresh token saved by the last consent for `provider`, if any.
    async fn stored_refresh_token(
        &self,
        user_id: &str,
        provider: &str,
    ) -> anyhow::Result<Option<String>>;

    async fn get_balance(&self, user_id: &str) -> anyhow::Result<Option<AccountBalance>>;

    async fn save_balance(
        &self,
        user_id: &str,
        currency_code: &str,
        ledger: &Ledger,
    ) -> anyhow::Result<AccountBalance>;
}

/// Postgres-backed store.
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> anyhow::Result<Object<AsyncPgConnection>> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn list_links(&self, user_id: &str) -> anyhow::Result<Vec<ClientRequest>> {
        let mut conn = self.conn().await?;
        db::client_requests::list_for_user(&mut conn, user_id).await
    }

    async fn user_has_customer(&self, user_id: &str, customer_id: &str) -> anyhow::Result<bool> {
        let mut conn = self.conn().await?;
        db::client_requests::exists_for_user(&mut conn, user_id, &canonical_customer_id(customer_id))
            .await
    }

    async fn upsert_link(
        &self,
        user_id: &str,
        customer_id: &str,
        status: AccountLinkStatus,
        details: &LinkDetails,
        source: StatusSource,
    ) -> anyhow::Result<ClientRequest> {
        let mut conn = self.conn().await?;
        db::client_requests::upsert(
            &mut conn,
            user_id,
            &canonical_customer_id(customer_id),
            status,
            details,
            source,
        )
        .await
    }

    async fn insert_link_if_absent(
        &self,
        user_id: &str,
        customer_id: &str,
        status: AccountLinkStatus,
        source: StatusSource,
    ) -> anyhow::Result<bool> {
        let mut conn = self.conn().await?;
        db::client_requests::insert_if_absent(
            &mut conn,
            user_id,
            &canonical_customer_id(customer_id),
            status,
            source,
        )
        .await
    }

    async fn update_status(
        &self,
        customer_id: &str,
        user_id: Option<&str>,
        status: AccountLinkStatus,
        source: StatusSource,
    ) -> anyhow::Result<usize> {
        let mut conn = self.conn().await?;
        let updated = db::client_requests::update_status(
            &mut conn,
            &canonical_customer_id(customer_id),
            user_id,
            status,
            source,
        )
        .await?;

        tracing::info!(
            customer_id = %customer_id,
            status = %status,
            source = source.as_str(),
            updated,
            "Link status written"
        );
        Ok(updated)
    }

    async fn upsert_oauth_token(&self, token: OAuthTokenUpsert<'_>) -> anyhow::Result<()> {
        let mut conn = self.conn().await?;
        db::oauth_tokens::upsert(
            &mut conn,
            token.user_id,
            token.provider,
            token.access_token,
            token.refresh_token,
            token.expires_at,
            token.scope,
        )
        .await
    }

    async fn stored_refresh_token(
        &self,
        user_id: &str,
        provider: &str,
    ) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn().await?;
        db::oauth_tokens::refresh_token_for(&mut conn, user_id, provider).await
    }

    async fn get_balance(&self, user_id: &str) -> anyhow::Result<Option<AccountBalance>> {
        let mut conn = self.conn().await?;
        db::balances::get(&mut conn, user_id).await
    }

    async fn save_balance(
        &self,
        user_id: &str,
        currency_code: &str,
        ledger: &Ledger,
    ) -> anyhow::Result<AccountBalance> {
        let mut conn = self.conn().await?;
        db::balances::save(&mut conn, user_id, currency_code, ledger).await
    }
}
