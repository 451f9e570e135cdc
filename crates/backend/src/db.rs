use chrono::Utc;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::{
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager, ManagerConfig},
    AsyncPgConnection, RunQueryDsl,
};
use shared_types::{AccountBalance, AccountLinkStatus, ClientRequest, LinkDetails, StatusSource};

use crate::ledger::Ledger;
use crate::models::{NewAccountBalance, NewClientRequest, NewOAuthToken};

pub type DbPool = Pool<AsyncPgConnection>;

async fn establish_tls_connection(config: String) -> diesel::ConnectionResult<AsyncPgConnection> {
    // Set up rustls TLS configuration
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

    let (client, connection) = tokio_postgres::connect(&config, tls)
        .await
        .map_err(|e| diesel::ConnectionError::BadConnection(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Connection error: {}", e);
        }
    });

    AsyncPgConnection::try_from(client).await
}

pub fn establish_connection_pool(database_url: &str) -> anyhow::Result<DbPool> {
    let mut manager_config = ManagerConfig::default();
    manager_config.custom_setup =
        Box::new(|url| Box::pin(establish_tls_connection(url.to_string())));

    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new_with_config(
        database_url,
        manager_config,
    );
    let pool = Pool::builder(config).build()?;

    Ok(pool)
}

// Account link records
pub mod client_requests {
    use super::*;
    use diesel::dsl::sql;
    use diesel::sql_types::Text;

    pub async fn list_for_user(
        conn: &mut AsyncPgConnection,
        user: &str,
    ) -> anyhow::Result<Vec<ClientRequest>> {
        use crate::schema::client_requests::dsl::*;

        let rows = client_requests
            .filter(user_id.eq(user))
            .order_by(created_at.desc())
            .load::<ClientRequest>(conn)
            .await?;

        Ok(rows)
    }

    pub async fn exists_for_user(
        conn: &mut AsyncPgConnection,
        user: &str,
        customer: &str,
    ) -> anyhow::Result<bool> {
        use crate::schema::client_requests::dsl::*;

        let count: i64 = client_requests
            .filter(user_id.eq(user))
            .filter(customer_id.eq(customer))
            .count()
            .get_result(conn)
            .await?;

        Ok(count > 0)
    }

    /// Insert the link between `user` and `customer`, or update it. Stored
    /// detail fields missing from `details` are kept.
    pub async fn upsert(
        conn: &mut AsyncPgConnection,
        user: &str,
        customer: &str,
        new_status: AccountLinkStatus,
        details: &LinkDetails,
        source: StatusSource,
    ) -> anyhow::Result<ClientRequest> {
        use crate::schema::client_requests::dsl::*;

        let row = NewClientRequest {
            user_id: user,
            customer_id: customer,
            status: new_status.as_str(),
            link_details: serde_json::to_string(details)?,
            status_source: source.as_str(),
            updated_at: Utc::now(),
        };

        let saved = diesel::insert_into(client_requests)
            .values(&row)
            .on_conflict((user_id, customer_id))
            .do_update()
            .set((
                status.eq(excluded(status)),
                link_details.eq(sql::<Text>(
                    "(client_requests.link_details::jsonb || EXCLUDED.link_details::jsonb)::text",
                )),
                status_source.eq(excluded(status_source)),
                updated_at.eq(excluded(updated_at)),
            ))
            .get_result::<ClientRequest>(conn)
            .await?;

        Ok(saved)
    }

    /// Insert a link only if `user` has none for `customer` yet. Returns
    /// whether a row was written.
    pub async fn insert_if_absent(
        conn: &mut AsyncPgConnection,
        user: &str,
        customer: &str,
        new_status: AccountLinkStatus,
        source: StatusSource,
    ) -> anyhow::Result<bool> {
        use crate::schema::client_requests::dsl::*;

        let row = NewClientRequest {
            user_id: user,
            customer_id: customer,
            status: new_status.as_str(),
            link_details: serde_json::to_string(&LinkDetails::default())?,
            status_source: source.as_str(),
            updated_at: Utc::now(),
        };

        let inserted = diesel::insert_into(client_requests)
            .values(&row)
            .on_conflict((user_id, customer_id))
            .do_nothing()
            .execute(conn)
            .await?;

        Ok(inserted > 0)
    }

    /// Set the status of every row for `customer`, or only the caller's row
    /// when `user` is given. Last writer wins.
    pub async fn update_status(
        conn: &mut AsyncPgConnection,
        customer: &str,
        user: Option<&str>,
        new_status: AccountLinkStatus,
        source: StatusSource,
    ) -> anyhow::Result<usize> {
        use crate::schema::client_requests::dsl::*;

        let changes = (
            status.eq(new_status.as_str()),
            status_source.eq(source.as_str()),
            updated_at.eq(Utc::now()),
        );

        let updated = match user {
            Some(user) => {
                diesel::update(
                    client_requests
                        .filter(customer_id.eq(customer))
                        .filter(user_id.eq(user)),
                )
                .set(changes)
                .execute(conn)
                .await?
            }
            None => {
                diesel::update(client_requests.filter(customer_id.eq(customer)))
                    .set(changes)
                    .execute(conn)
                    .await?
            }
        };

        Ok(updated)
    }
}

// OAuth token records
pub mod oauth_tokens {
    use super::*;
    use chrono::DateTime;
    use diesel::dsl::sql;
    use diesel::sql_types::{Nullable, Text};

    pub async fn upsert(
        conn: &mut AsyncPgConnection,
        user: &str,
        provider_name: &str,
        access: &str,
        refresh: Option<&str>,
        expires: Option<DateTime<Utc>>,
        granted_scope: Option<&str>,
    ) -> anyhow::Result<()> {
        use crate::schema::user_oauth_tokens::dsl::*;

        let row = NewOAuthToken {
            user_id: user,
            provider: provider_name,
            access_token: access,
            refresh_token: refresh,
            expires_at: expires,
            scope: granted_scope,
            updated_at: Utc::now(),
        };

        // Google omits the refresh token on repeat consent; keep the stored one
        diesel::insert_into(user_oauth_tokens)
            .values(&row)
            .on_conflict((user_id, provider))
            .do_update()
            .set((
                access_token.eq(excluded(access_token)),
                refresh_token.eq(sql::<Nullable<Text>>(
                    "COALESCE(EXCLUDED.refresh_token, user_oauth_tokens.refresh_token)",
                )),
                expires_at.eq(excluded(expires_at)),
                scope.eq(excluded(scope)),
                updated_at.eq(excluded(updated_at)),
            ))
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn refresh_token_for(
        conn: &mut AsyncPgConnection,
        user: &str,
        provider_name: &str,
    ) -> anyhow::Result<Option<String>> {
        use crate::schema::user_oauth_tokens::dsl::*;

        let stored = user_oauth_tokens
            .filter(user_id.eq(user))
            .filter(provider.eq(provider_name))
            .select(refresh_token)
            .first::<Option<String>>(conn)
            .await
            .optional()?;

        Ok(stored.flatten())
    }
}

// Balance ledger snapshots
pub mod balances {
    use super::*;

    pub async fn get(
        conn: &mut AsyncPgConnection,
        user: &str,
    ) -> anyhow::Result<Option<AccountBalance>> {
        use crate::schema::account_balances::dsl::*;

        let balance = account_balances
            .filter(user_id.eq(user))
            .first::<AccountBalance>(conn)
            .await
            .optional()?;

        Ok(balance)
    }

    pub async fn save(
        conn: &mut AsyncPgConnection,
        user: &str,
        currency: &str,
        ledger: &Ledger,
    ) -> anyhow::Result<AccountBalance> {
        use crate::schema::account_balances::dsl::*;

        let row = NewAccountBalance {
            user_id: user,
            currency_code: currency,
            deposited_micros: ledger.deposited_micros,
            spent_micros: ledger.spent_micros,
            commission_micros: ledger.commission_micros,
            status: ledger.status.as_str(),
            updated_at: Utc::now(),
        };

        let saved = diesel::insert_into(account_balances)
            .values(&row)
            .on_conflict(user_id)
            .do_update()
            .set((
                deposited_micros.eq(excluded(deposited_micros)),
                spent_micros.eq(excluded(spent_micros)),
                commission_micros.eq(excluded(commission_micros)),
                status.eq(excluded(status)),
                updated_at.eq(excluded(updated_at)),
            ))
            .get_result::<AccountBalance>(conn)
            .await?;

        Ok(saved)
    }
}
