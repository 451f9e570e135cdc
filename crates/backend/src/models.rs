// Insertable rows for Diesel
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Insertable struct for account link records.
/// `link_details` is JSON stored as TEXT.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::client_requests)]
pub struct NewClientRequest<'a> {
    pub user_id: &'a str,
    pub customer_id: &'a str,
    pub status: &'a str,
    pub link_details: String,
    pub status_source: &'a str,
    pub updated_at: DateTime<Utc>,
}

/// Insertable struct for OAuth tokens
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::user_oauth_tokens)]
pub struct NewOAuthToken<'a> {
    pub user_id: &'a str,
    pub provider: &'a str,
    pub access_token: &'a str,
    pub refresh_token: Option<&'a str>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<&'a str>,
    pub updated_at: DateTime<Utc>,
}

/// Insertable struct for balance snapshots
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::account_balances)]
pub struct NewAccountBalance<'a> {
    pub user_id: &'a str,
    pub currency_code: &'a str,
    pub deposited_micros: i64,
    pub spent_micros: i64,
    pub commission_micros: i64,
    pub status: &'a str,
    pub updated_at: DateTime<Utc>,
}
