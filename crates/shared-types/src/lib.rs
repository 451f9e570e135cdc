use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Google Ads account links
// ============================================================================

/// Status of a Google Ads account link (`client_requests.status`).
///
/// Only these values are ever written to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountLinkStatus {
    Active,
    Pending,
    Linked,
    Enabled,
    Disabled,
    Suspended,
    Rejected,
    Cancelled,
    NotLinked,
    RefreshNeeded,
}

impl AccountLinkStatus {
    pub const ALL: [AccountLinkStatus; 10] = [
        AccountLinkStatus::Active,
        AccountLinkStatus::Pending,
        AccountLinkStatus::Linked,
        AccountLinkStatus::Enabled,
        AccountLinkStatus::Disabled,
        AccountLinkStatus::Suspended,
        AccountLinkStatus::Rejected,
        AccountLinkStatus::Cancelled,
        AccountLinkStatus::NotLinked,
        AccountLinkStatus::RefreshNeeded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountLinkStatus::Active => "ACTIVE",
            AccountLinkStatus::Pending => "PENDING",
            AccountLinkStatus::Linked => "LINKED",
            AccountLinkStatus::Enabled => "ENABLED",
            AccountLinkStatus::Disabled => "DISABLED",
            AccountLinkStatus::Suspended => "SUSPENDED",
            AccountLinkStatus::Rejected => "REJECTED",
            AccountLinkStatus::Cancelled => "CANCELLED",
            AccountLinkStatus::NotLinked => "NOT_LINKED",
            AccountLinkStatus::RefreshNeeded => "REFRESH_NEEDED",
        }
    }

    /// Parse a status string. Case-insensitive; `CANCELED` is accepted as
    /// Google's spelling of `CANCELLED`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(AccountLinkStatus::Active),
            "PENDING" => Some(AccountLinkStatus::Pending),
            "LINKED" => Some(AccountLinkStatus::Linked),
            "ENABLED" => Some(AccountLinkStatus::Enabled),
            "DISABLED" => Some(AccountLinkStatus::Disabled),
            "SUSPENDED" => Some(AccountLinkStatus::Suspended),
            "REJECTED" => Some(AccountLinkStatus::Rejected),
            "CANCELLED" | "CANCELED" => Some(AccountLinkStatus::Cancelled),
            "NOT_LINKED" => Some(AccountLinkStatus::NotLinked),
            "REFRESH_NEEDED" => Some(AccountLinkStatus::RefreshNeeded),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccountLinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which path wrote the current status of a link record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    Webhook,
    BatchSync,
    OAuth,
    Mcc,
}

impl StatusSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusSource::Webhook => "webhook",
            StatusSource::BatchSync => "batch_sync",
            StatusSource::OAuth => "oauth",
            StatusSource::Mcc => "mcc",
        }
    }
}

/// Strip everything but digits from a Google Ads customer ID, so
/// `123-456-7890` and `1234567890` address the same account.
pub fn canonical_customer_id(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Format a canonical ten-digit customer ID as `123-456-7890`.
pub fn display_customer_id(raw: &str) -> String {
    let digits = canonical_customer_id(raw);
    if digits.len() == 10 {
        format!("{}-{}-{}", &digits[..3], &digits[3..6], &digits[6..])
    } else {
        digits
    }
}

/// Free-form details stored alongside a link record (`link_details`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptive_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_resource_name: Option<String>,
}

/// Account link record matching `client_requests` column order exactly.
/// `link_details` is JSON stored as TEXT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "diesel", derive(diesel::Queryable))]
pub struct ClientRequest {
    pub id: Uuid,
    pub user_id: String,
    pub customer_id: String,
    pub status: String,
    pub link_details: String,
    pub status_source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// API view of a link record with parsed details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRequestResponse {
    pub customer_id: String,
    pub status: String,
    pub link_details: serde_json::Value,
    pub status_source: String,
    pub updated_at: DateTime<Utc>,
}

impl From<ClientRequest> for ClientRequestResponse {
    fn from(row: ClientRequest) -> Self {
        let link_details =
            serde_json::from_str(&row.link_details).unwrap_or(serde_json::Value::Null);

        ClientRequestResponse {
            customer_id: display_customer_id(&row.customer_id),
            status: row.status,
            link_details,
            status_source: row.status_source,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubAccountRequest {
    pub descriptive_name: String,
    pub currency_code: String,
    pub time_zone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkAccountRequest {
    pub customer_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRefreshResponse {
    pub success: bool,
    pub refreshed: bool,
    pub accounts: Vec<ClientRequestResponse>,
}

// ============================================================================
// OAuth tokens
// ============================================================================

/// Per-user, per-provider OAuth tokens (`user_oauth_tokens`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "diesel", derive(diesel::Queryable))]
pub struct OAuthTokenRecord {
    pub id: Uuid,
    pub user_id: String,
    pub provider: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUserResponse {
    pub user_id: String,
    pub email: Option<String>,
}

// ============================================================================
// Balance ledger
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStatus {
    Active,
    Suspended,
    OutOfBalance,
    Closed,
}

impl BalanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceStatus::Active => "active",
            BalanceStatus::Suspended => "suspended",
            BalanceStatus::OutOfBalance => "out_of_balance",
            BalanceStatus::Closed => "closed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(BalanceStatus::Active),
            "suspended" => Some(BalanceStatus::Suspended),
            "out_of_balance" => Some(BalanceStatus::OutOfBalance),
            "closed" => Some(BalanceStatus::Closed),
            _ => None,
        }
    }
}

/// Furriyadh account balance (`account_balances`). Amounts are micros of
/// `currency_code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "diesel", derive(diesel::Queryable))]
pub struct AccountBalance {
    pub id: Uuid,
    pub user_id: String,
    pub currency_code: String,
    pub deposited_micros: i64,
    pub spent_micros: i64,
    pub commission_micros: i64,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub currency_code: String,
    pub deposited_micros: i64,
    pub spent_micros: i64,
    pub commission_micros: i64,
    pub remaining_micros: i64,
    pub commission_percent: i64,
    pub status: String,
}

/// Internal ledger posting (deposit or charge) for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntryRequest {
    pub user_id: String,
    pub amount_micros: i64,
    #[serde(default)]
    pub currency_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_every_variant() {
        for status in AccountLinkStatus::ALL {
            assert_eq!(AccountLinkStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_status_rejects_unknown_strings() {
        assert_eq!(AccountLinkStatus::from_str("MAYBE"), None);
        assert_eq!(AccountLinkStatus::from_str(""), None);
        assert_eq!(
            AccountLinkStatus::from_str("canceled"),
            Some(AccountLinkStatus::Cancelled)
        );
    }

    #[test]
    fn test_customer_id_forms() {
        assert_eq!(canonical_customer_id("123-456-7890"), "1234567890");
        assert_eq!(display_customer_id("1234567890"), "123-456-7890");
        assert_eq!(display_customer_id("12345"), "12345");
    }

    #[test]
    fn test_link_response_parses_details() {
        let row = ClientRequest {
            id: Uuid::new_v4(),
            user_id: "user@example.com".to_string(),
            customer_id: "1234567890".to_string(),
            status: "LINKED".to_string(),
            link_details: r#"{"descriptive_name":"Shop"}"#.to_string(),
            status_source: "oauth".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let response = ClientRequestResponse::from(row);
        assert_eq!(response.customer_id, "123-456-7890");
        assert_eq!(response.link_details["descriptive_name"], "Shop");
    }
}
