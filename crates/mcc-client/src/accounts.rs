//! Sub-account management under the manager account.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::{normalize_customer_id, resource_id, MccClient};
use crate::error::{McError, Result};

/// Newly created client account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubAccount {
    pub customer_id: String,
    pub resource_name: String,
}

/// Customer fields read through `googleAds:search`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub id: String,
    #[serde(default)]
    pub descriptive_name: Option<String>,
    #[serde(default)]
    pub currency_code: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
    /// Google's `CustomerStatus` (ENABLED, CANCELED, SUSPENDED, CLOSED)
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub manager: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCustomerClientResponse {
    resource_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MutateLinkResponse {
    result: Option<LinkResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkResult {
    resource_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessibleCustomersResponse {
    #[serde(default)]
    resource_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchRow>,
}

#[derive(Debug, Deserialize)]
struct SearchRow {
    customer: Option<CustomerInfo>,
}

const CUSTOMER_QUERY: &str = "SELECT customer.id, customer.descriptive_name, \
     customer.currency_code, customer.time_zone, customer.status, customer.manager \
     FROM customer";

impl MccClient {
    /// Create a client account under the manager account.
    pub async fn create_sub_account(
        &self,
        descriptive_name: &str,
        currency_code: &str,
        time_zone: &str,
    ) -> Result<SubAccount> {
        if descriptive_name.trim().is_empty() {
            return Err(McError::validation("descriptive name is required"));
        }
        let valid_currency =
            currency_code.len() == 3 && currency_code.chars().all(|c| c.is_ascii_alphabetic());
        if !valid_currency {
            return Err(McError::validation(format!(
                "currency code must be ISO 4217, got '{}'",
                currency_code
            )));
        }

        let path = format!("customers/{}:createCustomerClient", self.login_customer_id());
        let body = json!({
            "customerClient": {
                "descriptiveName": descriptive_name.trim(),
                "currencyCode": currency_code.to_uppercase(),
                "timeZone": time_zone,
            }
        });

        let response: CreateCustomerClientResponse = self.post(&path, &body).await?;
        let resource_name = response.resource_name.ok_or(McError::MissingResourceName)?;
        let customer_id = resource_id(&resource_name)?;

        tracing::info!(customer_id = %customer_id, "Created sub-account '{}'", descriptive_name);

        Ok(SubAccount {
            customer_id,
            resource_name,
        })
    }

    /// Invite an existing customer to be managed by the manager account.
    /// Returns the link resource name; the link stays pending until the
    /// customer accepts.
    pub async fn link_existing_account(&self, customer_id: &str) -> Result<String> {
        let customer_id = normalize_customer_id(customer_id)?;
        let path = format!(
            "customers/{}/customerClientLinks:mutate",
            self.login_customer_id()
        );
        let body = json!({
            "operation": {
                "create": {
                    "clientCustomer": format!("customers/{}", customer_id),
                    "status": "PENDING",
                }
            }
        });

        let response: MutateLinkResponse = self.post(&path, &body).await?;
        let resource_name = response
            .result
            .and_then(|r| r.resource_name)
            .ok_or(McError::MissingResourceName)?;

        tracing::info!(customer_id = %customer_id, "Sent manager link invitation");
        Ok(resource_name)
    }

    /// Customer IDs reachable with the given user access token.
    pub async fn list_accessible_customers(&self, access_token: &str) -> Result<Vec<String>> {
        let response: AccessibleCustomersResponse = self
            .get_with_token("customers:listAccessibleCustomers", access_token)
            .await?;

        response
            .resource_names
            .iter()
            .map(|name| resource_id(name))
            .collect()
    }

    /// Read a customer's descriptive fields and status.
    pub async fn customer_status(&self, customer_id: &str) -> Result<CustomerInfo> {
        let customer_id = normalize_customer_id(customer_id)?;
        let path = format!("customers/{}/googleAds:search", customer_id);

        let response: SearchResponse = self.post(&path, &json!({ "query": CUSTOMER_QUERY })).await?;

        response
            .results
            .into_iter()
            .find_map(|row| row.customer)
            .ok_or_else(|| McError::Api {
                status: 404,
                message: format!("customer {} not found", customer_id),
            })
    }
}
