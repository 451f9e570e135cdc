//! Request plumbing shared by every Google Ads call.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::catalog::Catalog;
use crate::config::McConfig;
use crate::error::{McError, Result};
use crate::token::TokenCache;

/// Client for the Google Ads REST API acting as the manager (MCC) account.
///
/// Holds the access-token cache, so one instance should be shared for the
/// lifetime of the process.
pub struct MccClient {
    pub(crate) http: reqwest::Client,
    pub(crate) config: McConfig,
    tokens: TokenCache,
    catalog: Catalog,
}

/// Whose access token a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Principal {
    /// The cached manager token; sent with `login-customer-id`.
    Manager,
    /// A token supplied by the caller. Its failures never touch the cache.
    User,
}

#[derive(Debug, Deserialize)]
struct MutateResponse {
    #[serde(default)]
    results: Vec<MutateResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MutateResult {
    resource_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Vec<GoogleErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    #[serde(default)]
    errors: Vec<GoogleAdsErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GoogleAdsErrorEntry {
    #[serde(default)]
    message: String,
}

impl MccClient {
    pub fn new(config: McConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let catalog = match &config.catalog_path {
            Some(path) => Catalog::load(path)?,
            None => Catalog::builtin(),
        };

        let tokens = TokenCache::new(
            http.clone(),
            config.token_endpoint.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
            config.refresh_token.clone(),
        );

        Ok(Self {
            http,
            config,
            tokens,
            catalog,
        })
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Manager account ID (digits only).
    pub fn login_customer_id(&self) -> &str {
        &self.config.login_customer_id
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.api_version,
            path
        )
    }

    /// POST a JSON body as the manager account.
    pub(crate) async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let token = self.tokens.access_token().await?;
        let request = self.http.post(self.url(path)).json(body);
        self.execute(request, &token, Principal::Manager).await
    }

    /// GET with an explicit access token (used for tokens that do not
    /// belong to the manager account).
    pub(crate) async fn get_with_token<T: DeserializeOwned>(
        &self,
        path: &str,
        access_token: &str,
    ) -> Result<T> {
        let request = self.http.get(self.url(path));
        self.execute(request, access_token, Principal::User).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        access_token: &str,
        principal: Principal,
    ) -> Result<T> {
        let mut request = request
            .bearer_auth(access_token)
            .header("developer-token", &self.config.developer_token);
        if principal == Principal::Manager {
            request = request.header("login-customer-id", &self.config.login_customer_id);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::UNAUTHORIZED && principal == Principal::Manager {
                self.tokens.invalidate().await;
            }
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }

        Ok(response.json().await?)
    }

    /// Run `{collection}:mutate` for a customer and return the resource
    /// names of the results.
    pub(crate) async fn mutate(
        &self,
        customer_id: &str,
        collection: &str,
        operations: Vec<Value>,
    ) -> Result<Vec<String>> {
        let path = format!("customers/{}/{}:mutate", customer_id, collection);
        let response: MutateResponse = self
            .post(&path, &json!({ "operations": operations }))
            .await?;

        let names: Vec<String> = response
            .results
            .into_iter()
            .filter_map(|r| r.resource_name)
            .collect();

        if names.is_empty() {
            return Err(McError::MissingResourceName);
        }

        Ok(names)
    }
}

fn api_error(status: u16, body: &str) -> McError {
    let message = match serde_json::from_str::<GoogleErrorBody>(body) {
        Ok(parsed) => {
            let detail = parsed
                .error
                .details
                .iter()
                .flat_map(|d| d.errors.iter())
                .map(|e| e.message.as_str())
                .find(|m| !m.is_empty());
            match detail {
                Some(detail) if detail != parsed.error.message => {
                    format!("{} ({})", parsed.error.message, detail)
                }
                _ => parsed.error.message,
            }
        }
        Err(_) => body.to_string(),
    };

    tracing::error!(status, "Google Ads API error: {}", message);
    McError::Api { status, message }
}

/// Trailing ID segment of a resource name, e.g. `customers/1/campaigns/42`
/// yields `42`.
pub fn resource_id(resource_name: &str) -> Result<String> {
    resource_name
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty() && *id != resource_name)
        .map(str::to_string)
        .ok_or(McError::MissingResourceName)
}

/// Validate and strip a customer ID to its ten digits.
pub fn normalize_customer_id(raw: &str) -> Result<String> {
    let digits = shared_types::canonical_customer_id(raw);
    if digits.len() != 10 {
        return Err(McError::InvalidCustomerId(raw.to_string()));
    }
    Ok(digits)
}
