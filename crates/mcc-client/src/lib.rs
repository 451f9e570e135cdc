//! Google Ads REST client acting through a manager (MCC) account.

pub mod accounts;
pub mod bidding;
pub mod campaign;
pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod token;

pub use accounts::{CustomerInfo, SubAccount};
pub use bidding::{automatic_bidding_strategy, BiddingStrategy};
pub use campaign::{
    BudgetType, CampaignBudget, CampaignCreation, CampaignData, CampaignStep, KeywordMatchType,
    NetworkSettings, StepRecord, StepState,
};
pub use catalog::{Catalog, CatalogEntry, Resolution};
pub use client::{normalize_customer_id, resource_id, MccClient};
pub use config::McConfig;
pub use error::{McError, Result};
pub use token::TokenCache;

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::{McConfig, MccClient};

    pub fn config_for(server: &MockServer) -> McConfig {
        McConfig {
            api_base: server.uri(),
            api_version: "v20".to_string(),
            developer_token: "dev-token".to_string(),
            login_customer_id: "9998887777".to_string(),
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            refresh_token: "refresh-token".to_string(),
            token_endpoint: format!("{}/token", server.uri()),
            request_timeout: Duration::from_secs(5),
            catalog_path: None,
        }
    }

    pub fn client_for(server: &MockServer) -> MccClient {
        MccClient::new(config_for(server)).expect("client builds")
    }

    pub async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.test",
                "expires_in": 3599
            })))
            .mount(server)
            .await;
    }
}
