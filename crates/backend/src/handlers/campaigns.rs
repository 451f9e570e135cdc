use axum::{extract::State, http::StatusCode, Json};
use mcc_client::{CampaignCreation, CampaignData};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    #[serde(alias = "customerId")]
    pub customer_id: String,
    #[serde(flatten)]
    pub campaign: CampaignData,
}

/// Build a search campaign in one of the caller's linked accounts.
pub async fn create_campaign(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateCampaignRequest>,
) -> ApiResult<(StatusCode, Json<CampaignCreation>)> {
    payload.campaign.validate()?;

    if !state
        .store
        .user_has_customer(&user.user_id, &payload.customer_id)
        .await?
    {
        return Err(ApiError::Forbidden(format!(
            "Account {} is not linked to this user",
            payload.customer_id
        )));
    }

    tracing::info!(
        user_id = %user.user_id,
        customer_id = %payload.customer_id,
        "Creating campaign '{}'",
        payload.campaign.name
    );

    let report = state
        .mcc
        .create_campaign(&payload.customer_id, &payload.campaign)
        .await?;

    Ok((StatusCode::CREATED, Json(report)))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request};
    use serde_json::{json, Value};
    use shared_types::{AccountLinkStatus, LinkDetails, StatusSource};
    use tower::ServiceExt;
    use wiremock::matchers::{any, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::routes::build_router;
    use crate::test_helpers::{mount_google_token, read_json, TestContext};

    const USER: &str = "owner@example.com";

    fn campaign_body(headlines: &[&str]) -> Value {
        json!({
            "customerId": "123-456-7890",
            "name": "Ramadan Sale",
            "objective": "SALES",
            "budget": {"amount": 50.0, "type": "daily"},
            "locations": ["Saudi Arabia"],
            "languages": ["Arabic"],
            "keywords": ["dates riyadh"],
            "headlines": headlines,
            "descriptions": ["Fresh dates delivered", "Order today"],
            "finalUrl": "https://shop.example.sa"
        })
    }

    fn post(ctx: &TestContext, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/campaigns")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", ctx.session_token(USER)))
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn link_customer(ctx: &TestContext) {
        ctx.state
            .store
            .upsert_link(
                USER,
                "1234567890",
                AccountLinkStatus::Active,
                &LinkDetails::default(),
                StatusSource::Mcc,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_too_few_headlines_is_rejected_before_any_call() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let ctx = TestContext::new(&server.uri()).await;
        link_customer(&ctx).await;

        let response = build_router(ctx.state.clone())
            .oneshot(post(&ctx, campaign_body(&["One", "Two"])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unlinked_customer_is_forbidden() {
        let ctx = TestContext::new("http://127.0.0.1:9").await;

        let response = build_router(ctx.state.clone())
            .oneshot(post(&ctx, campaign_body(&["One", "Two", "Three"])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_created_campaign_returns_report() {
        let server = MockServer::start().await;
        mount_google_token(&server).await;

        for (collection, resource) in [
            ("campaignBudgets", "customers/1234567890/campaignBudgets/11"),
            ("campaigns", "customers/1234567890/campaigns/22"),
            ("adGroups", "customers/1234567890/adGroups/33"),
            ("adGroupAds", "customers/1234567890/adGroupAds/33~44"),
            ("adGroupCriteria", "customers/1234567890/adGroupCriteria/33~55"),
            ("campaignCriteria", "customers/1234567890/campaignCriteria/22~66"),
        ] {
            Mock::given(method("POST"))
                .and(path(format!("/v20/customers/1234567890/{}:mutate", collection)))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "results": [{"resourceName": resource}]
                })))
                .mount(&server)
                .await;
        }

        let ctx = TestContext::new(&server.uri()).await;
        link_customer(&ctx).await;

        let response = build_router(ctx.state.clone())
            .oneshot(post(&ctx, campaign_body(&["One", "Two", "Three"])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let json = read_json(response).await;
        assert_eq!(json["campaign_id"], "22");
        assert_eq!(json["budget_id"], "11");
    }
}
