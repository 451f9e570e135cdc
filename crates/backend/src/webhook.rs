//! Pub/Sub push notifications about account link changes.
//!
//! Bodies are decoded into a [`WebhookPayload`] and normalized into a
//! [`WebhookOutcome`] before anything is written.

use std::sync::OnceLock;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use shared_types::{AccountLinkStatus, StatusSource};
use thiserror::Error;

use crate::auth::constant_time_eq;
use crate::AppState;

pub const IGNORED_SYSTEM_EVENT: &str = "Ignored system event";
pub const NO_CUSTOMER_ID: &str = "No customer ID";

fn customer_resource_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"customers/(\d{3}-?\d{3}-?\d{4}|\d{10})").expect("valid customer regex")
    })
}

fn bare_customer_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^\d{3}-?\d{3}-?\d{4}$").expect("valid customer regex"))
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("Body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Pub/Sub message has no data")]
    MissingData,

    #[error("Pub/Sub data is not valid base64: {0}")]
    InvalidBase64(String),

    #[error("Unrecognized payload shape")]
    UnknownShape,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProtoPayload {
    #[serde(default)]
    pub method_name: Option<String>,
    #[serde(default)]
    pub resource_name: Option<String>,
    #[serde(default)]
    pub request: Option<Value>,
}

/// Cloud Audit Log entry as exported through a log sink.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub proto_payload: ProtoPayload,
}

/// Hand-written payload used to exercise the endpoint.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestPayload {
    #[serde(default)]
    pub method_name: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub resource_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookPayload {
    /// Pub/Sub push envelope; `data` is the decoded inner payload
    Envelope {
        message_id: Option<String>,
        data: Box<WebhookPayload>,
    },
    AuditLog(AuditLogEntry),
    Test(TestPayload),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Customer ID as it appeared in the payload
    pub customer_id: String,
    pub status: AccountLinkStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Update(StatusUpdate),
    Ignored(&'static str),
}

#[derive(Debug, Deserialize)]
struct PubSubEnvelope {
    message: PubSubMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PubSubMessage {
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    message_id: Option<String>,
}

/// Decode a push body into one of the known payload shapes.
pub fn decode(body: &[u8]) -> Result<WebhookPayload, WebhookError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| WebhookError::InvalidJson(e.to_string()))?;

    if value.get("message").is_some_and(Value::is_object) {
        let envelope: PubSubEnvelope =
            serde_json::from_value(value).map_err(|e| WebhookError::InvalidJson(e.to_string()))?;
        let data = envelope
            .message
            .data
            .filter(|d| !d.is_empty())
            .ok_or(WebhookError::MissingData)?;
        let bytes = STANDARD
            .decode(data.as_bytes())
            .or_else(|_| URL_SAFE.decode(data.as_bytes()))
            .map_err(|e| WebhookError::InvalidBase64(e.to_string()))?;
        let inner: Value = serde_json::from_slice(&bytes)
            .map_err(|e| WebhookError::InvalidJson(e.to_string()))?;

        return Ok(WebhookPayload::Envelope {
            message_id: envelope.message.message_id,
            data: Box::new(decode_inner(inner)?),
        });
    }

    decode_inner(value)
}

fn decode_inner(value: Value) -> Result<WebhookPayload, WebhookError> {
    if value.get("protoPayload").is_some_and(Value::is_object) {
        let entry: AuditLogEntry =
            serde_json::from_value(value).map_err(|e| WebhookError::InvalidJson(e.to_string()))?;
        return Ok(WebhookPayload::AuditLog(entry));
    }

    let is_test = ["methodName", "customerId", "status", "resourceName"]
        .iter()
        .any(|key| value.get(key).is_some());
    if is_test {
        let payload: TestPayload =
            serde_json::from_value(value).map_err(|e| WebhookError::InvalidJson(e.to_string()))?;
        return Ok(WebhookPayload::Test(payload));
    }

    Err(WebhookError::UnknownShape)
}

/// Customer ID referenced by a `customers/{id}` resource path.
pub fn extract_customer_id(text: &str) -> Option<String> {
    customer_resource_regex()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Status carried by a link mutation request, if any.
fn requested_link_status(request: &Value) -> Option<String> {
    let operation = request.get("operation").unwrap_or(request);
    ["update", "create"]
        .iter()
        .filter_map(|kind| operation.get(kind))
        .chain(std::iter::once(request))
        .find_map(|node| node.get("status").and_then(Value::as_str))
        .map(str::to_string)
}

/// Map a method name and optional explicit status to the status to write.
pub fn classify(
    method_name: Option<&str>,
    customer_id: Option<String>,
    explicit_status: Option<&str>,
) -> WebhookOutcome {
    let method = method_name.unwrap_or_default();
    if method.contains("UpdateSink") {
        return WebhookOutcome::Ignored(IGNORED_SYSTEM_EVENT);
    }

    let Some(customer_id) = customer_id else {
        return WebhookOutcome::Ignored(NO_CUSTOMER_ID);
    };

    let status = if method.contains("CreateCustomerManagerLink") {
        AccountLinkStatus::Pending
    } else if method.contains("MutateCustomerManagerLink") || method.contains("AccountLinkService") {
        AccountLinkStatus::RefreshNeeded
    } else {
        explicit_status
            .and_then(AccountLinkStatus::from_str)
            .unwrap_or(AccountLinkStatus::RefreshNeeded)
    };

    WebhookOutcome::Update(StatusUpdate {
        customer_id,
        status,
    })
}

/// Reduce a decoded payload to the single change it asks for.
pub fn normalize(payload: &WebhookPayload) -> WebhookOutcome {
    match payload {
        WebhookPayload::Envelope { data, .. } => normalize(data),
        WebhookPayload::AuditLog(entry) => {
            let proto = &entry.proto_payload;
            let customer_id = proto
                .resource_name
                .as_deref()
                .and_then(extract_customer_id)
                .or_else(|| {
                    proto
                        .request
                        .as_ref()
                        .and_then(|r| r.get("customerId"))
                        .and_then(Value::as_str)
                        .filter(|id| bare_customer_regex().is_match(id))
                        .map(str::to_string)
                });
            let explicit = proto.request.as_ref().and_then(requested_link_status);
            classify(proto.method_name.as_deref(), customer_id, explicit.as_deref())
        }
        WebhookPayload::Test(test) => {
            let customer_id = test
                .customer_id
                .as_deref()
                .map(str::trim)
                .filter(|id| bare_customer_regex().is_match(id))
                .map(str::to_string)
                .or_else(|| test.resource_name.as_deref().and_then(extract_customer_id));
            classify(
                test.method_name.as_deref(),
                customer_id,
                test.status.as_deref(),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WebhookQuery {
    pub token: Option<String>,
}

fn verify_token(headers: &HeaderMap, query: &WebhookQuery, expected: &str) -> bool {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    bearer
        .or(query.token.as_deref())
        .is_some_and(|presented| constant_time_eq(presented.as_bytes(), expected.as_bytes()))
}

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

/// Pub/Sub push endpoint.
pub async fn receive(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(expected) = state.config.pubsub_verification_token.as_deref() else {
        tracing::error!("PUBSUB_VERIFICATION_TOKEN is not configured; rejecting push");
        return reply(
            StatusCode::UNAUTHORIZED,
            json!({"success": false, "message": "Unauthorized"}),
        );
    };

    if !verify_token(&headers, &query, expected) {
        tracing::warn!("Rejected webhook push with invalid token");
        return reply(
            StatusCode::UNAUTHORIZED,
            json!({"success": false, "message": "Unauthorized"}),
        );
    }

    let payload = match decode(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Undecodable webhook body: {}", e);
            return reply(
                StatusCode::BAD_REQUEST,
                json!({"success": false, "message": e.to_string()}),
            );
        }
    };

    let update = match normalize(&payload) {
        WebhookOutcome::Ignored(reason) => {
            tracing::debug!("Webhook ignored: {}", reason);
            return reply(StatusCode::OK, json!({"success": true, "message": reason}));
        }
        WebhookOutcome::Update(update) => update,
    };

    match state
        .store
        .update_status(&update.customer_id, None, update.status, StatusSource::Webhook)
        .await
    {
        Ok(updated) => {
            tracing::info!(
                customer_id = %update.customer_id,
                status = %update.status,
                updated,
                "Applied webhook status update"
            );
            reply(
                StatusCode::OK,
                json!({
                    "success": true,
                    "customer_id": update.customer_id,
                    "status": update.status,
                    "updated": updated,
                }),
            )
        }
        Err(e) => {
            tracing::error!(customer_id = %update.customer_id, "Failed to apply webhook update: {:?}", e);
            reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"success": false, "message": "Failed to update status"}),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::build_router;
    use crate::test_helpers::{read_json, TestContext, PUBSUB_TOKEN};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn envelope(inner: Value) -> Vec<u8> {
        let data = STANDARD.encode(serde_json::to_vec(&inner).unwrap());
        serde_json::to_vec(&json!({
            "message": {"data": data, "messageId": "42"},
            "subscription": "projects/furriyadh/subscriptions/ads-links"
        }))
        .unwrap()
    }

    fn audit_log(method: &str, resource: &str) -> Value {
        json!({
            "protoPayload": {
                "methodName": method,
                "resourceName": resource
            }
        })
    }

    #[test]
    fn test_envelope_extracts_matched_customer_id() {
        let body = envelope(audit_log(
            "google.ads.googleads.v20.services.CustomerClientLinkService.MutateCustomerClientLink",
            "customers/123-456-7890/customerClientLinks/999",
        ));
        let payload = decode(&body).unwrap();
        assert!(matches!(payload, WebhookPayload::Envelope { .. }));

        match normalize(&payload) {
            WebhookOutcome::Update(update) => assert_eq!(update.customer_id, "123-456-7890"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_raw_audit_log_decodes() {
        let body = serde_json::to_vec(&audit_log(
            "CustomerManagerLinkService.CreateCustomerManagerLink",
            "customers/1234567890/customerManagerLinks/1",
        ))
        .unwrap();
        let payload = decode(&body).unwrap();
        assert!(matches!(payload, WebhookPayload::AuditLog(_)));
        assert_eq!(
            normalize(&payload),
            WebhookOutcome::Update(StatusUpdate {
                customer_id: "1234567890".into(),
                status: AccountLinkStatus::Pending,
            })
        );
    }

    #[test]
    fn test_update_sink_is_ignored() {
        let outcome = classify(
            Some("google.logging.v2.ConfigServiceV2.UpdateSink"),
            Some("1234567890".into()),
            None,
        );
        assert_eq!(outcome, WebhookOutcome::Ignored(IGNORED_SYSTEM_EVENT));
    }

    #[test]
    fn test_missing_customer_is_ignored() {
        let payload = WebhookPayload::Test(TestPayload {
            method_name: Some("SomethingElse".into()),
            ..TestPayload::default()
        });
        assert_eq!(normalize(&payload), WebhookOutcome::Ignored(NO_CUSTOMER_ID));
    }

    #[test]
    fn test_explicit_status_applies_for_other_methods() {
        let body = br#"{"customerId": "111-222-3333", "status": "suspended"}"#;
        let payload = decode(body).unwrap();
        assert_eq!(
            normalize(&payload),
            WebhookOutcome::Update(StatusUpdate {
                customer_id: "111-222-3333".into(),
                status: AccountLinkStatus::Suspended,
            })
        );
    }

    #[test]
    fn test_unknown_status_falls_back_to_refresh_needed() {
        let outcome = classify(None, Some("1112223333".into()), Some("WHATEVER"));
        assert_eq!(
            outcome,
            WebhookOutcome::Update(StatusUpdate {
                customer_id: "1112223333".into(),
                status: AccountLinkStatus::RefreshNeeded,
            })
        );
    }

    #[test]
    fn test_link_mutation_status_is_read_from_request() {
        let payload = WebhookPayload::AuditLog(AuditLogEntry {
            proto_payload: ProtoPayload {
                method_name: Some("CustomerClientLinkService.MutateCustomerClientLink".into()),
                resource_name: Some("customers/9998887777".into()),
                request: Some(json!({"operation": {"update": {"status": "ACTIVE"}}})),
            },
        });
        assert_eq!(
            normalize(&payload),
            WebhookOutcome::Update(StatusUpdate {
                customer_id: "9998887777".into(),
                status: AccountLinkStatus::Active,
            })
        );
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(decode(b"not json"), Err(WebhookError::InvalidJson(_))));
        assert_eq!(decode(br#"{"hello": 1}"#), Err(WebhookError::UnknownShape));
        assert_eq!(
            decode(br#"{"message": {"messageId": "1"}}"#),
            Err(WebhookError::MissingData)
        );
        assert!(matches!(
            decode(br#"{"message": {"data": "***"}}"#),
            Err(WebhookError::InvalidBase64(_))
        ));
    }

    #[test]
    fn test_customer_regex_forms() {
        assert_eq!(
            extract_customer_id("customers/1234567890/campaigns/5").as_deref(),
            Some("1234567890")
        );
        assert_eq!(
            extract_customer_id("customers/123-456-7890").as_deref(),
            Some("123-456-7890")
        );
        assert_eq!(extract_customer_id("customers/12345"), None);
    }

    fn push(body: Vec<u8>, bearer: Option<&str>, query: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(format!("/api/google-ads/batch-refresh-statuses{}", query))
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_push_updates_status_for_every_user() {
        let ctx = TestContext::new("http://127.0.0.1:9").await;
        let body = envelope(audit_log(
            "google.ads.googleads.v20.services.CustomerManagerLinkService.MutateCustomerManagerLink",
            "customers/123-456-7890/customerManagerLinks/555~1",
        ));

        let response = build_router(ctx.state.clone())
            .oneshot(push(body, Some(PUBSUB_TOKEN), ""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["status"], "REFRESH_NEEDED");

        assert_eq!(
            ctx.store.status_updates(),
            vec![(
                "123-456-7890".to_string(),
                None,
                AccountLinkStatus::RefreshNeeded,
                StatusSource::Webhook
            )]
        );
    }

    #[tokio::test]
    async fn test_push_accepts_query_token() {
        let ctx = TestContext::new("http://127.0.0.1:9").await;
        let body = br#"{"customerId": "1234567890", "status": "ENABLED"}"#.to_vec();

        let response = build_router(ctx.state.clone())
            .oneshot(push(body, None, &format!("?token={}", PUBSUB_TOKEN)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(ctx.store.status_updates().len(), 1);
    }

    #[tokio::test]
    async fn test_push_ignores_update_sink_without_writing() {
        let ctx = TestContext::new("http://127.0.0.1:9").await;
        let body = envelope(audit_log(
            "google.logging.v2.ConfigServiceV2.UpdateSink",
            "customers/1234567890",
        ));

        let response = build_router(ctx.state.clone())
            .oneshot(push(body, Some(PUBSUB_TOKEN), ""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json, json!({"success": true, "message": "Ignored system event"}));
        assert!(ctx.store.status_updates().is_empty());
    }

    #[tokio::test]
    async fn test_push_rejects_bad_token() {
        let ctx = TestContext::new("http://127.0.0.1:9").await;
        let body = br#"{"customerId": "1234567890"}"#.to_vec();

        let response = build_router(ctx.state.clone())
            .oneshot(push(body, Some("wrong"), ""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(ctx.store.status_updates().is_empty());
    }

    #[tokio::test]
    async fn test_push_rejects_undecodable_body() {
        let ctx = TestContext::new("http://127.0.0.1:9").await;

        let response = build_router(ctx.state.clone())
            .oneshot(push(b"{]".to_vec(), Some(PUBSUB_TOKEN), ""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
