//! Temporary Access API HTTP Handler Tests

use super::{build_test_router, get_json, post_empty, post_json, TestAppState};
use crate::api::{orders_hosts, RecordingDirectory, REALM};
use axum::{http::StatusCode, Router};
use serde_json::{json, Value};
use std::sync::Arc;

/// Router with `orders` declared and provisioned
async fn orders_router() -> (Router, Arc<RecordingDirectory>) {
    let state = TestAppState::new(&orders_hosts());
    let directory = state.directory.clone();
    let app = build_test_router(state);

    let (status, _): (StatusCode, Option<Value>) = post_json(
        &app,
        "/api/applications",
        &json!({ "name": "orders", "realms": [REALM] }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _): (StatusCode, Option<Value>) =
        post_empty(&app, "/api/applications/orders/apply").await;
    assert_eq!(status, StatusCode::OK);

    (app, directory)
}

fn grant_body() -> Value {
    json!({
        "user": "alice",
        "realm": REALM,
        "application": "orders",
        "environment": "dev",
        "role": "readonly",
        "duration_hours": 2,
        "reason": "incident review",
        "requested_by": "bob",
    })
}

async fn grant(app: &Router) -> String {
    let (status, body): (StatusCode, Option<Value>) =
        post_json(app, "/api/temporary-access", &grant_body()).await;
    assert_eq!(status, StatusCode::CREATED);
    body.unwrap()["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_grant_creates_approved_request() {
    let (app, directory) = orders_router().await;

    let (status, body): (StatusCode, Option<Value>) =
        post_json(&app, "/api/temporary-access", &grant_body()).await;

    assert_eq!(status, StatusCode::CREATED);
    let data = &body.unwrap()["data"];
    assert_eq!(data["status"], "approved");
    assert_eq!(data["environment"], "DEV");
    assert_eq!(data["approved_by"], "bob");
    assert!(data["expires_at"].is_string());
    // One ephemeral graph next to the nine permanent cells
    assert_eq!(directory.sudo_rule_count().await, 10);
}

#[tokio::test]
async fn test_grant_unknown_application() {
    let (app, _) = orders_router().await;
    let mut body = grant_body();
    body["application"] = json!("billing");

    let (status, _): (StatusCode, Option<Value>) =
        post_json(&app, "/api/temporary-access", &body).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_grant_beyond_maximum_duration() {
    let (app, _) = orders_router().await;
    let mut body = grant_body();
    body["duration_hours"] = json!(500);

    let (status, body): (StatusCode, Option<Value>) =
        post_json(&app, "/api/temporary-access", &body).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body.unwrap()["error"], "validation");
}

#[tokio::test]
async fn test_grant_undeclared_environment() {
    let (app, _) = orders_router().await;
    let mut body = grant_body();
    body["environment"] = json!("STG");

    let (status, body): (StatusCode, Option<Value>) =
        post_json(&app, "/api/temporary-access", &body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.unwrap()["error"], "bad_request");
}

#[tokio::test]
async fn test_list_filters_by_status() {
    let (app, _) = orders_router().await;
    grant(&app).await;
    let (status, _): (StatusCode, Option<Value>) =
        post_json(&app, "/api/temporary-access/requests", &grant_body()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body): (StatusCode, Option<Value>) =
        get_json(&app, "/api/temporary-access").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["data"].as_array().unwrap().len(), 2);

    let (_, body): (StatusCode, Option<Value>) =
        get_json(&app, "/api/temporary-access?status=approved").await;
    let data = body.unwrap()["data"].clone();
    assert_eq!(data.as_array().unwrap().len(), 1);
    assert_eq!(data[0]["status"], "approved");

    let (_, body): (StatusCode, Option<Value>) =
        get_json(&app, "/api/temporary-access?status=pending").await;
    assert_eq!(body.unwrap()["data"][0]["status"], "pending");
}

#[tokio::test]
async fn test_list_with_unknown_status() {
    let (app, _) = orders_router().await;

    let (status, body): (StatusCode, Option<Value>) =
        get_json(&app, "/api/temporary-access?status=forgotten").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.unwrap()["error"], "bad_request");
}

#[tokio::test]
async fn test_revoke_then_revoke_again() {
    let (app, directory) = orders_router().await;
    let id = grant(&app).await;

    let (status, body): (StatusCode, Option<Value>) = post_json(
        &app,
        &format!("/api/temporary-access/{}/revoke", id),
        &json!({ "actor": "carol" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let data = &body.unwrap()["data"];
    assert_eq!(data["status"], "revoked");
    assert_eq!(data["revoked_by"], "carol");
    assert_eq!(directory.sudo_rule_count().await, 9);

    let (status, body): (StatusCode, Option<Value>) =
        post_empty(&app, &format!("/api/temporary-access/{}/revoke", id)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body.unwrap()["error"], "invalid_state_transition");
}

#[tokio::test]
async fn test_request_then_deny() {
    let (app, directory) = orders_router().await;

    let (status, body): (StatusCode, Option<Value>) =
        post_json(&app, "/api/temporary-access/requests", &grant_body()).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body.unwrap()["data"]["id"].as_str().unwrap().to_string();
    // Nothing is provisioned for a pending request
    assert_eq!(directory.sudo_rule_count().await, 9);

    let (status, body): (StatusCode, Option<Value>) =
        post_empty(&app, &format!("/api/temporary-access/{}/deny", id)).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body.unwrap()["data"];
    assert_eq!(data["status"], "denied");
    assert_eq!(data["denied_by"], "admin");

    let (status, _): (StatusCode, Option<Value>) =
        post_empty(&app, &format!("/api/temporary-access/{}/approve", id)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_request_then_approve() {
    let (app, directory) = orders_router().await;
    let (_, body): (StatusCode, Option<Value>) =
        post_json(&app, "/api/temporary-access/requests", &grant_body()).await;
    let id = body.unwrap()["data"]["id"].as_str().unwrap().to_string();

    let (status, body): (StatusCode, Option<Value>) = post_json(
        &app,
        &format!("/api/temporary-access/{}/approve", id),
        &json!({ "actor": "dave" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body.unwrap()["data"];
    assert_eq!(data["status"], "approved");
    assert_eq!(data["approved_by"], "dave");
    assert_eq!(directory.sudo_rule_count().await, 10);

    let (status, body): (StatusCode, Option<Value>) =
        get_json(&app, &format!("/api/temporary-access/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["data"]["status"], "approved");
}

#[tokio::test]
async fn test_get_unknown_request() {
    let (app, _) = orders_router().await;

    let (status, _): (StatusCode, Option<Value>) = get_json(
        &app,
        "/api/temporary-access/6f1c2a3e-9d4b-4c1e-8f00-000000000000",
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sweep_endpoint_leaves_live_grants() {
    let (app, _) = orders_router().await;
    grant(&app).await;

    let (status, body): (StatusCode, Option<Value>) =
        post_empty(&app, "/api/temporary-access/sweep").await;

    assert_eq!(status, StatusCode::OK);
    let data = &body.unwrap()["data"];
    assert_eq!(data["due"], 0);
    assert_eq!(data["expired"], json!([]));
    assert!(data.get("skipped").is_none());
}
