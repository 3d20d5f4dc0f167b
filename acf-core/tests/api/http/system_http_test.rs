//! Directory introspection HTTP Handler Tests

use super::{build_test_router, get_json, post_empty, post_json, TestAppState};
use crate::api::{orders_hosts, REALM};
use axum::http::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_trusts() {
    let app = build_test_router(TestAppState::new(&[]));

    let (status, body): (StatusCode, Option<Value>) = get_json(&app, "/api/trusts").await;

    assert_eq!(status, StatusCode::OK);
    let data = &body.unwrap()["data"];
    assert_eq!(data.as_array().unwrap().len(), 1);
    assert_eq!(data[0]["realm"], REALM);
}

#[tokio::test]
async fn test_status_counts() {
    let app = build_test_router(TestAppState::new(&orders_hosts()));
    let _: (StatusCode, Option<Value>) = post_json(
        &app,
        "/api/applications",
        &json!({ "name": "orders", "realms": [REALM] }),
    )
    .await;
    let _: (StatusCode, Option<Value>) =
        post_empty(&app, "/api/applications/orders/apply").await;
    let (status, _): (StatusCode, Option<Value>) = post_json(
        &app,
        "/api/temporary-access/requests",
        &json!({
            "user": "alice",
            "realm": REALM,
            "application": "orders",
            "environment": "PRD",
            "role": "full",
            "duration_hours": 1,
            "reason": null,
            "requested_by": null,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body): (StatusCode, Option<Value>) = get_json(&app, "/api/status").await;

    assert_eq!(status, StatusCode::OK);
    let data = &body.unwrap()["data"];
    assert_eq!(data["directory_connected"], true);
    assert_eq!(data["applications_count"], 1);
    assert_eq!(data["hosts_count"], 5);
    assert_eq!(data["trusts_count"], 1);
    assert_eq!(data["temporary_access"]["pending"], 1);
    assert_eq!(data["temporary_access"]["approved"], 0);
    assert_eq!(data["temporary_access"]["revoked"], 0);
}

#[tokio::test]
async fn test_access_check_without_rules() {
    let app = build_test_router(TestAppState::new(&orders_hosts()));

    let (status, body): (StatusCode, Option<Value>) = post_json(
        &app,
        "/api/test",
        &json!({
            "user": "mallory",
            "domain": REALM,
            "target_host": "orders-prd-01.corp.example",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body.unwrap()["data"];
    assert_eq!(data["user"], "mallory@CORP.EXAMPLE");
    assert_eq!(data["command"], "sudo -l");
    assert_eq!(data["hbac"]["granted"], false);
    assert_eq!(data["sudo_checked"], false);
}

#[tokio::test]
async fn test_access_check_rejects_empty_host() {
    let app = build_test_router(TestAppState::new(&[]));

    let (status, _): (StatusCode, Option<Value>) = post_json(
        &app,
        "/api/test",
        &json!({ "user": "alice", "domain": REALM, "target_host": "" }),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_export_document() {
    let app = build_test_router(TestAppState::new(&[]));
    let _: (StatusCode, Option<Value>) = post_json(
        &app,
        "/api/applications",
        &json!({ "name": "orders", "realms": [REALM] }),
    )
    .await;

    let (status, body): (StatusCode, Option<Value>) = get_json(&app, "/api/export").await;

    assert_eq!(status, StatusCode::OK);
    let export = body.unwrap();
    assert_eq!(export["format"], "json");
    assert!(export["exported_at"].is_string());
    let document = &export["configuration"];
    assert_eq!(document["version"], "1.0");
    assert!(document["applications"]["orders"].is_object());
    assert_eq!(document["temporary_requests"], json!([]));
}
