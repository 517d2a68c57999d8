//! Integration tests for the Tessera HTTP API.
//!
//! Uses axum-test to test the API handlers without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::{HeaderValue, StatusCode, header::AUTHORIZATION};
use axum_test::TestServer;
use serde_json::{Value, json};
use tessera::api::{AppState, CorrelationResponse, HealthResponse, RemovedResponse, create_router};
use tessera::config::ApiSettings;
use tessera_core::objects::{ChatSubChannel, Cve, Domain, UserAccount};
use tessera_core::{AilObject, BasketEntry, Context, CoreSettings, ExportEvent};

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn open_api() -> ApiSettings {
    ApiSettings {
        rate_limit: 0,
        ..ApiSettings::default()
    }
}

fn new_context() -> Context {
    Context::in_memory(CoreSettings::new("https://ail.example.org"))
}

/// Create a test server over `ctx` with no auth and no rate limit.
fn create_test_server(ctx: &Context) -> TestServer {
    let router = create_router(AppState::new(ctx.clone()), &open_api());
    TestServer::new(router).unwrap()
}

/// A context holding one dated, tagged telegram account correlated with a CVE.
fn populated_context() -> Context {
    let ctx = new_context();
    let account = UserAccount::new("telegram", "4242").unwrap();
    account.update_seen(&ctx, 1_690_000_000).unwrap();
    account.update_seen(&ctx, 1_700_000_000).unwrap();
    account.add_tag(&ctx, "tlp:green").unwrap();

    let cve = Cve::new("CVE-2015-0410").unwrap();
    cve.update_seen(&ctx, 1_695_000_000).unwrap();
    account.add_correlation(&ctx, cve.global_id()).unwrap();
    ctx
}

fn bearer(key: &str) -> HeaderValue {
    format!("Bearer {}", key).parse::<HeaderValue>().unwrap()
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server(&new_context());

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

// =============================================================================
// OBJECT ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_object_meta_with_tags() {
    let server = create_test_server(&populated_context());

    let response = server
        .get("/object")
        .add_query_param("gid", "user-account:telegram:4242")
        .add_query_param("options", "tags,link")
        .await;

    response.assert_status_ok();
    let meta: Value = response.json();
    assert_eq!(meta["type"], "user-account");
    assert_eq!(meta["subtype"], "telegram");
    assert_eq!(meta["id"], "4242");
    assert_eq!(meta["first_seen"], 1_690_000_000);
    assert_eq!(meta["last_seen"], 1_700_000_000);
    assert_eq!(meta["tags"], json!(["tlp:green"]));
}

#[tokio::test]
async fn test_object_unknown_is_not_found() {
    let server = create_test_server(&new_context());

    let response = server
        .get("/object")
        .add_query_param("gid", "domain::never-seen.example")
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn test_object_malformed_gid_is_bad_request() {
    let server = create_test_server(&new_context());

    let response = server.get("/object").add_query_param("gid", "no-separator").await;
    response.assert_status_bad_request();

    let response = server
        .get("/object")
        .add_query_param("gid", "ship::enterprise")
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_object_correlations_grouped_by_type() {
    let server = create_test_server(&populated_context());

    let response = server
        .get("/object/correlations")
        .add_query_param("gid", "user-account:telegram:4242")
        .await;

    response.assert_status_ok();
    let result: CorrelationResponse = response.json();
    let cves = result.correlations.get("cve").unwrap();
    assert_eq!(cves.len(), 1);
    assert_eq!(cves.iter().next().unwrap().id(), "CVE-2015-0410");

    // The edge is visible from the other side too, under the same tag.
    let response = server
        .get("/object/correlations")
        .add_query_param("gid", "cve::CVE-2015-0410")
        .add_query_param("type", "cve")
        .await;
    let result: CorrelationResponse = response.json();
    let accounts = result.correlations.get("cve").unwrap();
    assert_eq!(accounts.iter().next().unwrap().id(), "4242");
}

// =============================================================================
// BASKET ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_basket_lifecycle() {
    let server = create_test_server(&new_context());

    let response = server
        .post("/basket/analyst")
        .json(&json!({"type": "user-account", "subtype": "telegram", "id": "4242", "lvl": 2}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let entry: BasketEntry = response.json();
    assert_eq!(entry.lvl, 2);

    server
        .post("/basket/analyst")
        .json(&json!({"type": "domain", "id": "x.example"}))
        .await
        .assert_status(StatusCode::CREATED);

    let entries: Vec<BasketEntry> = server.get("/basket/analyst").await.json();
    assert_eq!(entries.len(), 2);

    let response = server
        .delete("/basket/analyst/entry")
        .add_query_param("type", "domain")
        .add_query_param("id", "x.example")
        .await;
    response.assert_status_ok();
    let removed: RemovedResponse = response.json();
    assert!(removed.removed);

    let removed: RemovedResponse = server.delete("/basket/analyst").await.json();
    assert!(removed.removed);

    let entries: Vec<BasketEntry> = server.get("/basket/analyst").await.json();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_basket_level_is_sanitized() {
    let server = create_test_server(&new_context());

    let entry: BasketEntry = server
        .post("/basket/a")
        .json(&json!({"type": "cve", "id": "CVE-1", "lvl": 9}))
        .await
        .json();
    assert_eq!(entry.lvl, 0);

    let entry: BasketEntry = server
        .post("/basket/a")
        .json(&json!({"type": "cve", "id": "CVE-2", "lvl": "3"}))
        .await
        .json();
    assert_eq!(entry.lvl, 3);
}

#[tokio::test]
async fn test_object_rejects_subtype_on_flat_kind() {
    let server = create_test_server(&new_context());

    let response = server
        .get("/object")
        .add_query_param("gid", "domain:weird:x.example")
        .await;
    response.assert_status_bad_request();
}

// =============================================================================
// EXPORT PREVIEW TESTS
// =============================================================================

#[tokio::test]
async fn test_export_preview_from_gids() {
    let ctx = populated_context();
    ChatSubChannel::new("chat-uuid", "chat/1")
        .unwrap()
        .update_name(&ctx, "general", 10)
        .unwrap();
    let server = create_test_server(&ctx);

    let response = server
        .post("/export/preview")
        .json(&json!({
            "gids": [
                "user-account:telegram:4242",
                "chat-subchannel:chat-uuid:chat/1",
                "cve::CVE-2015-0410"
            ],
            "tags": ["tlp:green"],
            "distribution": 7,
            "threat_level": "2",
            "analysis": 1
        }))
        .await;

    response.assert_status_ok();
    let event: ExportEvent = response.json();
    assert_eq!(event.objects.len(), 2);
    assert_eq!(event.objects[0].name, "telegram-account");
    assert_eq!(event.objects[1].name, "vulnerability");
    assert_eq!(event.distribution, 0);
    assert_eq!(event.threat_level_id, 4);
    assert_eq!(event.analysis, 1);
    assert_eq!(event.tags[0].name, "tlp:green");
}

#[tokio::test]
async fn test_export_preview_from_basket() {
    let ctx = populated_context();
    Domain::new("c2.example").unwrap().update_seen(&ctx, 5).unwrap();
    let server = create_test_server(&ctx);

    server
        .post("/basket/analyst")
        .json(&json!({"type": "user-account", "subtype": "telegram", "id": "4242", "lvl": 1}))
        .await
        .assert_status(StatusCode::CREATED);

    let event: ExportEvent = server
        .post("/export/preview")
        .json(&json!({"actor": "analyst", "gids": ["domain::c2.example"]}))
        .await
        .json();

    let names: Vec<&str> = event.objects.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["domain-ip", "telegram-account", "vulnerability"]);
}

// =============================================================================
// AUTHENTICATION TESTS
// =============================================================================

fn create_auth_test_server(api_key: &str) -> TestServer {
    let api = ApiSettings {
        api_key: Some(api_key.to_string()),
        ..open_api()
    };
    TestServer::new(create_router(AppState::new(new_context()), &api)).unwrap()
}

#[tokio::test]
async fn test_auth_missing_header() {
    let server = create_auth_test_server("test-secret-key-12345");

    let response = server.get("/basket/analyst").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_invalid_key() {
    let server = create_auth_test_server("test-secret-key-12345");

    let response = server
        .get("/basket/analyst")
        .add_header(AUTHORIZATION, bearer("wrong-key"))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_valid_bearer_token() {
    let api_key = "test-secret-key-12345";
    let server = create_auth_test_server(api_key);

    let response = server
        .get("/basket/analyst")
        .add_header(AUTHORIZATION, bearer(api_key))
        .await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_auth_valid_raw_token() {
    let api_key = "test-raw-key-67890";
    let server = create_auth_test_server(api_key);

    let response = server
        .get("/basket/analyst")
        .add_header(AUTHORIZATION, api_key.parse::<HeaderValue>().unwrap())
        .await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_auth_health_is_exempt() {
    let server = create_auth_test_server("test-secret-key-12345");

    server.get("/health").await.assert_status_ok();
}

// =============================================================================
// RATE LIMIT TESTS
// =============================================================================

#[tokio::test]
async fn test_rate_limit_rejects_burst() {
    let api = ApiSettings {
        rate_limit: 1,
        ..ApiSettings::default()
    };
    let server = TestServer::new(create_router(AppState::new(new_context()), &api)).unwrap();

    server.get("/health").await.assert_status_ok();
    server
        .get("/health")
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}
