//! Health endpoint tests.

use axum::http::StatusCode;
use axum_test::TestServer;

use integration_tests::setup::TestContext;

#[tokio::test]
async fn health_reports_structure_and_status() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("test server");

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert!(body.get("status").is_some());
    assert!(body.get("store_connected").is_some());
    assert!(body.get("relay_healthy").is_some());

    let status = body["status"].as_str().unwrap_or("");
    assert!(
        status == "healthy" || status == "degraded" || status == "unhealthy",
        "unexpected status '{status}'"
    );
    assert_eq!(body["store_connected"], true);
}

#[tokio::test]
async fn liveness_is_always_ok_while_serving() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("test server");

    server.get("/health/live").await.assert_status_ok();
}

#[tokio::test]
async fn readiness_follows_component_state() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("test server");

    let response = server.get("/health/ready").await;
    let status = response.status_code();
    assert!(
        status == StatusCode::OK || status == StatusCode::SERVICE_UNAVAILABLE,
        "ready returns 200 or 503, got {status}"
    );
}
