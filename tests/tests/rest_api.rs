//! REST surface tests: auth, tracking, recent feed, stats queries.

use axum::http::StatusCode;
use axum_test::TestServer;
use uuid::Uuid;

use event_store::EventStore;
use integration_tests::{fixtures, setup::TestContext};

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

#[tokio::test]
async fn track_requires_a_bearer_token() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("test server");

    let response = server
        .post("/api/activities/track")
        .json(&fixtures::page_view("/home"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .post("/api/activities/track")
        .add_header("Authorization", "Bearer not-a-real-token")
        .json(&fixtures::page_view("/home"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn page_view_returns_created_with_an_event_id() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("test server");
    let token = ctx.user_token("u-1");

    let response = server
        .post("/api/activities/track")
        .add_header("Authorization", bearer(&token))
        .json(&fixtures::page_view("/home"))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body: serde_json::Value = response.json();
    assert!(body["id"].as_str().is_some(), "response carries the event id");
    assert!(
        body.get("sessionId").is_none() || body["sessionId"].is_null(),
        "no session opened by a bare page view"
    );
}

#[tokio::test]
async fn session_lifecycle_over_the_wire() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("test server");
    let token = ctx.user_token("u-1");

    // session_start opens a session
    let response = server
        .post("/api/activities/track")
        .add_header("Authorization", bearer(&token))
        .json(&fixtures::signal("session_start"))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    let session_id = body["sessionId"].as_str().expect("session id").to_string();

    // a page view in that session references it
    let response = server
        .post("/api/activities/track")
        .add_header("Authorization", bearer(&token))
        .json(&fixtures::page_view_in_session("/settings", &session_id))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["sessionId"].as_str(), Some(session_id.as_str()));

    // session_end closes it
    let response = server
        .post("/api/activities/track")
        .add_header("Authorization", bearer(&token))
        .json(&fixtures::session_end(&session_id))
        .await;
    response.assert_status(StatusCode::CREATED);

    let session = ctx
        .store
        .find_session(session_id.parse::<Uuid>().unwrap())
        .await
        .unwrap()
        .expect("session exists");
    assert!(!session.is_active);
    assert!(session.ended_at.is_some());
}

#[tokio::test]
async fn ending_an_unknown_session_still_records_the_event() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("test server");
    let token = ctx.user_token("u-1");

    let response = server
        .post("/api/activities/track")
        .add_header("Authorization", bearer(&token))
        .json(&fixtures::session_end(&Uuid::new_v4().to_string()))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body: serde_json::Value = response.json();
    assert!(body["id"].as_str().is_some());
}

#[tokio::test]
async fn recent_feed_is_newest_first_and_bounded() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("test server");
    let token = ctx.user_token("u-1");

    for i in 0..5 {
        server
            .post("/api/activities/track")
            .add_header("Authorization", bearer(&token))
            .json(&fixtures::page_view(&format!("/page-{i}")))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let response = server
        .get("/api/activities/recent?limit=3")
        .add_header("Authorization", bearer(&token))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    let activities = body["activities"].as_array().expect("activities array");
    assert_eq!(activities.len(), 3);
    assert_eq!(activities[0]["page"], "/page-4", "newest first");
    assert_eq!(activities[2]["page"], "/page-2");
}

#[tokio::test]
async fn synthetic_create_is_admin_only() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("test server");

    let response = server
        .post("/api/activities")
        .add_header("Authorization", bearer(&ctx.user_token("u-1")))
        .json(&fixtures::synthetic_event("u-9", "/imported"))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = server
        .post("/api/activities")
        .add_header("Authorization", bearer(&ctx.admin_token()))
        .json(&fixtures::synthetic_event("u-9", "/imported"))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body: serde_json::Value = response.json();
    assert_eq!(body["userId"], "u-9");
    assert_eq!(body["type"], "click");
}

#[tokio::test]
async fn overview_counts_the_window() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("test server");

    for user in ["u-1", "u-2"] {
        let token = ctx.user_token(user);
        server
            .post("/api/activities/track")
            .add_header("Authorization", bearer(&token))
            .json(&fixtures::signal("session_start"))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let response = server
        .get("/api/stats/overview")
        .add_header("Authorization", bearer(&ctx.user_token("u-1")))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["eventsCount"], 2);
    assert_eq!(body["uniqueUsers"], 2);
    assert_eq!(body["totalUsers"], 2);
    assert_eq!(body["activeSessions"], 2);
    assert_eq!(body["windowMinutes"], 60);
}

#[tokio::test]
async fn timeseries_echoes_clamped_parameters() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("test server");
    let token = ctx.user_token("u-1");

    let response = server
        .get("/api/stats/timeseries")
        .add_header("Authorization", bearer(&token))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["intervalMinutes"], 5);
    assert_eq!(body["totalMinutes"], 60);

    // out-of-range values clamp instead of erroring
    let response = server
        .get("/api/stats/timeseries?intervalMinutes=100000&totalMinutes=100000")
        .add_header("Authorization", bearer(&token))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["intervalMinutes"], 1440);
    assert_eq!(body["totalMinutes"], 10080);
}

#[tokio::test]
async fn breakdowns_default_unknown_dimensions() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("test server");
    let token = ctx.user_token("u-1");

    // one event with device/location, one with nothing
    server
        .post("/api/activities/track")
        .add_header("Authorization", bearer(&token))
        .json(&fixtures::page_view("/a"))
        .await
        .assert_status(StatusCode::CREATED);
    server
        .post("/api/activities/track")
        .add_header("Authorization", bearer(&token))
        .json(&fixtures::signal("click"))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server
        .get("/api/stats/devices")
        .add_header("Authorization", bearer(&token))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let devices = body["devices"].as_array().expect("devices array");
    assert_eq!(devices.len(), 2);
    assert!(devices
        .iter()
        .any(|d| d["os"] == "unknown" && d["browser"] == "unknown"));

    let response = server
        .get("/api/stats/locations")
        .add_header("Authorization", bearer(&token))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let locations = body["locations"].as_array().expect("locations array");
    assert!(locations.iter().any(|l| l["country"] == "DE"));
    assert!(locations.iter().any(|l| l["country"] == "unknown"));
}
