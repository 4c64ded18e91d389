//! Dashboard client tests against a real server socket: REST baseline,
//! realtime channel, coalesced feed, debounced stats re-pull.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::sleep;
use uuid::Uuid;

use dashboard_client::{ClientConfig, DashboardClient};
use event_store::EventStore;
use integration_tests::setup::TestContext;

async fn spawn_server(ctx: &TestContext) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let router = ctx.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    addr
}

fn fast_config(addr: SocketAddr, token: String) -> ClientConfig {
    let mut config = ClientConfig::new(format!("http://{addr}"), token);
    config.feed_coalesce = Duration::from_millis(20);
    config.stats_debounce = Duration::from_millis(20);
    config
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test]
async fn client_tracks_and_sees_its_own_activity_live() {
    let ctx = TestContext::new().await;
    let addr = spawn_server(&ctx).await;

    let client = DashboardClient::new(fast_config(addr, ctx.user_token("u-1")));
    client.connect().await.expect("connect");
    assert!(client.is_live(), "realtime channel attached");

    let session_id = client.start_session().await.expect("session opens");

    assert!(client.track_page_view("/home").await.expect("track"));
    assert!(
        !client.track_page_view("/home").await.expect("track"),
        "same consecutive path is deduplicated"
    );
    assert!(client.track_page_view("/about").await.expect("track"));

    // session_start + two page views flow back through the channel
    wait_until("feed to fill", || client.snapshot().activities.len() >= 3).await;
    let snapshot = client.snapshot();
    assert_eq!(
        snapshot.activities[0].page.as_deref(),
        Some("/about"),
        "newest first"
    );

    // a stats push marks the aggregates dirty and the re-pull lands
    wait_until("overview to converge", || {
        client
            .snapshot()
            .overview
            .map(|o| o.events_count >= 3)
            .unwrap_or(false)
    })
    .await;

    client.end_session();
    let id: Uuid = session_id.parse().expect("session id is a uuid");
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    loop {
        let closed = ctx
            .store
            .find_session(id)
            .await
            .ok()
            .flatten()
            .map(|s| !s.is_active)
            .unwrap_or(false);
        if closed {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for the session to close"
        );
        sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test]
async fn bad_token_fails_the_baseline_pull() {
    let ctx = TestContext::new().await;
    let addr = spawn_server(&ctx).await;

    let client = DashboardClient::new(fast_config(addr, "not-a-token".to_string()));
    assert!(client.connect().await.is_err());
    assert!(!client.is_live());
}

#[tokio::test]
async fn client_degrades_to_rest_when_the_channel_is_refused() {
    let ctx = TestContext::new().await;
    let addr = spawn_server(&ctx).await;

    // seed one event so the baseline has something to show
    let seed = DashboardClient::new(fast_config(addr, ctx.user_token("u-9")));
    seed.connect().await.expect("connect");
    seed.track_page_view("/seeded").await.expect("track");
    seed.disconnect();

    // drop the channel; the client must keep serving over REST
    let client = DashboardClient::new(fast_config(addr, ctx.user_token("u-1")));
    client.connect().await.expect("connect");
    client.disconnect();
    assert!(!client.is_live());

    assert!(client.track_page_view("/rest-only").await.expect("track"));
    let snapshot = client.snapshot();
    assert!(
        snapshot.overview.is_some(),
        "baseline aggregates survive without the channel"
    );
}
