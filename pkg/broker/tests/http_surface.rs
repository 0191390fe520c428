//! Handler-level tests against the axum router, in the style of the
//! reference registry's `tower::ServiceExt::oneshot` tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use broker_core::BrokerConfig;
use broker_store::MemoryStore;
use tower::ServiceExt;

use broker::app::BrokerApp;
use broker::dissemination::Dissemination;
use broker::election::Election;
use broker::failure_detector::FailureDetector;
use broker::membership::Membership;
use broker::peer_client::PeerClient;
use broker::retry;

fn make_app(self_id: u64) -> Arc<BrokerApp> {
    let config = BrokerConfig {
        broker_id: self_id,
        port: 3000 + (self_id - 1) as u16,
        host: "0.0.0.0".to_string(),
        peer_host: "127.0.0.1".to_string(),
        registry: None,
        peers: vec![],
        spanning_tree: None,
        heartbeat_interval_ms: 5_000,
        probe_timeout_ms: 2_000,
        membership_interval_ms: 10_000,
        fanout_timeout_ms: 2_000,
        retry_capacity: 16,
        retry_max_attempts: 3,
        retry_backoff_base_ms: 10,
        log_format: broker_core::LogFormat::Pretty,
    };

    let store = Arc::new(MemoryStore::default());
    let peer_client = Arc::new(PeerClient::new(config.base_port(), config.peer_host.clone()));
    let failure_detector = Arc::new(FailureDetector::new());
    let (retry_handle, _worker) =
        retry::channel(config.retry_capacity, peer_client.clone(), Duration::from_millis(50), Duration::from_millis(10), 3);
    let dissemination = Arc::new(Dissemination::new(
        self_id,
        store,
        peer_client.clone(),
        failure_detector.clone(),
        retry_handle,
        Duration::from_millis(50),
    ));
    let membership = Arc::new(Membership::new(self_id, None, HashSet::new(), failure_detector.clone(), dissemination.clone(), None));
    let election = Arc::new(Election::new(self_id, membership.clone(), peer_client.clone()));

    Arc::new(BrokerApp { config, dissemination, membership, election, failure_detector, registry_client: None, peer_client })
}

#[tokio::test]
async fn publish_then_fetch_round_trips() {
    let app = make_app(1);
    let router = broker::http::router(app);

    let publish_req = Request::builder()
        .method("POST")
        .uri("/publish")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"topic":"weather","message":"sunny"}"#))
        .unwrap();
    let resp = router.clone().oneshot(publish_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let fetch_req = Request::builder().uri("/data/weather").body(Body::empty()).unwrap();
    let resp = router.oneshot(fetch_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["topic"], "weather");
    assert_eq!(value["messages"], serde_json::json!(["sunny"]));
}

#[tokio::test]
async fn duplicate_publish_with_same_id_is_not_stored_twice() {
    let app = make_app(1);
    let router = broker::http::router(app);

    let body = r#"{"topic":"t","message":"hello","message_id":"fixed-id"}"#;
    for _ in 0..2 {
        let req = Request::builder()
            .method("POST")
            .uri("/publish")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let fetch_req = Request::builder().uri("/data/t").body(Body::empty()).unwrap();
    let resp = router.oneshot(fetch_req).await.unwrap();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn heartbeat_is_ok() {
    let app = make_app(1);
    let router = broker::http::router(app);
    let req = Request::builder().uri("/heartbeat").body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn leader_announcement_updates_leader_endpoint() {
    let app = make_app(1);
    let router = broker::http::router(app);

    let announce_req = Request::builder()
        .method("POST")
        .uri("/leader_announcement")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"leader_id":7}"#))
        .unwrap();
    let resp = router.clone().oneshot(announce_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let leader_req = Request::builder().uri("/leader").body(Body::empty()).unwrap();
    let resp = router.oneshot(leader_req).await.unwrap();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value["leader"], 7);
}

#[tokio::test]
async fn fetch_on_unknown_topic_returns_empty_array() {
    let app = make_app(1);
    let router = broker::http::router(app);
    let req = Request::builder().uri("/data/nope").body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(value["messages"].as_array().unwrap().is_empty());
}
