//! Fan-out-to-peer behavior, using `wiremock` to stand in for peer
//! brokers on arbitrary local ports.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use broker_store::MemoryStore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use broker::dissemination::Dissemination;
use broker::failure_detector::FailureDetector;
use broker::peer_client::PeerClient;
use broker::retry;

#[tokio::test]
async fn replicate_delivers_to_live_child_and_skips_dead_one() {
    let live_peer = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/publish"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&live_peer)
        .await;

    // peer id 1 addresses to base_port + 0; point base_port at the mock's port
    let base_port = live_peer.address().port();
    let peer_client = Arc::new(PeerClient::new(base_port, live_peer.address().ip().to_string()));
    let failure_detector = Arc::new(FailureDetector::new());
    failure_detector.track(1);

    let store = Arc::new(MemoryStore::default());
    let (retry_handle, _worker) =
        retry::channel(16, peer_client.clone(), Duration::from_millis(200), Duration::from_millis(10), 3);
    let dissemination = Arc::new(Dissemination::new(
        99,
        store,
        peer_client,
        failure_detector.clone(),
        retry_handle,
        Duration::from_millis(200),
    ));

    let peers: HashSet<u64> = [1].into_iter().collect();
    dissemination.rebuild_tree(&peers, None);
    // broker 99 is the max id, so it is the star's root with peer 1 as a child
    dissemination.replicate("t", "hello", "id-1").await.unwrap();
    live_peer.verify().await;
}

#[tokio::test]
async fn on_forwarded_does_not_relay_a_duplicate() {
    let peer = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/publish"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&peer)
        .await;

    let base_port = peer.address().port();
    let peer_client = Arc::new(PeerClient::new(base_port, peer.address().ip().to_string()));
    let failure_detector = Arc::new(FailureDetector::new());
    failure_detector.track(1);

    let store = Arc::new(MemoryStore::default());
    let (retry_handle, _worker) =
        retry::channel(16, peer_client.clone(), Duration::from_millis(200), Duration::from_millis(10), 3);
    let dissemination = Arc::new(Dissemination::new(
        99,
        store,
        peer_client,
        failure_detector,
        retry_handle,
        Duration::from_millis(200),
    ));
    let peers: HashSet<u64> = [1].into_iter().collect();
    dissemination.rebuild_tree(&peers, None);

    dissemination.on_forwarded("t", "hello", "dup-id").await.unwrap();
    dissemination.on_forwarded("t", "hello-again", "dup-id").await.unwrap();

    peer.verify().await;
}

#[tokio::test]
async fn replicate_from_a_non_root_leaf_still_reaches_its_peer() {
    // self_id (1) is lower than the only peer (2), so build_star roots the
    // tree at 2 and gives node 1 (self) an empty children list. Fan-out
    // must still reach peer 2 directly from the current peer set, not via
    // the tree's (empty) children-of-self list.
    let live_peer = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/publish"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&live_peer)
        .await;

    // peer id 2 addresses to base_port + 1; point base_port one below the mock's port
    let base_port = live_peer.address().port() - 1;
    let peer_client = Arc::new(PeerClient::new(base_port, live_peer.address().ip().to_string()));
    let failure_detector = Arc::new(FailureDetector::new());
    failure_detector.track(2);

    let store = Arc::new(MemoryStore::default());
    let (retry_handle, _worker) =
        retry::channel(16, peer_client.clone(), Duration::from_millis(200), Duration::from_millis(10), 3);
    let dissemination = Arc::new(Dissemination::new(
        1,
        store,
        peer_client,
        failure_detector,
        retry_handle,
        Duration::from_millis(200),
    ));

    let peers: HashSet<u64> = [2].into_iter().collect();
    dissemination.rebuild_tree(&peers, None);
    // broker 2 is the max id, so it is the star's root and self (1) is a leaf
    dissemination.replicate("t", "hello", "id-1").await.unwrap();

    live_peer.verify().await;
}
