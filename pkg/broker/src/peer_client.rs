//! Outbound HTTP to peer brokers: fan-out publishes, liveness probes, and
//! leader announcements (§6 "Broker HTTP surface", consumed side).

use std::time::Duration;

use broker_core::BrokerId;
use serde::Serialize;
use thiserror::Error;

/// Deadline for outbound calls that have no caller-supplied timeout
/// (announcements) — also set as the client's own default so no request
/// issued through it is ever unbounded (§5 "no call is unbounded").
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum PeerClientError {
    #[error("peer {peer} returned status {status}")]
    BadStatus { peer: BrokerId, status: u16 },

    #[error("request to peer {peer} failed: {source}")]
    Transport { peer: BrokerId, #[source] source: reqwest::Error },
}

#[derive(Serialize)]
struct PublishBody<'a> {
    topic: &'a str,
    message: &'a str,
    message_id: &'a str,
}

#[derive(Serialize)]
struct LeaderAnnouncementBody {
    leader_id: BrokerId,
}

/// Addresses peers purely by the `BASE_PORT + (id - 1)` convention (§6); no
/// separate discovery mechanism is needed.
pub struct PeerClient {
    http: reqwest::Client,
    base_port: u16,
    peer_host: String,
}

impl PeerClient {
    pub fn new(base_port: u16, peer_host: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("reqwest client with a fixed timeout and no custom TLS config always builds");
        PeerClient { http, base_port, peer_host: peer_host.into() }
    }

    fn base_url(&self, peer: BrokerId) -> String {
        let port = broker_core::port_for(self.base_port, peer);
        format!("http://{}:{}", self.peer_host, port)
    }

    pub async fn publish(
        &self,
        peer: BrokerId,
        topic: &str,
        message: &str,
        message_id: &str,
        timeout: Duration,
    ) -> Result<(), PeerClientError> {
        let url = format!("{}/publish", self.base_url(peer));
        let body = PublishBody { topic, message, message_id };
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| PeerClientError::Transport { peer, source })?;
        if !resp.status().is_success() {
            return Err(PeerClientError::BadStatus { peer, status: resp.status().as_u16() });
        }
        Ok(())
    }

    pub async fn heartbeat(&self, peer: BrokerId, timeout: Duration) -> Result<(), PeerClientError> {
        let url = format!("{}/heartbeat", self.base_url(peer));
        let resp = self
            .http
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| PeerClientError::Transport { peer, source })?;
        if !resp.status().is_success() {
            return Err(PeerClientError::BadStatus { peer, status: resp.status().as_u16() });
        }
        Ok(())
    }

    pub async fn announce_leader(&self, peer: BrokerId, leader_id: BrokerId) -> Result<(), PeerClientError> {
        let url = format!("{}/leader_announcement", self.base_url(peer));
        let resp = self
            .http
            .post(&url)
            .json(&LeaderAnnouncementBody { leader_id })
            .timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(|source| PeerClientError::Transport { peer, source })?;
        if !resp.status().is_success() {
            return Err(PeerClientError::BadStatus { peer, status: resp.status().as_u16() });
        }
        Ok(())
    }
}
