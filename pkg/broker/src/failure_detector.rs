//! Periodic liveness probing of known peers (§4.2). Tracks each peer's
//! state as an ALIVE/FAILED machine and evicts from the registry on the
//! ALIVE→FAILED transition.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use broker_core::BrokerId;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::peer_client::PeerClient;
use crate::registry_client::RegistryClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Alive,
    Failed,
}

/// Shared view of peer liveness; `Dissemination` and `Election` both read
/// this to exclude failed peers from fan-out and from the candidate set.
#[derive(Default)]
pub struct FailureDetector {
    states: RwLock<HashMap<BrokerId, PeerState>>,
}

impl FailureDetector {
    pub fn new() -> Self {
        FailureDetector { states: RwLock::new(HashMap::new()) }
    }

    /// Registers a peer as ALIVE the first time membership reports it;
    /// no-op if already tracked (§4.2, new-peer bootstrap).
    pub fn track(&self, peer: BrokerId) {
        self.states.write().entry(peer).or_insert(PeerState::Alive);
    }

    pub fn untrack(&self, peer: BrokerId) {
        self.states.write().remove(&peer);
    }

    pub fn is_alive(&self, peer: BrokerId) -> bool {
        matches!(self.states.read().get(&peer), Some(PeerState::Alive) | None)
    }

    pub fn alive_peers(&self) -> Vec<BrokerId> {
        self.states
            .read()
            .iter()
            .filter(|(_, state)| **state == PeerState::Alive)
            .map(|(id, _)| *id)
            .collect()
    }

    fn set_state(&self, peer: BrokerId, state: PeerState) -> Option<PeerState> {
        self.states.write().insert(peer, state)
    }

    /// Probes one peer and updates its state; returns the transition, if
    /// any, so the caller can decide whether to evict from the registry.
    pub async fn probe(
        &self,
        peer_client: &PeerClient,
        peer: BrokerId,
        timeout: Duration,
    ) -> Option<(PeerState, PeerState)> {
        let result = peer_client.heartbeat(peer, timeout).await;
        let new_state = if result.is_ok() { PeerState::Alive } else { PeerState::Failed };
        let old_state = self.set_state(peer, new_state);
        match old_state {
            Some(old) if old != new_state => Some((old, new_state)),
            None => Some((PeerState::Alive, new_state)),
            _ => None,
        }
    }
}

/// Runs the periodic probe loop for every currently-tracked peer, evicting
/// newly-failed peers from the registry (§4.2). Intended to be spawned as
/// a long-lived background task.
pub async fn run_probe_loop(
    detector: Arc<FailureDetector>,
    peer_client: Arc<PeerClient>,
    registry_client: Option<Arc<RegistryClient>>,
    interval: Duration,
    probe_timeout: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let tracked: Vec<BrokerId> = detector.states.read().keys().copied().collect();
        for peer in tracked {
            let transition = detector.probe(&peer_client, peer, probe_timeout).await;
            if let Some((PeerState::Alive, PeerState::Failed)) = transition {
                warn!(peer, "peer failed liveness probe, marking FAILED");
                if let Some(registry) = &registry_client {
                    if let Err(err) = registry.remove(peer).await {
                        warn!(peer, error = %err, "failed to evict peer from registry");
                    }
                }
            } else if let Some((PeerState::Failed, PeerState::Alive)) = transition {
                info!(peer, "peer recovered, marking ALIVE");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untracked_peer_is_considered_alive() {
        let detector = FailureDetector::new();
        assert!(detector.is_alive(42));
    }

    #[test]
    fn track_then_manual_transition() {
        let detector = FailureDetector::new();
        detector.track(1);
        assert!(detector.is_alive(1));
        let prev = detector.set_state(1, PeerState::Failed);
        assert_eq!(prev, Some(PeerState::Alive));
        assert!(!detector.is_alive(1));
    }

    #[test]
    fn alive_peers_excludes_failed() {
        let detector = FailureDetector::new();
        detector.track(1);
        detector.track(2);
        detector.set_state(2, PeerState::Failed);
        let mut alive = detector.alive_peers();
        alive.sort_unstable();
        assert_eq!(alive, vec![1]);
    }
}
