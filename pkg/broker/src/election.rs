//! Bully-style leader election (§4.5). A broker defers to any live peer
//! with a higher id; the highest-id broker in the current membership
//! announces itself as leader.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use broker_core::BrokerId;
use tracing::info;

use crate::membership::Membership;
use crate::peer_client::PeerClient;

const NO_LEADER: BrokerId = 0;

/// Holds the broker's current belief about who the leader is. `0` means
/// "no leader known yet".
pub struct Election {
    self_id: BrokerId,
    leader: AtomicU64,
    membership: Arc<Membership>,
    peer_client: Arc<PeerClient>,
}

impl Election {
    pub fn new(self_id: BrokerId, membership: Arc<Membership>, peer_client: Arc<PeerClient>) -> Self {
        Election { self_id, leader: AtomicU64::new(NO_LEADER), membership, peer_client }
    }

    pub fn current_leader(&self) -> Option<BrokerId> {
        match self.leader.load(Ordering::SeqCst) {
            NO_LEADER => None,
            id => Some(id),
        }
    }

    /// Accepts an announcement from a peer that believes itself (or
    /// another broker) to be leader (§6 `/leader_announcement`). A later
    /// announcement always overrides an earlier one — the bully protocol
    /// guarantees the highest id eventually wins out.
    pub fn on_leader_announcement(&self, leader_id: BrokerId) {
        self.leader.store(leader_id, Ordering::SeqCst);
        info!(leader_id, "leader announcement received");
    }

    /// Runs one round of the election (§4.5). Re-fetches membership before
    /// checking for a higher live peer — mirroring the reference
    /// behavior of re-confirming liveness against fresh membership rather
    /// than a cached snapshot, at the cost of being close to redundant
    /// with the `higher` set already computed from current membership.
    /// `is_alive` is membership inclusion, not a probe result (§4.5, §9:
    /// "spec adopts membership lookup").
    pub async fn run(&self) {
        let members = self.membership.current();
        let higher: Vec<BrokerId> = members.iter().copied().filter(|&id| id > self.self_id).collect();

        let any_higher_alive = higher.iter().any(|&id| self.is_alive(id));
        if any_higher_alive {
            info!(self_id = self.self_id, "deferring election to a higher-id live peer");
            return;
        }

        self.leader.store(self.self_id, Ordering::SeqCst);
        info!(self_id = self.self_id, "declaring self leader");
        for &peer in members.iter() {
            if peer == self.self_id {
                continue;
            }
            if let Err(err) = self.peer_client.announce_leader(peer, self.self_id).await {
                tracing::warn!(peer, error = %err, "failed to announce leadership");
            }
        }
    }

    /// Liveness as membership inclusion (§4.5 "a higher node present in the
    /// current membership is treated as alive"), not a direct probe — the
    /// spec resolves this exact ambiguity in favor of membership lookup
    /// (§9), matching `election.py`'s `is_alive` checking
    /// `broker_id in self.membership_service.members`.
    fn is_alive(&self, peer: BrokerId) -> bool {
        self.membership.current().contains(&peer)
    }
}

/// Runs the election loop: re-checks leadership whenever the current
/// leader might be down, at a fixed cadence (§4.5). A fresh broker with
/// no known leader triggers an election immediately.
pub async fn run_election_loop(election: Arc<Election>, interval: Duration) {
    election.run().await;
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let stale = match election.current_leader() {
            Some(leader) => !election.is_alive(leader) && leader != election.self_id,
            None => true,
        };
        if stale {
            election.run().await;
        }
    }
}
