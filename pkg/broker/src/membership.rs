//! Periodic polling of the registry for the current member set, with
//! change-driven callbacks into the dissemination tree and the failure
//! detector (§4.1).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use broker_core::BrokerId;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::dissemination::Dissemination;
use crate::failure_detector::FailureDetector;
use crate::registry_client::RegistryClient;
use crate::spanning_tree::SpanningTree;

/// Tracks the broker's view of the cluster and reacts to changes. Standalone
/// mode (no `--registry`) uses the static peer list passed at startup and
/// never polls (§4.4).
pub struct Membership {
    self_id: BrokerId,
    registry: Option<Arc<RegistryClient>>,
    members: RwLock<HashSet<BrokerId>>,
    failure_detector: Arc<FailureDetector>,
    dissemination: Arc<Dissemination>,
    static_tree: Option<SpanningTree>,
    on_change: RwLock<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl Membership {
    pub fn new(
        self_id: BrokerId,
        registry: Option<Arc<RegistryClient>>,
        initial_peers: HashSet<BrokerId>,
        failure_detector: Arc<FailureDetector>,
        dissemination: Arc<Dissemination>,
        static_tree: Option<SpanningTree>,
    ) -> Self {
        let membership = Membership {
            self_id,
            registry,
            members: RwLock::new(initial_peers.clone()),
            failure_detector,
            dissemination,
            static_tree,
            on_change: RwLock::new(None),
        };
        membership.apply(initial_peers);
        membership
    }

    /// Registers the callback fired after every settled membership change
    /// (§4.4(c): "trigger a fresh leader election"). Election depends on
    /// Membership for its own peer view, so the dependency back the other
    /// way runs through this opaque callback instead of a direct field
    /// (§9 "cyclic references between election and membership") — callers
    /// wire it in once Election has been constructed.
    pub fn set_on_change(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.on_change.write() = Some(Box::new(callback));
    }

    pub fn current(&self) -> HashSet<BrokerId> {
        self.members.read().clone()
    }

    fn apply(&self, members: HashSet<BrokerId>) {
        let others: HashSet<BrokerId> = members.iter().copied().filter(|&id| id != self.self_id).collect();
        for &peer in &others {
            self.failure_detector.track(peer);
        }
        let previous = self.members.read().clone();
        for peer in previous.iter().filter(|id| !others.contains(id)) {
            self.failure_detector.untrack(*peer);
        }
        self.dissemination.rebuild_tree(&others, self.static_tree.as_ref());
        *self.members.write() = others;
        if let Some(callback) = self.on_change.read().as_ref() {
            callback();
        }
    }

    /// Polls the registry once, and if the member set changed, rebuilds the
    /// spanning tree and re-tracks the failure detector's peer list (§4.1
    /// "on membership change").
    async fn refresh(&self) -> Result<bool, crate::registry_client::RegistryClientError> {
        let Some(registry) = &self.registry else { return Ok(false) };
        let fetched = registry.fetch_members().await?;
        let changed = fetched != self.current();
        if changed {
            info!(count = fetched.len(), "membership changed");
            self.apply(fetched);
        } else {
            debug!("membership unchanged");
        }
        Ok(changed)
    }
}

/// Runs the periodic membership-poll loop (§4.1). A no-op forever in
/// standalone mode since `Membership::refresh` short-circuits without a
/// registry client.
pub async fn run_poll_loop(membership: Arc<Membership>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if let Err(err) = membership.refresh().await {
            tracing::warn!(error = %err, "membership poll failed");
        }
    }
}
