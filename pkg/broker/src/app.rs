//! Wires the per-node engine together in dependency order: store adapter
//! → failure detector → dissemination → membership → election (§2).

use std::collections::HashSet;
use std::sync::Arc;

use broker_core::BrokerConfig;
use broker_store::MemoryStore;
use tracing::info;

use crate::dissemination::Dissemination;
use crate::election::Election;
use crate::failure_detector::FailureDetector;
use crate::membership::Membership;
use crate::peer_client::PeerClient;
use crate::registry_client::RegistryClient;
use crate::retry::{self, RetryWorker};
use crate::spanning_tree;

pub struct BrokerApp {
    pub config: BrokerConfig,
    pub dissemination: Arc<Dissemination>,
    pub membership: Arc<Membership>,
    pub election: Arc<Election>,
    pub failure_detector: Arc<FailureDetector>,
    pub registry_client: Option<Arc<RegistryClient>>,
    pub peer_client: Arc<PeerClient>,
}

pub struct BrokerBackground {
    pub retry_worker: RetryWorker,
}

impl BrokerApp {
    /// Builds the full engine for one broker process, registering with
    /// the external registry (if configured) before serving any traffic
    /// (§4.6 "bootstrap").
    pub async fn build(config: BrokerConfig) -> anyhow::Result<(Self, BrokerBackground)> {
        let store = Arc::new(MemoryStore::default());
        let peer_client = Arc::new(PeerClient::new(config.base_port(), config.peer_host.clone()));
        let failure_detector = Arc::new(FailureDetector::new());

        let registry_client = config.registry.as_ref().map(|url| Arc::new(RegistryClient::new(url.clone())));
        if let Some(registry) = &registry_client {
            registry.register(config.broker_id).await?;
            info!(broker_id = config.broker_id, "registered with registry");
        }

        let (retry_handle, retry_worker) = retry::channel(
            config.retry_capacity,
            peer_client.clone(),
            config.fanout_timeout(),
            config.retry_backoff_base(),
            config.retry_max_attempts,
        );

        let dissemination = Arc::new(Dissemination::new(
            config.broker_id,
            store.clone(),
            peer_client.clone(),
            failure_detector.clone(),
            retry_handle,
            config.fanout_timeout(),
        ));

        let static_tree = match &config.spanning_tree {
            Some(path) => Some(spanning_tree::load_static(path)?),
            None => None,
        };

        let initial_peers: HashSet<u64> =
            if let Some(registry) = &registry_client { registry.fetch_members().await? } else { config.peers.iter().copied().collect() };

        let membership = Arc::new(Membership::new(
            config.broker_id,
            registry_client.clone(),
            initial_peers,
            failure_detector.clone(),
            dissemination.clone(),
            static_tree,
        ));

        let election = Arc::new(Election::new(config.broker_id, membership.clone(), peer_client.clone()));

        // Election depends on Membership, so the reverse edge (§4.4(c)
        // "trigger a fresh leader election" on membership change) runs
        // through an opaque callback rather than a direct field (§9).
        let election_for_callback = election.clone();
        membership.set_on_change(move || {
            let election = election_for_callback.clone();
            tokio::spawn(async move { election.run().await });
        });

        let app =
            BrokerApp { config, dissemination, membership, election, failure_detector, registry_client, peer_client };
        Ok((app, BrokerBackground { retry_worker }))
    }

    pub fn store(&self) -> Arc<dyn broker_store::MessageStore> {
        // shares the same store instance `Dissemination` was built with, so
        // `/data/{topic}` reads observe every message `/publish` has stored
        self.dissemination.store_handle()
    }
}
