//! Outbound HTTP to the central registry: register, fetch members, evict a
//! failed peer (§6 "Registry HTTP surface", consumed side).

use std::collections::HashSet;
use std::time::Duration;

use broker_core::BrokerId;
use serde::Serialize;
use thiserror::Error;

/// Deadline for every registry call (§5 "no call is unbounded"), also set
/// as the client's own default.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum RegistryClientError {
    #[error("registry returned status {0}")]
    BadStatus(u16),

    #[error("registry request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Serialize)]
struct RegisterBody {
    broker_id: BrokerId,
}

/// Thin wrapper around the registry's three endpoints. A broker started
/// without `--registry` never constructs one (§4.4 "Standalone mode").
pub struct RegistryClient {
    http: reqwest::Client,
    base_url: String,
}

impl RegistryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("reqwest client with a fixed timeout and no custom TLS config always builds");
        RegistryClient { http, base_url: base_url.into() }
    }

    pub async fn register(&self, broker_id: BrokerId) -> Result<(), RegistryClientError> {
        let url = format!("{}/register", self.base_url);
        let resp = self.http.post(&url).json(&RegisterBody { broker_id }).timeout(DEFAULT_TIMEOUT).send().await?;
        if !resp.status().is_success() {
            return Err(RegistryClientError::BadStatus(resp.status().as_u16()));
        }
        Ok(())
    }

    pub async fn fetch_members(&self) -> Result<HashSet<BrokerId>, RegistryClientError> {
        let url = format!("{}/members", self.base_url);
        let resp = self.http.get(&url).timeout(DEFAULT_TIMEOUT).send().await?;
        if !resp.status().is_success() {
            return Err(RegistryClientError::BadStatus(resp.status().as_u16()));
        }
        let members: Vec<BrokerId> = resp.json().await?;
        Ok(members.into_iter().collect())
    }

    /// Best-effort; per §4.2 a failure here is logged by the caller and not
    /// retried — the next probe cycle re-invokes if the peer is still down.
    pub async fn remove(&self, broker_id: BrokerId) -> Result<(), RegistryClientError> {
        let url = format!("{}/remove/{}", self.base_url, broker_id);
        let resp = self.http.delete(&url).timeout(DEFAULT_TIMEOUT).send().await?;
        if !resp.status().is_success() {
            return Err(RegistryClientError::BadStatus(resp.status().as_u16()));
        }
        Ok(())
    }
}
