use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::BrokerId;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("'{0}' is not a valid broker id (expected a positive integer)")]
    InvalidBrokerId(String),
}

/// Process-level configuration, resolved once at startup from CLI flags with
/// environment-variable fallback (§6, §10 "Configuration").
///
/// Every field below has a `BROKER_*`-prefixed environment variable fallback
/// via `clap`'s `env` attribute, so nothing below `main` ever re-reads the
/// environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "broker", about = "Replicated pub/sub broker node")]
pub struct BrokerConfig {
    /// This broker's id. Must be unique and positive within the cluster.
    #[arg(long, env = "BROKER_ID")]
    pub broker_id: BrokerId,

    /// Port to bind the HTTP surface to.
    #[arg(long, env = "BROKER_PORT")]
    pub port: u16,

    /// Bind address for the HTTP surface.
    #[arg(long, env = "BROKER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Hostname used to reach peers and this node's own registered address
    /// (§6). Distinct from `--host`, which is a bind address and may be
    /// unroutable (e.g. `0.0.0.0`).
    #[arg(long, env = "BROKER_PEER_HOST", default_value = "127.0.0.1")]
    pub peer_host: String,

    /// Base URL of the central registry (e.g. `http://localhost:4000`).
    /// If absent, the broker runs in standalone mode (§4.4).
    #[arg(long, env = "BROKER_REGISTRY")]
    pub registry: Option<String>,

    /// Comma-separated fallback peer ids, used verbatim in standalone mode.
    #[arg(long, env = "BROKER_PEERS", value_delimiter = ',', default_value = "")]
    pub peers: Vec<BrokerId>,

    /// Path to a static spanning-tree JSON override (§4.3).
    #[arg(long, env = "BROKER_SPANNING_TREE")]
    pub spanning_tree: Option<PathBuf>,

    /// Failure-detector probe cadence `H`, in milliseconds.
    #[arg(long, env = "BROKER_HEARTBEAT_INTERVAL_MS", default_value_t = 5_000)]
    pub heartbeat_interval_ms: u64,

    /// Per-probe timeout `T`, in milliseconds.
    #[arg(long, env = "BROKER_PROBE_TIMEOUT_MS", default_value_t = 2_000)]
    pub probe_timeout_ms: u64,

    /// Membership poll cadence `M`, in milliseconds.
    #[arg(long, env = "BROKER_MEMBERSHIP_INTERVAL_MS", default_value_t = 10_000)]
    pub membership_interval_ms: u64,

    /// Per-send timeout for dissemination fan-out, in milliseconds.
    #[arg(long, env = "BROKER_FANOUT_TIMEOUT_MS", default_value_t = 2_000)]
    pub fanout_timeout_ms: u64,

    /// Maximum number of entries the retry queue will hold before publishes
    /// are rejected with backpressure (§4.3, §REDESIGN FLAGS).
    #[arg(long, env = "BROKER_RETRY_CAPACITY", default_value_t = 1_024)]
    pub retry_capacity: usize,

    /// Maximum number of retry attempts per entry before it is abandoned.
    #[arg(long, env = "BROKER_RETRY_MAX_ATTEMPTS", default_value_t = 5)]
    pub retry_max_attempts: u32,

    /// Base delay for the retry worker's exponential backoff, in
    /// milliseconds (delay doubles per attempt, capped implicitly by
    /// `retry_max_attempts`).
    #[arg(long, env = "BROKER_RETRY_BACKOFF_BASE_MS", default_value_t = 250)]
    pub retry_backoff_base_ms: u64,

    /// Log output format.
    #[arg(long, env = "BROKER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl BrokerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn membership_interval(&self) -> Duration {
        Duration::from_millis(self.membership_interval_ms)
    }

    pub fn fanout_timeout(&self) -> Duration {
        Duration::from_millis(self.fanout_timeout_ms)
    }

    pub fn retry_backoff_base(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_base_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Recovers the cluster's shared base port from this node's own
    /// `--port` and `--broker-id`, assuming this node was started
    /// following the `BASE_PORT + (id - 1)` convention (§6) like every
    /// other broker in the cluster. Used to address peers via
    /// [`crate::port_for`] without a separate `--base-port` flag.
    pub fn base_port(&self) -> u16 {
        self.port.saturating_sub((self.broker_id.saturating_sub(1)) as u16)
    }

    /// Rejects broker id 0, which `port_for` and the bully comparison both
    /// treat as a sentinel rather than a real node.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker_id == 0 {
            return Err(ConfigError::InvalidBrokerId("0".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}
