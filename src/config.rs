//! Configuration surface consumed from the host platform.
//!
//! The host presents a plain options object: where to listen, whether to
//! mirror raw frames to the cloud, and where the mirror should send them.
//! Everything has a sensible default so `ServerConfig::default()` is a
//! working local-only receiver.

use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// Default inbound bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Default inbound port units push telemetry to.
pub const DEFAULT_PORT: u16 = 47524;

/// Default cloud mirror endpoint.
pub const DEFAULT_FORWARDER_HOST: &str = "pool.aseko.com";

/// Default cloud mirror port.
pub const DEFAULT_FORWARDER_PORT: u16 = 47524;

const DEFAULT_QUEUE_CAPACITY: usize = 1000;
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1000;
const DEFAULT_MAX_BACKOFF_MS: u64 = 10_000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;
const DEFAULT_WRITE_TIMEOUT_MS: u64 = 2000;

/// Receiver configuration.
///
/// Forwarding is disabled unless a [`ForwarderConfig`] is present.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the TCP listener binds to.
    pub bind_address: String,

    /// Port the TCP listener binds to.
    pub port: u16,

    /// Optional cloud mirror target.
    pub forwarder: Option<ForwarderConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: DEFAULT_BIND_ADDRESS.to_string(), port: DEFAULT_PORT, forwarder: None }
    }
}

impl ServerConfig {
    /// Parse a configuration from a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// The `host:port` string the listener binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Cloud mirror configuration.
///
/// The backoff bounds come from the behavior of the original cloud push:
/// start at one second, double up to ten, reset after a successful write.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForwarderConfig {
    /// Remote host frames are relayed to.
    pub host: String,

    /// Remote port frames are relayed to.
    pub port: u16,

    /// Bounded relay queue depth; overflow drops frames.
    pub queue_capacity: usize,

    /// First reconnect delay after a failure, in milliseconds.
    pub initial_backoff_ms: u64,

    /// Reconnect delay cap, in milliseconds.
    pub max_backoff_ms: u64,

    /// Outbound connect timeout, in milliseconds.
    pub connect_timeout_ms: u64,

    /// Outbound write timeout, in milliseconds.
    pub write_timeout_ms: u64,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_FORWARDER_HOST.to_string(),
            port: DEFAULT_FORWARDER_PORT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
        }
    }
}

impl ForwarderConfig {
    /// The `host:port` string of the mirror target.
    pub fn remote_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}
