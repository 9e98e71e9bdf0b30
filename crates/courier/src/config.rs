//! Configuration for relay, clients and workers
//!
//! Every struct has working defaults, so a config file only needs the keys it
//! changes. Durations are given in milliseconds.

use crate::{CourierError, OutputOrder, Result};
use courier_transport::{Endpoint, SocketOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Internal endpoint the relay binds for its workers
pub const DEFAULT_BACKEND_ENDPOINT: &str = "tcp://127.0.0.1:5571";

/// Public endpoint the relay binds for clients
pub const DEFAULT_FRONTEND_ENDPOINT: &str = "tcp://*:5570";

/// Top-level configuration for the broker binary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Relay settings
    pub relay: RelayConfig,
    /// Settings for demo clients started next to the relay
    pub client: ClientConfig,
    /// Number of demo clients to start
    pub clients: usize,
}

impl BrokerConfig {
    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.relay.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CourierError::Config(format!("Failed to read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&text)
    }
}

/// Socket tuning shared by every agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Envelopes queued per peer and direction
    pub high_water_mark: i32,
    /// Largest inbound message in bytes; unlimited when absent
    pub max_message_size: Option<i64>,
    /// How long unsent envelopes linger when a socket closes
    pub linger_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        let options = SocketOptions::default();
        Self {
            high_water_mark: options.high_water_mark,
            max_message_size: options.max_message_size,
            linger_ms: options.linger.as_millis() as u64,
        }
    }
}

impl TransportConfig {
    /// Socket options for these settings
    pub fn socket_options(&self) -> SocketOptions {
        SocketOptions {
            high_water_mark: self.high_water_mark,
            max_message_size: self.max_message_size,
            linger: Duration::from_millis(self.linger_ms),
        }
    }
}

/// Client agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Endpoint clients connect to
    pub endpoint: String,
    /// Fixed identity; a random `CLIENT [n]` is used when absent
    pub identity: Option<String>,
    /// Length of one tick; one request is sent per tick
    pub tick_ms: u64,
    /// Slice of the tick spent in a single poll
    pub poll_interval_ms: u64,
    /// Pause after a poll that found nothing
    pub retry_pause_ms: u64,
    /// Stop after this many requests
    pub max_requests: Option<u64>,
    /// Order of the output snapshot
    pub output_order: OutputOrder,
    /// Socket tuning
    pub transport: TransportConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "tcp://127.0.0.1:5570".to_string(),
            identity: None,
            tick_ms: 1000,
            poll_interval_ms: 10,
            retry_pause_ms: 1,
            max_requests: None,
            output_order: OutputOrder::Arrival,
            transport: TransportConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Set the tick length
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick_ms = tick.as_millis() as u64;
        self
    }

    /// Set the poll slice
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Use a fixed identity
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Set the pause after an empty poll
    pub fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause_ms = pause.as_millis() as u64;
        self
    }

    /// Stop after `count` requests
    pub fn with_max_requests(mut self, count: u64) -> Self {
        self.max_requests = Some(count);
        self
    }

    /// Choose the output snapshot order
    pub fn with_output_order(mut self, order: OutputOrder) -> Self {
        self.output_order = order;
        self
    }

    /// Tick length
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Poll slice, never zero
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Pause after an empty poll
    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }
}

/// Worker agent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Order of the output snapshot
    pub output_order: OutputOrder,
    /// Socket tuning
    pub transport: TransportConfig,
}

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Public endpoint for clients
    pub frontend_endpoint: String,
    /// Internal loopback endpoint for workers
    pub backend_endpoint: String,
    /// Number of workers to launch
    pub workers: usize,
    /// Settings for launched workers
    pub worker: WorkerConfig,
    /// Socket tuning for both relay sockets
    pub transport: TransportConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            frontend_endpoint: DEFAULT_FRONTEND_ENDPOINT.to_string(),
            backend_endpoint: DEFAULT_BACKEND_ENDPOINT.to_string(),
            workers: 1,
            worker: WorkerConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Set the public endpoint
    pub fn with_frontend(mut self, endpoint: impl Into<String>) -> Self {
        self.frontend_endpoint = endpoint.into();
        self
    }

    /// Set the internal endpoint
    pub fn with_backend(mut self, endpoint: impl Into<String>) -> Self {
        self.backend_endpoint = endpoint.into();
        self
    }

    /// Set the worker pool size
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Check endpoints and pool size.
    ///
    /// The backend endpoint must stay on the loopback interface.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(CourierError::Config("workers must be at least 1".to_string()));
        }

        Endpoint::parse(&self.frontend_endpoint)
            .map_err(|e| CourierError::Config(format!("frontend_endpoint: {}", e)))?;
        let backend = Endpoint::parse(&self.backend_endpoint)
            .map_err(|e| CourierError::Config(format!("backend_endpoint: {}", e)))?;

        if !backend.is_loopback() {
            return Err(CourierError::Config(format!(
                "backend_endpoint {} is not a loopback address",
                self.backend_endpoint
            )));
        }
        Ok(())
    }
}
