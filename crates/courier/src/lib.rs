//! # Courier
//!
//! An asynchronous request/reply relay. Clients connect to a public ROUTER
//! endpoint, the relay deals their requests to a pool of workers over an
//! internal DEALER endpoint, and replies find their way back purely through
//! the identity frames each envelope carries. The relay keeps no state about
//! which client asked what.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use courier_proto as proto;
pub use courier_transport as transport;

/// Error types for the Courier library
pub mod error;

/// Configuration for relay, clients and workers
pub mod config;

/// Append-only output log shown to the UI
pub mod output;

/// Started flag and best-effort endpoint release
pub mod lifecycle;

/// Ticking client agent
pub mod client;

/// Worker agent and request handlers
pub mod worker;

/// Worker pool supervisor
pub mod pool;

/// Frontend/backend relay
pub mod relay;

pub use error::CourierError;
pub use config::{BrokerConfig, ClientConfig, RelayConfig, TransportConfig, WorkerConfig};
pub use output::{OutputEntry, OutputLog, OutputOrder};
pub use lifecycle::{AgentState, Lifecycle, Role};
pub use client::ClientAgent;
pub use worker::{EchoHandler, RequestHandler, WorkerAgent};
pub use pool::WorkerPool;
pub use relay::{Relay, RelayStats};

/// Result type alias for Courier operations
pub type Result<T> = std::result::Result<T, CourierError>;
