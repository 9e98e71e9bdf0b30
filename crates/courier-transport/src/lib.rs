//! # Courier Transport
//!
//! ZeroMQ ROUTER and DEALER sockets driven from tokio. A [`Context`] owns
//! the ZeroMQ context and the process-wide terminate signal; every
//! [`Socket`] is created from one and reports
//! [`TransportError::Terminating`] once it fires.

#![warn(missing_docs)]

/// Shared transport context and terminate signal
pub mod context;

/// Endpoint URI parsing
pub mod endpoint;

/// Sockets, roles and remote control handles
pub mod socket;

/// Transport error types and loop outcomes
pub mod error;

pub use context::Context;
pub use endpoint::Endpoint;
pub use socket::{Socket, SocketControl, SocketKind, SocketOptions};
pub use error::{step, Step, TransportError};
