//! # Courier Protocol
//!
//! Frame and envelope definitions and peer identities shared by Courier
//! sockets and agents. Framing on the wire is left to ZeroMQ.

#![warn(missing_docs)]

/// Frame structure and text decoding
pub mod frame;

/// Multipart envelopes
pub mod envelope;

/// Peer routing identities
pub mod identity;

/// Error types for protocol operations
pub mod error;

pub use frame::Frame;
pub use envelope::Envelope;
pub use identity::Identity;
pub use error::ProtocolError;
