//! Error types for the Courier library

use courier_proto::ProtocolError;
use courier_transport::TransportError;
use thiserror::Error;

/// Main error type for Courier operations
#[derive(Debug, Error)]
pub enum CourierError {
    /// Transport failure that ended an agent loop
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Envelope or frame could not be decoded
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker failure
    #[error("Worker error: {0}")]
    Worker(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for CourierError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("TOML parse error: {}", err))
    }
}

impl From<tokio::task::JoinError> for CourierError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Worker(format!("Task failed: {}", err))
    }
}
