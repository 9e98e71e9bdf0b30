//! Transport error types and loop outcomes

use thiserror::Error;
use std::io;

/// Transport-specific errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// Nothing is ready yet, try again later
    #[error("Resource temporarily unavailable")]
    TryAgain,

    /// The owning context is shutting down
    #[error("Context was terminated")]
    Terminating,

    /// ZeroMQ error
    #[error("ZeroMQ error: {0}")]
    Zmq(zmq::Error),

    /// I/O error while waiting for socket readiness
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Endpoint string could not be parsed
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Endpoint is not bound or connected on this socket
    #[error("Endpoint not found: {0}")]
    EndpointNotFound(String),

    /// Endpoint is already bound or connected on this socket
    #[error("Endpoint already in use: {0}")]
    AddressInUse(String),

    /// The socket behind a control handle is gone
    #[error("Socket closed")]
    Closed,
}

impl From<zmq::Error> for TransportError {
    fn from(err: zmq::Error) -> Self {
        match err {
            zmq::Error::EAGAIN => Self::TryAgain,
            zmq::Error::ETERM => Self::Terminating,
            other => Self::Zmq(other),
        }
    }
}

impl TransportError {
    /// Check if this is the terminate signal
    pub fn is_terminating(&self) -> bool {
        matches!(self, Self::Terminating)
    }

    /// Check if the operation may simply be retried
    pub fn is_try_again(&self) -> bool {
        matches!(self, Self::TryAgain)
    }
}

/// Outcome of one transport step, as seen by an agent loop.
///
/// Fatal errors stay in the `Err` side of [`step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    /// The operation completed
    Ready(T),
    /// Nothing was available; pause briefly and try again
    Retry,
    /// The context is shutting down; leave the loop without an error
    Terminating,
}

/// Sort a transport result into ready, retry, terminating or fatal.
pub fn step<T>(result: Result<T, TransportError>) -> Result<Step<T>, TransportError> {
    match result {
        Ok(value) => Ok(Step::Ready(value)),
        Err(TransportError::TryAgain) => Ok(Step::Retry),
        Err(TransportError::Terminating) => Ok(Step::Terminating),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_classification() {
        assert_eq!(step(Ok::<_, TransportError>(7)).unwrap(), Step::Ready(7));
        assert_eq!(step::<()>(Err(TransportError::TryAgain)).unwrap(), Step::Retry);
        assert_eq!(step::<()>(Err(TransportError::Terminating)).unwrap(), Step::Terminating);

        let fatal = step::<()>(Err(TransportError::Closed));
        assert!(matches!(fatal, Err(TransportError::Closed)));
    }

    #[test]
    fn test_zmq_errors_are_classified() {
        assert!(TransportError::from(zmq::Error::EAGAIN).is_try_again());
        assert!(TransportError::from(zmq::Error::ETERM).is_terminating());

        let result = step::<()>(Err(zmq::Error::EHOSTUNREACH.into()));
        assert!(matches!(result, Err(TransportError::Zmq(zmq::Error::EHOSTUNREACH))));
    }

    #[test]
    fn test_io_error_is_fatal() {
        let err = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let result = step::<()>(Err(TransportError::from(err)));
        assert!(matches!(result, Err(TransportError::Io(_))));
    }
}
