//! Shared transport context and terminate signal

use crate::TransportError;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::info;

/// Process-wide transport context.
///
/// Create one at startup and hand a reference to every agent. It wraps the
/// ZeroMQ context all sockets are created from. Calling
/// [`Context::terminate`] makes every waiting socket operation derived from
/// it return [`TransportError::Terminating`].
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    zmq: zmq::Context,
    shutdown: CancellationToken,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("terminating", &self.is_terminating())
            .finish()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Create a new context
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ContextInner {
                zmq: zmq::Context::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Signal every socket of this context to stop.
    ///
    /// Only the signal is raised here; the ZeroMQ context itself is torn
    /// down once the last socket and handle are dropped.
    pub fn terminate(&self) {
        if !self.inner.shutdown.is_cancelled() {
            info!("Terminating transport context");
        }
        self.inner.shutdown.cancel();
    }

    /// Check if the context has been terminated
    pub fn is_terminating(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Resolves once the context is terminated
    pub fn terminated(&self) -> WaitForCancellationFuture<'_> {
        self.inner.shutdown.cancelled()
    }

    /// Raw ZeroMQ socket of the given type
    pub(crate) fn zmq_socket(&self, kind: zmq::SocketType) -> Result<zmq::Socket, TransportError> {
        Ok(self.inner.zmq.socket(kind)?)
    }
}
