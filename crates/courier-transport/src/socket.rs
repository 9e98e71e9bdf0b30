//! Sockets, roles and remote control handles

use crate::{Context, Endpoint, TransportError};
use courier_proto::{Envelope, Frame, Identity};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tracing::{debug, info};

/// Socket routing role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    /// Prepends the sender identity on receive, routes by frame 0 on send
    Router,
    /// Fair-queues on receive, round-robins on send, frames untouched
    Dealer,
}

impl SocketKind {
    fn zmq_type(self) -> zmq::SocketType {
        match self {
            Self::Router => zmq::ROUTER,
            Self::Dealer => zmq::DEALER,
        }
    }
}

impl fmt::Display for SocketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Router => f.write_str("ROUTER"),
            Self::Dealer => f.write_str("DEALER"),
        }
    }
}

/// Socket tuning
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Envelopes queued per peer and direction before a router drops or a
    /// dealer waits
    pub high_water_mark: i32,
    /// Largest inbound message accepted, `None` for no limit
    pub max_message_size: Option<i64>,
    /// How long unsent envelopes linger when the socket closes
    pub linger: Duration,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            high_water_mark: 1000,
            max_message_size: None,
            linger: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Attachment {
    /// Bound; holds the resolved endpoint ZeroMQ reported
    Bound(String),
    Connected,
}

/// State shared between a socket and its control handles
struct Shared {
    kind: SocketKind,
    socket: Mutex<zmq::Socket>,
    endpoints: Mutex<HashMap<String, Attachment>>,
}

/// ZeroMQ's notification descriptor. Owned by the socket; never closed here.
struct NotifyFd(RawFd);

impl AsRawFd for NotifyFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

/// A ZeroMQ ROUTER or DEALER socket driven from tokio.
///
/// Operations never block a runtime thread: each one is attempted without
/// waiting, and on `EAGAIN` the socket parks on ZeroMQ's notification
/// descriptor until its event state changes. A socket is owned by a single
/// task; other tasks that need to release its endpoints use a
/// [`SocketControl`].
pub struct Socket {
    // Deregistered before `shared` can close the ZeroMQ socket
    readiness: AsyncFd<NotifyFd>,
    context: Context,
    shared: Arc<Shared>,
    identity: Identity,
}

impl Socket {
    /// Create a socket with default options
    pub fn new(context: &Context, kind: SocketKind) -> Result<Self, TransportError> {
        Self::with_options(context, kind, SocketOptions::default())
    }

    /// Create a socket with custom options.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_options(
        context: &Context,
        kind: SocketKind,
        options: SocketOptions,
    ) -> Result<Self, TransportError> {
        let socket = context.zmq_socket(kind.zmq_type())?;
        socket.set_sndhwm(options.high_water_mark)?;
        socket.set_rcvhwm(options.high_water_mark)?;
        socket.set_linger(options.linger.as_millis().min(i32::MAX as u128) as i32)?;
        socket.set_maxmsgsize(options.max_message_size.unwrap_or(-1))?;

        let readiness = AsyncFd::with_interest(NotifyFd(socket.get_fd()?), Interest::READABLE)?;

        Ok(Self {
            readiness,
            context: context.clone(),
            shared: Arc::new(Shared {
                kind,
                socket: Mutex::new(socket),
                endpoints: Mutex::new(HashMap::new()),
            }),
            identity: Identity::default(),
        })
    }

    /// Socket role
    pub fn kind(&self) -> SocketKind {
        self.shared.kind
    }

    /// Identity announced to peers
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Set the identity announced on future connections
    pub fn set_identity(&mut self, identity: Identity) -> Result<(), TransportError> {
        self.shared.socket.lock().set_identity(identity.as_bytes())?;
        self.identity = identity;
        Ok(())
    }

    /// Handle for releasing endpoints from another task
    pub fn control(&self) -> SocketControl {
        SocketControl {
            kind: self.shared.kind,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Address actually bound for `endpoint`, useful after binding port 0
    pub fn local_addr(&self, endpoint: &str) -> Option<SocketAddr> {
        match self.shared.endpoints.lock().get(endpoint)? {
            Attachment::Bound(resolved) => resolved.strip_prefix("tcp://")?.parse().ok(),
            Attachment::Connected => None,
        }
    }

    /// Start accepting peers on `endpoint`. Port 0 picks a free port.
    pub fn bind(&mut self, endpoint: &str) -> Result<(), TransportError> {
        Endpoint::parse(endpoint)?;
        let mut endpoints = self.shared.endpoints.lock();
        if endpoints.contains_key(endpoint) {
            return Err(TransportError::AddressInUse(endpoint.to_string()));
        }

        let socket = self.shared.socket.lock();
        socket.bind(endpoint).map_err(|e| match e {
            zmq::Error::EADDRINUSE => TransportError::AddressInUse(endpoint.to_string()),
            other => other.into(),
        })?;
        let resolved = socket
            .get_last_endpoint()?
            .unwrap_or_else(|_| endpoint.to_string());

        info!("{} socket bound to {} ({})", self.shared.kind, endpoint, resolved);
        endpoints.insert(endpoint.to_string(), Attachment::Bound(resolved));
        Ok(())
    }

    /// Connect to a bound socket at `endpoint`.
    ///
    /// The connection is made in the background; envelopes sent before it
    /// completes are queued for it.
    pub fn connect(&mut self, endpoint: &str) -> Result<(), TransportError> {
        Endpoint::parse(endpoint)?;
        if self.context.is_terminating() {
            return Err(TransportError::Terminating);
        }
        let mut endpoints = self.shared.endpoints.lock();
        if endpoints.contains_key(endpoint) {
            return Err(TransportError::AddressInUse(endpoint.to_string()));
        }

        self.shared.socket.lock().connect(endpoint)?;
        info!("{} socket {} connecting to {}", self.shared.kind, self.identity, endpoint);
        endpoints.insert(endpoint.to_string(), Attachment::Connected);
        Ok(())
    }

    /// Stop accepting on `endpoint` and drop the peers it accepted
    pub fn unbind(&mut self, endpoint: &str) -> Result<(), TransportError> {
        self.control().unbind(endpoint)
    }

    /// Drop the connection made to `endpoint`
    pub fn disconnect(&mut self, endpoint: &str) -> Result<(), TransportError> {
        self.control().disconnect(endpoint)
    }

    /// Wait for the next envelope.
    ///
    /// A ROUTER prepends the sending peer's identity as frame 0.
    pub async fn recv(&mut self) -> Result<Envelope, TransportError> {
        loop {
            match self.try_recv() {
                Err(TransportError::TryAgain) => {}
                other => return other,
            }
            tokio::select! {
                biased;
                _ = self.context.terminated() => return Err(TransportError::Terminating),
                ready = self.wait_for(zmq::POLLIN) => ready?,
            }
        }
    }

    /// Receive without waiting; [`TransportError::TryAgain`] if nothing is queued
    pub fn try_recv(&mut self) -> Result<Envelope, TransportError> {
        if self.context.is_terminating() {
            return Err(TransportError::Terminating);
        }
        let parts = self.shared.socket.lock().recv_multipart(zmq::DONTWAIT)?;
        Ok(parts.into_iter().map(Frame::from).collect())
    }

    /// Wait up to `wait` for an envelope; [`TransportError::TryAgain`] on timeout
    pub async fn poll_in(&mut self, wait: Duration) -> Result<Envelope, TransportError> {
        match tokio::time::timeout(wait, self.recv()).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::TryAgain),
        }
    }

    /// Queue an envelope for sending. All frames go out together or none do.
    ///
    /// A ROUTER strips frame 0 and delivers the rest to the peer it names;
    /// unknown peers and full peer queues drop the envelope. A DEALER hands
    /// the envelope to the next peer in turn and waits while no peer can
    /// take it.
    pub async fn send(&mut self, envelope: Envelope) -> Result<(), TransportError> {
        loop {
            if self.context.is_terminating() {
                return Err(TransportError::Terminating);
            }
            let sent = self
                .shared
                .socket
                .lock()
                .send_multipart(envelope.iter().map(Frame::as_bytes), zmq::DONTWAIT);
            match sent {
                Ok(()) => return Ok(()),
                Err(zmq::Error::EAGAIN) => {
                    debug!("{} socket cannot send yet, waiting", self.shared.kind);
                }
                Err(e) => return Err(e.into()),
            }
            tokio::select! {
                biased;
                _ = self.context.terminated() => return Err(TransportError::Terminating),
                ready = self.wait_for(zmq::POLLOUT) => ready?,
            }
        }
    }

    /// Park until ZeroMQ reports `events` on this socket.
    ///
    /// The notification descriptor only signals that the event state may
    /// have changed, so the state is checked before every wait.
    async fn wait_for(&self, events: zmq::PollEvents) -> Result<(), TransportError> {
        loop {
            if self.shared.socket.lock().get_events()?.contains(events) {
                return Ok(());
            }
            let mut guard = self.readiness.readable().await?;
            guard.clear_ready();
        }
    }
}

/// Cloneable handle that releases a socket's endpoints from any task.
///
/// It does not keep the socket open; once the owning [`Socket`] is dropped
/// every call reports [`TransportError::Closed`].
#[derive(Clone)]
pub struct SocketControl {
    kind: SocketKind,
    shared: Weak<Shared>,
}

impl fmt::Debug for SocketControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketControl").field("kind", &self.kind).finish()
    }
}

impl SocketControl {
    /// Stop accepting on a bound endpoint and drop the peers it accepted
    pub fn unbind(&self, endpoint: &str) -> Result<(), TransportError> {
        self.release(endpoint, true)
    }

    /// Drop the connection made to `endpoint`
    pub fn disconnect(&self, endpoint: &str) -> Result<(), TransportError> {
        self.release(endpoint, false)
    }

    fn release(&self, endpoint: &str, bound: bool) -> Result<(), TransportError> {
        let shared = self.shared.upgrade().ok_or(TransportError::Closed)?;
        let mut endpoints = shared.endpoints.lock();
        let target = match endpoints.get(endpoint) {
            Some(Attachment::Bound(resolved)) if bound => resolved.clone(),
            Some(Attachment::Connected) if !bound => endpoint.to_string(),
            _ => return Err(TransportError::EndpointNotFound(endpoint.to_string())),
        };

        let socket = shared.socket.lock();
        if bound {
            socket.unbind(&target)?;
        } else {
            socket.disconnect(&target)?;
        }
        endpoints.remove(endpoint);

        info!(
            "{} socket {} {}",
            self.kind,
            if bound { "unbound from" } else { "disconnected from" },
            endpoint
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests;
