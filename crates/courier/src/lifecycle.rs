//! Started flag and best-effort endpoint release

use courier_transport::SocketControl;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Whether an agent releases its endpoint by unbinding or disconnecting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Bound the endpoint; stop unbinds
    Server,
    /// Connected to the endpoint; stop disconnects
    Client,
}

/// Agent connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// No socket, or the socket was released by stop
    Disconnected,
    /// Socket is attached but nothing has happened on it yet
    Idle,
    /// The agent is serving traffic
    Started,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Idle => f.write_str("idle"),
            Self::Started => f.write_str("started"),
        }
    }
}

struct LifecycleState {
    state: AgentState,
    control: Option<SocketControl>,
}

/// Shared lifecycle of one agent's socket.
///
/// The agent loop owns the socket itself; this handle only keeps a
/// [`SocketControl`] so another task can release the endpoint.
#[derive(Clone)]
pub struct Lifecycle {
    role: Role,
    inner: Arc<Mutex<LifecycleState>>,
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("role", &self.role)
            .field("state", &self.state())
            .finish()
    }
}

impl Lifecycle {
    /// Create a disconnected lifecycle
    pub fn new(role: Role) -> Self {
        Self {
            role,
            inner: Arc::new(Mutex::new(LifecycleState {
                state: AgentState::Disconnected,
                control: None,
            })),
        }
    }

    /// Role of the agent
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current state
    pub fn state(&self) -> AgentState {
        self.inner.lock().state
    }

    /// Check if the agent is started
    pub fn is_started(&self) -> bool {
        self.state() == AgentState::Started
    }

    /// Record a freshly attached socket
    pub fn attach(&self, control: SocketControl) {
        let mut inner = self.inner.lock();
        inner.control = Some(control);
        inner.state = AgentState::Idle;
    }

    /// Mark the agent as started; no effect once stopped
    pub fn mark_started(&self) {
        let mut inner = self.inner.lock();
        if inner.state == AgentState::Idle {
            inner.state = AgentState::Started;
        }
    }

    /// Release `endpoint` if the agent was started.
    ///
    /// Servers unbind, clients disconnect. Does nothing when not started.
    /// Release failures are logged and swallowed; the agent always ends up
    /// disconnected.
    pub fn stop(&self, endpoint: &str) {
        let control = {
            let mut inner = self.inner.lock();
            if inner.state != AgentState::Started {
                debug!("Stop on {} ignored, agent is {}", endpoint, inner.state);
                return;
            }
            inner.state = AgentState::Disconnected;
            inner.control.take()
        };

        let Some(control) = control else {
            warn!("Stop on {}: no socket attached", endpoint);
            return;
        };

        let released = match self.role {
            Role::Server => control.unbind(endpoint),
            Role::Client => control.disconnect(endpoint),
        };

        match released {
            Ok(()) => info!("Stopped, released {}", endpoint),
            Err(e) => warn!("Failed to release {} during stop: {}", endpoint, e),
        }
    }
}
