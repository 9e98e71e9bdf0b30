//! Ticking client agent

use crate::{AgentState, ClientConfig, Lifecycle, OutputLog, Result, Role};
use chrono::Local;
use courier_proto::{Envelope, Frame, Identity, ProtocolError};
use courier_transport::{step, Context, Socket, SocketKind, Step};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

/// Client that sends one request per tick and logs every reply.
///
/// Clones share identity, output log, UI queue and lifecycle, so a clone
/// can run the loop while the original serves the UI.
#[derive(Clone)]
pub struct ClientAgent {
    context: Context,
    config: ClientConfig,
    identity: Identity,
    lifecycle: Lifecycle,
    output: OutputLog,
    pending: Arc<Mutex<Vec<Frame>>>,
    sent: Arc<AtomicU64>,
}

impl ClientAgent {
    /// Create a client; it connects when [`run`](Self::run) is called
    pub fn new(context: &Context, config: ClientConfig) -> Self {
        let identity = match &config.identity {
            Some(name) => Identity::new(name.clone()),
            None => Identity::random_client(),
        };
        let output = OutputLog::new(config.output_order);

        Self {
            context: context.clone(),
            config,
            identity,
            lifecycle: Lifecycle::new(Role::Client),
            output,
            pending: Arc::new(Mutex::new(Vec::new())),
            sent: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Identity announced to the relay
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Lifecycle handle
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Current connection state
    pub fn state(&self) -> AgentState {
        self.lifecycle.state()
    }

    /// Log of received frames
    pub fn output(&self) -> &OutputLog {
        &self.output
    }

    /// Number of requests sent so far
    pub fn requests_sent(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }

    /// Queue a frame to ride along with the next request
    pub fn input_text_from_ui(&self, frame: Frame) {
        self.pending.lock().push(frame);
    }

    /// Append a frame to the output log
    pub fn output_text_to_ui(&self, frame: Frame) {
        self.output.append(frame);
    }

    /// Output log as newline-terminated text lines
    pub fn refresh_output(&self) -> std::result::Result<String, ProtocolError> {
        self.output.render()
    }

    /// Release the connection to `endpoint` if started
    pub fn stop(&self, endpoint: &str) {
        self.lifecycle.stop(endpoint);
    }

    /// Connect to `endpoint` and tick until terminated, stopped, or
    /// `max_requests` is reached.
    ///
    /// Each tick polls in short slices for replies, ending early once one
    /// arrives, then sends exactly one request. After the last of
    /// `max_requests` sends, one more tick collects its reply.
    pub async fn run(&self, endpoint: &str) -> Result<()> {
        let mut socket = Socket::with_options(
            &self.context,
            SocketKind::Dealer,
            self.config.transport.socket_options(),
        )?;
        socket.set_identity(self.identity.clone())?;

        match socket.connect(endpoint) {
            Ok(()) => {}
            Err(e) if e.is_terminating() => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        self.lifecycle.attach(socket.control());
        info!("Client {} connected to {}", self.identity, endpoint);

        let mut requests = 0u64;
        loop {
            if !self.poll_tick(&mut socket).await? {
                info!("Client {} interrupted", self.identity);
                return Ok(());
            }

            if self.lifecycle.state() == AgentState::Disconnected {
                info!("Client {} stopped after {} request(s)", self.identity, requests);
                return Ok(());
            }

            requests += 1;
            let request = self.build_request(requests);
            match step(socket.send(request).await)? {
                Step::Ready(()) => {
                    self.sent.store(requests, Ordering::SeqCst);
                    debug!("Client {} sent request {}", self.identity, requests);
                }
                Step::Retry => debug!("Client {} request {} not queued", self.identity, requests),
                Step::Terminating => {
                    info!("Client {} interrupted", self.identity);
                    return Ok(());
                }
            }

            if self.config.max_requests.is_some_and(|max| requests >= max) {
                // One more tick for the reply to the last request
                self.poll_tick(&mut socket).await?;
                info!("Client {} sent {} request(s), done", self.identity, requests);
                return Ok(());
            }
        }
    }

    /// Poll in short slices until a reply arrives or the tick runs out.
    ///
    /// The slices share the tick's deadline. Returns `false` once the
    /// context is terminating.
    async fn poll_tick(&self, socket: &mut Socket) -> Result<bool> {
        let deadline = Instant::now() + self.config.tick();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(true);
            }
            match step(socket.poll_in(remaining.min(self.config.poll_interval())).await)? {
                Step::Ready(envelope) => {
                    self.lifecycle.mark_started();
                    debug!("Client {} received {} frame(s)", self.identity, envelope.len());
                    self.output.extend(envelope);
                    return Ok(true);
                }
                Step::Retry => {
                    tokio::time::sleep(self.config.retry_pause().min(remaining)).await;
                }
                Step::Terminating => return Ok(false),
            }
        }
    }

    /// `[identity, "Response: Request <n> at <time>", ui frames...]`
    fn build_request(&self, n: u64) -> Envelope {
        let text = format!("Response: Request {} at {}", n, Local::now().format("%H:%M:%S"));
        let mut envelope = Envelope::new()
            .with(self.identity.to_frame())
            .with(Frame::text(text));
        envelope.extend(self.pending.lock().drain(..));
        envelope
    }
}
