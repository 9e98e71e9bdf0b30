//! Worker agent and request handlers

use crate::{AgentState, Lifecycle, OutputLog, Result, Role, WorkerConfig};
use async_trait::async_trait;
use courier_proto::{Envelope, Frame, ProtocolError};
use courier_transport::{step, Context, Socket, SocketKind, Step};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Handler trait for turning a request payload into a reply payload
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Handle one payload sent by `client` and return the reply payload
    async fn handle(&self, client: &Frame, payload: Envelope) -> Result<Envelope>;
}

/// Replies with the request payload unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoHandler;

#[async_trait]
impl RequestHandler for EchoHandler {
    async fn handle(&self, _client: &Frame, payload: Envelope) -> Result<Envelope> {
        Ok(payload)
    }
}

/// Worker that serves one request at a time from the relay's backend.
///
/// Requests arrive as `[routing, client identity, payload...]`; replies go
/// back as `[client identity, reply payload...]`.
#[derive(Clone)]
pub struct WorkerAgent {
    context: Context,
    config: WorkerConfig,
    name: String,
    handler: Arc<dyn RequestHandler>,
    lifecycle: Lifecycle,
    output: OutputLog,
    served: Arc<AtomicU64>,
}

impl WorkerAgent {
    /// Create an echoing worker
    pub fn new(context: &Context, config: WorkerConfig, name: impl Into<String>) -> Self {
        Self::with_handler(context, config, name, Arc::new(EchoHandler))
    }

    /// Create a worker with a custom handler
    pub fn with_handler(
        context: &Context,
        config: WorkerConfig,
        name: impl Into<String>,
        handler: Arc<dyn RequestHandler>,
    ) -> Self {
        let output = OutputLog::new(config.output_order);
        Self {
            context: context.clone(),
            config,
            name: name.into(),
            handler,
            lifecycle: Lifecycle::new(Role::Client),
            output,
            served: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Worker name used in logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lifecycle handle
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Log of sent replies
    pub fn output(&self) -> &OutputLog {
        &self.output
    }

    /// Output log as newline-terminated text lines
    pub fn refresh_output(&self) -> std::result::Result<String, ProtocolError> {
        self.output.render()
    }

    /// Number of replies sent
    pub fn served(&self) -> u64 {
        self.served.load(Ordering::SeqCst)
    }

    /// Release the connection to `endpoint` if started
    pub fn stop(&self, endpoint: &str) {
        self.lifecycle.stop(endpoint);
    }

    /// Connect to the relay backend and serve until terminated
    pub async fn run(&self, endpoint: &str) -> Result<()> {
        let mut socket = Socket::with_options(
            &self.context,
            SocketKind::Dealer,
            self.config.transport.socket_options(),
        )?;

        match socket.connect(endpoint) {
            Ok(()) => {}
            Err(e) if e.is_terminating() => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        self.lifecycle.attach(socket.control());
        self.lifecycle.mark_started();
        info!("Worker {} connected to {}", self.name, endpoint);

        loop {
            let request = match step(socket.recv().await)? {
                Step::Ready(request) => request,
                Step::Retry => continue,
                Step::Terminating => {
                    info!("Worker {} interrupted after {} request(s)", self.name, self.served());
                    return Ok(());
                }
            };

            if self.lifecycle.state() == AgentState::Disconnected {
                info!("Worker {} stopped", self.name);
                return Ok(());
            }

            let Some(reply) = self.serve(request).await else {
                continue;
            };

            self.output.extend(reply.iter().cloned());
            match step(socket.send(reply).await)? {
                Step::Ready(()) => {
                    self.served.fetch_add(1, Ordering::SeqCst);
                }
                Step::Retry => debug!("Worker {} reply not queued", self.name),
                Step::Terminating => {
                    info!("Worker {} interrupted after {} request(s)", self.name, self.served());
                    return Ok(());
                }
            }
        }
    }

    /// Build the reply for one request, or `None` if it must be dropped
    async fn serve(&self, request: Envelope) -> Option<Envelope> {
        if request.len() < 3 {
            warn!("Worker {} dropping request with {} frame(s)", self.name, request.len());
            return None;
        }

        let identity = request.get(1)?.clone();
        let payload = request.payload_from(2);
        debug!("Worker {} serving {} ({} frame payload)", self.name, identity, payload.len());

        match self.handler.handle(&identity, payload).await {
            Ok(reply_payload) => {
                let mut reply = Envelope::new().with(identity);
                reply.extend(reply_payload);
                Some(reply)
            }
            Err(e) => {
                error!("Worker {} handler failed for {}: {}", self.name, identity, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CourierError;
    use proptest::prelude::*;

    struct Upper;

    #[async_trait]
    impl RequestHandler for Upper {
        async fn handle(&self, _client: &Frame, payload: Envelope) -> Result<Envelope> {
            payload
                .iter()
                .map(|frame| -> Result<Frame> { Ok(Frame::text(frame.to_text()?.to_uppercase())) })
                .collect()
        }
    }

    struct Failing;

    #[async_trait]
    impl RequestHandler for Failing {
        async fn handle(&self, _client: &Frame, _payload: Envelope) -> Result<Envelope> {
            Err(CourierError::Worker("boom".to_string()))
        }
    }

    fn request() -> Envelope {
        Envelope::new()
            .with("CLIENT [3]")
            .with("CLIENT [3]")
            .with("Request 1 at T1")
    }

    #[tokio::test]
    async fn test_echo_reply_preserves_identity() {
        let worker = WorkerAgent::new(&Context::new(), WorkerConfig::default(), "w1");
        let reply = worker.serve(request()).await.unwrap();

        assert_eq!(reply, Envelope::new().with("CLIENT [3]").with("Request 1 at T1"));
    }

    #[tokio::test]
    async fn test_multi_frame_payload() {
        let worker = WorkerAgent::with_handler(&Context::new(), WorkerConfig::default(), "w1", Arc::new(Upper));
        let reply = worker.serve(request().with("second")).await.unwrap();

        let texts: Vec<&str> = reply.iter().map(|f| f.to_text().unwrap()).collect();
        assert_eq!(texts, vec!["CLIENT [3]", "REQUEST 1 AT T1", "SECOND"]);
    }

    #[tokio::test]
    async fn test_short_request_is_dropped() {
        let worker = WorkerAgent::new(&Context::new(), WorkerConfig::default(), "w1");
        assert!(worker.serve(Envelope::new().with("route").with("id")).await.is_none());
    }

    #[tokio::test]
    async fn test_handler_error_produces_no_reply() {
        let worker = WorkerAgent::with_handler(&Context::new(), WorkerConfig::default(), "w1", Arc::new(Failing));
        assert!(worker.serve(request()).await.is_none());
    }

    #[tokio::test]
    async fn test_connect_failure_is_fatal() {
        let worker = WorkerAgent::new(&Context::new(), WorkerConfig::default(), "w1");
        assert!(worker.run("tcp://127.0.0.1").await.is_err());
        assert_eq!(worker.lifecycle().state(), AgentState::Disconnected);
    }

    proptest! {
        #[test]
        fn test_echo_reply_is_identity_then_payload(
            identity in "CLIENT \\[[0-9]{1,4}\\]",
            payload in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 1..6)
        ) {
            let worker = WorkerAgent::new(&Context::new(), WorkerConfig::default(), "w1");
            let mut request = Envelope::new().with("route").with(identity.clone());
            request.extend(payload.iter().cloned().map(Frame::from));

            let reply = tokio_test::block_on(worker.serve(request)).unwrap();
            prop_assert_eq!(reply.len(), payload.len() + 1);
            prop_assert_eq!(reply.frame(0).unwrap().as_bytes(), identity.as_bytes());
            for (frame, bytes) in reply.iter().skip(1).zip(&payload) {
                prop_assert_eq!(frame.as_bytes(), bytes.as_slice());
            }
        }
    }
}
