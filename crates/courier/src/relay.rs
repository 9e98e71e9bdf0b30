//! Frontend/backend relay
//!
//! The relay binds a ROUTER for clients and a DEALER for workers and shuttles
//! envelopes between them. The ROUTER's identity frame travels with each
//! request and comes back as frame 0 of the reply, which is all the routing
//! there is: the relay never looks at payloads and remembers nothing between
//! envelopes.

use crate::{CourierError, EchoHandler, Lifecycle, RelayConfig, RequestHandler, Result, Role, WorkerPool};
use courier_transport::{step, Context, Socket, SocketKind, Step};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Forwarding counters
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    requests: Arc<AtomicU64>,
    replies: Arc<AtomicU64>,
}

impl RelayStats {
    /// Envelopes forwarded from clients to workers
    pub fn requests_forwarded(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Envelopes forwarded from workers to clients
    pub fn replies_forwarded(&self) -> u64 {
        self.replies.load(Ordering::Relaxed)
    }
}

/// Bound relay, ready to launch workers and forward
pub struct Relay {
    context: Context,
    config: RelayConfig,
    frontend: Socket,
    backend: Socket,
    backend_endpoint: String,
    handler: Arc<dyn RequestHandler>,
    lifecycle: Lifecycle,
    stats: RelayStats,
}

impl Relay {
    /// Bind the frontend to the public endpoint and the backend to the
    /// internal one
    pub async fn bind(context: &Context, config: RelayConfig) -> Result<Self> {
        config.validate()?;
        let options = config.transport.socket_options();

        let mut frontend = Socket::with_options(context, SocketKind::Router, options.clone())?;
        frontend.bind(&config.frontend_endpoint)?;

        let mut backend = Socket::with_options(context, SocketKind::Dealer, options)?;
        backend.bind(&config.backend_endpoint)?;

        // Workers need a connectable address even when port 0 was requested
        let backend_endpoint = match backend.local_addr(&config.backend_endpoint) {
            Some(addr) => format!("tcp://{}", addr),
            None => config.backend_endpoint.clone(),
        };

        let lifecycle = Lifecycle::new(Role::Server);
        lifecycle.attach(frontend.control());
        lifecycle.mark_started();

        Ok(Self {
            context: context.clone(),
            config,
            frontend,
            backend,
            backend_endpoint,
            handler: Arc::new(EchoHandler),
            lifecycle,
            stats: RelayStats::default(),
        })
    }

    /// Bind, then run until terminated
    pub async fn start(context: &Context, config: RelayConfig) -> Result<()> {
        Self::bind(context, config).await?.run().await
    }

    /// Use `handler` in the workers this relay launches
    pub fn with_handler(mut self, handler: Arc<dyn RequestHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Address the frontend is listening on
    pub fn frontend_addr(&self) -> Option<SocketAddr> {
        self.frontend.local_addr(&self.config.frontend_endpoint)
    }

    /// Connectable internal endpoint for workers
    pub fn backend_endpoint(&self) -> &str {
        &self.backend_endpoint
    }

    /// Lifecycle handle; stopping it unbinds the frontend
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Forwarding counters, shared with the running relay
    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }

    /// Release the public endpoint if started
    pub fn stop(&self, endpoint: &str) {
        self.lifecycle.stop(endpoint);
    }

    /// Launch the worker pool and forward in both directions until the
    /// context terminates
    pub async fn run(self) -> Result<()> {
        let Relay {
            context,
            config,
            mut frontend,
            mut backend,
            backend_endpoint,
            handler,
            stats,
            ..
        } = self;

        let mut pool = WorkerPool::spawn(&context, &config.worker, handler, &backend_endpoint, config.workers);
        info!(
            "Relay forwarding {} <-> {} with {} worker(s)",
            config.frontend_endpoint, backend_endpoint, pool.len()
        );

        let result = forward(&context, &mut frontend, &mut backend, &mut pool, &stats).await;
        match result {
            Ok(()) => {
                info!(
                    "Relay interrupted after {} request(s) and {} reply(ies)",
                    stats.requests_forwarded(),
                    stats.replies_forwarded()
                );
                pool.join_all().await
            }
            Err(e) => {
                pool.abort();
                Err(e)
            }
        }
    }
}

/// Shuttle envelopes between the two sockets until terminated.
///
/// A request from client C arrives as `[C, ...]` and leaves the backend
/// unchanged; the worker echoes `C` as frame 0 of its reply, which the
/// frontend uses to pick the connection. Losing every worker ends the loop,
/// since the backend could never take another request.
async fn forward(
    context: &Context,
    frontend: &mut Socket,
    backend: &mut Socket,
    pool: &mut WorkerPool,
    stats: &RelayStats,
) -> Result<()> {
    loop {
        tokio::select! {
            request = frontend.recv() => {
                let request = match step(request)? {
                    Step::Ready(request) => request,
                    Step::Retry => continue,
                    Step::Terminating => return Ok(()),
                };
                let sent = tokio::select! {
                    sent = backend.send(request) => sent,
                    _ = pool.exhausted(), if pool.running() > 0 => return workers_gone(context),
                };
                match step(sent)? {
                    Step::Ready(()) => {
                        stats.requests.fetch_add(1, Ordering::Relaxed);
                    }
                    Step::Retry => debug!("Backend did not take request"),
                    Step::Terminating => return Ok(()),
                }
            }
            reply = backend.recv() => {
                let reply = match step(reply)? {
                    Step::Ready(reply) => reply,
                    Step::Retry => continue,
                    Step::Terminating => return Ok(()),
                };
                match step(frontend.send(reply).await)? {
                    Step::Ready(()) => {
                        stats.replies.fetch_add(1, Ordering::Relaxed);
                    }
                    Step::Retry => debug!("Frontend did not take reply"),
                    Step::Terminating => return Ok(()),
                }
            }
            Some(exit) = pool.next_exit(), if pool.running() > 0 => {
                if let Err(e) = exit {
                    warn!("Relay lost a worker: {}", e);
                }
                if pool.running() == 0 {
                    return workers_gone(context);
                }
            }
        }
    }
}

fn workers_gone(context: &Context) -> Result<()> {
    if context.is_terminating() {
        return Ok(());
    }
    error!("Every worker has exited, relay cannot forward requests");
    Err(CourierError::Worker("every worker has exited".to_string()))
}
