//! Courier Broker Binary
//!
//! Runs the relay with its worker pool and, optionally, a few demo clients
//! that tick requests through it. Set `COURIER_CONFIG` to a TOML file to
//! override the defaults; `RUST_LOG` controls log output.

use anyhow::{Context as _, Result};
use courier::transport::Context;
use courier::{BrokerConfig, ClientAgent, Relay};
use std::future::Future;
use std::io;
use tokio::task::JoinSet;
use tracing::{error, info};

const CONFIG_ENV: &str = "COURIER_CONFIG";

fn load_config() -> Result<BrokerConfig> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => {
            info!("Loading configuration from {}", path.to_string_lossy());
            BrokerConfig::from_file(&path).with_context(|| format!("invalid {}", CONFIG_ENV))
        }
        None => Ok(BrokerConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting Courier broker");

    let config = load_config()?;
    if let Err(e) = serve(config, tokio::signal::ctrl_c()).await {
        error!("Relay error: {:#}", e);
        std::process::exit(1);
    }

    info!("Broker shutting down");
    Ok(())
}

/// Run the relay and demo clients until `interrupt` resolves or the relay
/// stops on its own, which only happens when it fails.
async fn serve(config: BrokerConfig, interrupt: impl Future<Output = io::Result<()>>) -> Result<()> {
    let context = Context::new();

    let relay = Relay::bind(&context, config.relay.clone()).await?;
    let mut relay_task = tokio::spawn(relay.run());

    let mut clients = JoinSet::new();
    let mut agents = Vec::with_capacity(config.clients);
    for _ in 0..config.clients {
        let agent = ClientAgent::new(&context, config.client.clone());
        let runner = agent.clone();
        let endpoint = config.client.endpoint.clone();
        clients.spawn(async move { runner.run(&endpoint).await });
        agents.push(agent);
    }
    if !agents.is_empty() {
        info!("Started {} demo client(s)", agents.len());
    }

    let relay_result = tokio::select! {
        signal = interrupt => {
            signal?;
            info!("Interrupt received, shutting down");
            context.terminate();
            relay_task.await?
        }
        joined = &mut relay_task => {
            context.terminate();
            joined?
        }
    };

    while let Some(joined) = clients.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Client error: {}", e),
            Err(e) => error!("Client task failed: {}", e),
        }
    }

    for agent in &agents {
        match agent.refresh_output() {
            Ok(text) => info!(
                "{} sent {} request(s), received:\n{}",
                agent.identity(),
                agent.requests_sent(),
                text
            ),
            Err(e) => error!("{} output is not text: {}", agent.identity(), e),
        }
    }

    Ok(relay_result?)
}
