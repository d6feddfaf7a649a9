//! DistriSchool edge gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                     GATEWAY                          │
//!   Client Request     │  ┌────────┐   ┌─────────┐   ┌──────────────────────┐ │
//!   ───────────────────┼─▶│  http  │──▶│ routing │──▶│ pipeline stages      │ │
//!                      │  │ server │   │  table  │   │ authn → authz        │ │
//!                      │  └────────┘   └─────────┘   └──────────┬───────────┘ │
//!                      │                                        ▼             │
//!                      │                             ┌──────────────────────┐ │
//!                      │                             │ resilience: breaker  │ │
//!                      │                             └──────────┬───────────┘ │
//!                      │                                        ▼             │
//!   Client Response    │  ┌──────────────┐           ┌──────────────────────┐ │
//!   ◀──────────────────┼──│ fallback /   │◀──────────│ proxy: dispatcher    │─┼──▶ Upstream
//!                      │  │ error handler│           │ + hyper client       │ │    Service
//!                      │  └──────────────┘           └──────────────────────┘ │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use school_gateway::config::load_config;
use school_gateway::http::GatewayServer;
use school_gateway::lifecycle::{signals, startup, Shutdown};
use school_gateway::observability::{logging, metrics};

#[derive(Debug, Parser)]
#[command(name = "school-gateway", version, about = "Edge gateway for the DistriSchool services")]
struct Args {
    /// Path to the TOML configuration file. Built-in defaults apply without one.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Load and validate the configuration, then exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    logging::init(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "school-gateway starting"
    );

    let validator = startup::prepare(&config)?;

    if args.check {
        tracing::info!(
            routes = config.routes.len(),
            upstreams = config.upstreams.len(),
            "Configuration is valid"
        );
        return Ok(());
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    let server = GatewayServer::new(config, validator)?;
    server.run(listener, shutdown.signalled()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
