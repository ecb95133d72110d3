//! Rule-based reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌───────────────────────────────────────────────────┐
//!                      │                   RULE PROXY                      │
//!   Client Request     │  ┌────────┐   ┌─────────┐   ┌────────────────┐    │
//!   ───────────────────┼─▶│  http  │──▶│  rules  │──▶│ authentication │    │
//!                      │  │ server │   │ RuleSet │   │      gate      │    │
//!                      │  └────────┘   └────┬────┘   └───────┬────────┘    │
//!                      │         no match   │               │             │
//!                      │       (next: 404) ◀┘               ▼             │
//!                      │                            ┌────────────────┐    │
//!                      │                            │    request     │    │
//!                      │                            │  transformer   │    │
//!                      │                            └───────┬────────┘    │
//!   Client Response    │  ┌──────────┐   ┌──────────┐       ▼             │
//!   ◀──────────────────┼──│ response │◀──│ upstream │◀──────────────────┼──▶ Upstream
//!                      │  │transform │   │forwarder │                     │
//!                      │  └──────────┘   └──────────┘                     │
//!                      │   every request → one ProxyOutcome → Reporter     │
//!                      └───────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use rule_proxy::config::{load_config, ProxyConfig};
use rule_proxy::http::HttpServer;
use rule_proxy::lifecycle::{build_pipeline, shutdown_signal};
use rule_proxy::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "rule-proxy", version, about = "Rule-based HTTP reverse proxy")]
struct Args {
    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        rules = config.rules.len(),
        "rule-proxy starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let pipeline = build_pipeline(&config)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    HttpServer::new(pipeline).run(listener, shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
