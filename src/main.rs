//! Admission gate (v1)
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!                       │                ADMISSION GATE                │
//!     Client Request    │  ┌─────────┐   ┌──────┐   ┌────────┐         │
//!     ──────────────────┼─▶│ session │──▶│ gate │──▶│ guards │──┐      │
//!                       │  └─────────┘   └──┬───┘   └───┬────┘  │      │
//!                       │                   │           │       ▼      │
//!                       │            ┌──────┴─────┐ ┌───┴────┐ proxy ──┼──▶ Marketplace
//!                       │            │ geo-fence  │ │ admin/ │         │    application
//!                       │            │ admission  │ │ vendor │         │
//!                       │            │ + breaker  │ │ verify │         │
//!                       │            └──────┬─────┘ └───┬────┘         │
//!                       └───────────────────┼───────────┼──────────────┘
//!                                           ▼           ▼
//!                                   counters RPC   auth + principal tables
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use admission_gate::backend::Backends;
use admission_gate::config::{load_config, load_from_env};
use admission_gate::lifecycle::{spawn_signal_handler, Shutdown};
use admission_gate::observability::{logging, metrics};
use admission_gate::HttpServer;

#[derive(Parser)]
#[command(name = "admission-gate")]
#[command(about = "Geo-fencing, rate limiting and privileged-route verification in front of the marketplace")]
struct Cli {
    /// TOML configuration file. Without it, defaults plus environment are used.
    #[arg(short, long, env = "GATE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "admission-gate starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.url,
        backend = ?config.backend.kind,
        geo_enabled = config.geo.enabled,
        development_mode = config.geo.development_mode,
        rate_limit_enabled = config.rate_limit.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let backends = Backends::from_config(&config)?;
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    spawn_signal_handler(shutdown);

    let server = HttpServer::new(config, backends)?;
    server.run(listener, stop).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
