//! # requests — Binary Entry Point
//!
//! Loads the YAML configuration, opens the store, wires the service
//! clients and starts the Axum HTTP server.

use std::net::SocketAddr;
use std::path::PathBuf;

use adreq_api::bootstrap::{build_state, open_store};
use adreq_api::config::{ServiceConfig, DEFAULT_CONFIG_PATH};
use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;

/// DE administrative requests service.
#[derive(Parser, Debug)]
#[command(name = "requests", version, about)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Port to listen on.
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("installing Prometheus recorder")?;

    let config = ServiceConfig::load(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;

    let store = open_store(&config).await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;
    let state = build_state(&config, store)
        .context("wiring service clients")?
        .with_metrics(metrics);

    let app = adreq_api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tracing::info!("requests service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
