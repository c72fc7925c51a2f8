//! Signet Daemon - Main entry point
//!
//! Serves the device service over HTTP until interrupted.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use signet_daemon::{api, DaemonConfig, DeviceService, InMemoryDeviceStore};

#[derive(Parser, Debug)]
#[command(name = "signet-daemon")]
#[command(about = "Signature device service with chained signing")]
struct Args {
    /// Path to the JSON config file (defaults to $SIGNET_CONFIG or the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the config file
    #[arg(short, long)]
    listen: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config_path = args.config.unwrap_or_else(DaemonConfig::default_path);
    let mut config = DaemonConfig::load_or_create(&config_path)?;
    if let Some(listen) = args.listen {
        config.listen_address = listen;
        config.validate()?;
    }

    // Initialize logging
    let default_filter = if args.verbose {
        "signet_daemon=debug,tower_http=debug".to_string()
    } else {
        config.log_filter.clone()
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Signet daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("Using config at {:?}", config_path);

    let store = Arc::new(InMemoryDeviceStore::new());
    let service =
        Arc::new(DeviceService::new(store).with_rsa_key_bits(config.rsa_key_bits));
    let app = api::router(service);

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Daemon shutting down");

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received shutdown signal");
    }
}
