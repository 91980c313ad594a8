use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use stormcast::config::load_config;
use stormcast::fanout::FanOut;
use stormcast::lifecycle::{self, Shutdown};
use stormcast::net::{self, Listener};
use stormcast::observability;
use stormcast::relay::RelayController;
use stormcast::scheduler::ExpiryScheduler;
use stormcast::store::WarningStore;
use stormcast::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "stormcast", about = "Real-time geospatial warning relay")]
struct Args {
    /// Path to a TOML config file; defaults apply without one.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    observability::init_tracing(&config.observability.log_filter);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        http_address = %config.http.bind_address,
        stream_address = %config.stream.bind_address,
        database_url = %config.database.url,
        "stormcast starting"
    );

    // Store first: everything else derives from it.
    let store = WarningStore::connect(&config.database.url, config.database.max_connections).await?;
    tracing::info!("Warning store ready");

    let (scheduler, fired_rx) = ExpiryScheduler::new();
    let controller = Arc::new(RelayController::new(store, scheduler, FanOut::new()));

    // Restore continuity: one timer per still-active warning.
    let restored = controller.restore().await?;
    tracing::info!(restored, "Expiry timers rebuilt from store");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();

    let expiry_loop =
        RelayController::spawn_expiry_loop(controller.clone(), fired_rx, shutdown.subscribe());

    // Stream transport.
    let stream_listener = Listener::bind(&config.stream).await?;
    let stream_task = {
        let controller = controller.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            net::run_stream_listener(stream_listener, controller, &shutdown).await;
        })
    };

    // Signals trigger the coordinated shutdown.
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            lifecycle::wait_for_signal().await;
            shutdown.trigger();
        });
    }

    // HTTP transport runs in the foreground.
    let http_listener = TcpListener::bind(&config.http.bind_address).await?;
    let server = HttpServer::new(&config, controller.clone(), &shutdown);
    server.run(http_listener, shutdown.subscribe()).await?;

    // HTTP drained; stop everything else without further writes.
    shutdown.trigger();
    controller.shutdown();
    let _ = stream_task.await;
    let _ = expiry_loop.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
