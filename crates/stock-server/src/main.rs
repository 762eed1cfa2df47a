mod config;
mod registry;
mod wiring;

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use api::AppState;
use runtime::clock::unix_now_ms;
use stock_core::SnapshotStore;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    runtime::logging::init_tracing()?;
    let config = config::Config::from_env()?;
    let registry = Arc::new(registry::load_registry(Path::new(&config.providers_file))?);
    let store = Arc::new(SnapshotStore::new(unix_now_ms()));

    let poller = wiring::build_poller(&config, Arc::clone(&registry), Arc::clone(&store))?;
    let shutdown = CancellationToken::new();
    let poller_task = tokio::spawn(poller.run(shutdown.clone()));

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(
        addr = %config.listen_addr,
        providers = registry.len(),
        interval_ms = config.poll_interval.as_millis() as u64,
        proxy = config.http_proxy.is_some(),
        "stock server listening"
    );

    let app = wiring::build_app(AppState::new(store, registry));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    poller_task.await?;
    info!("stock server stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                warn!(error = %err, "ctrl-c handler unavailable");
                shutdown.cancelled().await;
            }
        }
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}
