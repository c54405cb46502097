//! Supervisor (§4.G): wires every component in dependency order, then
//! blocks on a termination signal and propagates shutdown.
//!
//! Construction order mirrors §4.G literally: codec (a library, not a
//! task) -> cache client -> endpoint pool -> forwarder -> correlator ->
//! ingest. Shutdown reverses it: correlator/forwarder first (best
//! effort, not guaranteed to drain), then ingest, then cache client and
//! endpoint pool.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::correlator::Correlator;
use crate::forwarder::{self, new_send_queue};
use crate::ingest::{run_log_listener, run_rpc_listener};
use crate::metrics::IngestMetrics;
use crate::pool::EndpointPool;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid listen address: {0}")]
    Addr(#[from] std::net::AddrParseError),
    #[error(transparent)]
    Pool(#[from] crate::pool::PoolError),
    #[error("cache unreachable: {0}")]
    Cache(#[from] shard_cache::CacheError),
}

/// Run the full pipeline until a termination signal arrives. Returns
/// once every component has been asked to stop.
pub async fn run(config: Config) -> Result<(), StartupError> {
    let log_addr: SocketAddr = config.frontend.log_listen.parse()?;
    let rpc_addr: SocketAddr = config.frontend.rpc_listen.parse()?;

    info!("connecting to shard cache...");
    let cache = Arc::new(shard_cache::ShardCache::connect(&config.store.redis.server).await?);
    info!("connecting to search backend endpoints...");
    let pool = Arc::new(EndpointPool::connect(&config.store.elasticsearchs).await?);
    if !pool.any_usable().await {
        error!("no backend endpoints were reachable at startup; continuing, maintenance tick will retry");
    }

    let metrics = Arc::new(IngestMetrics::new());
    let correlator = Arc::new(Correlator::new(cache.clone(), config.store.index.clone(), metrics.clone()));

    let (log_tx, log_rx) = mpsc::channel(config.frontend.queue_size);
    let (rpc_tx, rpc_rx) = mpsc::channel(config.frontend.queue_size);
    let (send_tx, send_rx) = new_send_queue();
    let (error_tx, error_rx) = mpsc::channel::<forwarder::BackendError>(64);

    let cancel = CancellationToken::new();

    let correlator_handle = tokio::spawn(correlator.clone().run(
        log_rx,
        rpc_rx,
        error_rx,
        error_tx,
        send_tx,
        send_rx,
        pool.clone(),
        cancel.clone(),
    ));

    let log_listener = tokio::spawn(run_log_listener(log_addr, log_tx, metrics.clone(), cancel.clone()));
    let rpc_listener = tokio::spawn(run_rpc_listener(rpc_addr, rpc_tx, metrics.clone(), cancel.clone()));

    info!("ingestd running");
    shutdown_signal().await;
    info!("shutdown signal received, draining");

    cancel.cancel();

    // Correlator/forwarder first (§4.G), then ingest listeners.
    let _ = correlator_handle.await;
    let _ = log_listener.await;
    let _ = rpc_listener.await;

    metrics.log_final_snapshot();
    cache.close();
    info!("ingestd stopped cleanly");
    Ok(())
}

/// Waits for SIGINT, SIGTERM, or SIGQUIT (§4.G, §6).
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    #[cfg(unix)]
    let quit = async {
        signal::unix::signal(signal::unix::SignalKind::quit())
            .expect("failed to install SIGQUIT handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let quit = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received SIGINT"); },
        _ = terminate => { info!("received SIGTERM"); },
        _ = quit => { info!("received SIGQUIT"); },
    }
}
