//! Bulk forwarder (§4.D) and endpoint-pool maintenance (§4.C).
//!
//! The two are tightly coupled — the maintenance tick is what spawns
//! and retires sender tasks — so they live in one module, driven from
//! one arm of the correlator's select loop (§4.E, §5: "the
//! pool-maintenance tick").

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::metrics::IngestMetrics;
use crate::pool::{Endpoint, EndpointPool, EndpointStatus};

/// Errors surfaced on the shared error channel (§4.D, §4.E): transport
/// failures that are *not* the "connection closed" class, which
/// instead silently recycles the endpoint via the maintenance tick.
#[derive(Debug, thiserror::Error)]
#[error("backend request to {url} failed: {source}")]
pub struct BackendError {
    pub url: String,
    #[source]
    pub source: reqwest::Error,
}

/// The unbuffered-in-spirit send queue (§4.D [EXPANSION]): capacity 1,
/// the smallest a `tokio::sync::mpsc` channel accepts, shared for
/// reading across every sender task behind one lock so the channel is
/// simultaneously multi-producer (the correlator) and multi-consumer
/// (the sender tasks).
pub type SendReceiver = Arc<Mutex<mpsc::Receiver<Vec<u8>>>>;

pub const SEND_QUEUE_CAPACITY: usize = 1;

pub fn new_send_queue() -> (mpsc::Sender<Vec<u8>>, SendReceiver) {
    let (tx, rx) = mpsc::channel(SEND_QUEUE_CAPACITY);
    (tx, Arc::new(Mutex::new(rx)))
}

/// One maintenance pass over every endpoint (§4.C): promote `Idle` to
/// `Busy` and spawn a sender, or attempt to reconnect a `Closed`
/// endpoint. `Busy` endpoints are left alone — at most one sender task
/// runs per endpoint at any time.
pub async fn maintenance_pass(
    pool: &EndpointPool,
    send_rx: &SendReceiver,
    error_tx: &mpsc::Sender<BackendError>,
    metrics: &Arc<IngestMetrics>,
) {
    for endpoint in pool.endpoints() {
        match endpoint.status().await {
            EndpointStatus::Idle => {
                info!(url = %endpoint.base_url, "promoting idle endpoint to busy, spawning sender");
                spawn_sender(endpoint, send_rx, error_tx, metrics).await;
            }
            EndpointStatus::Closed => {
                if endpoint.probe().await {
                    info!(url = %endpoint.base_url, "endpoint reconnected, spawning sender");
                    spawn_sender(endpoint, send_rx, error_tx, metrics).await;
                } else {
                    warn!(url = %endpoint.base_url, "endpoint still unreachable");
                }
            }
            EndpointStatus::Busy => {}
        }
    }
}

/// Promote `endpoint` straight to `Busy` and spawn its sender task —
/// shared by both the `Idle` and just-reconnected-`Closed` arms of
/// [`maintenance_pass`] so a reconnection resumes writes within the
/// same tick it was observed in (§8 property 5), rather than waiting
/// for a second tick to notice the endpoint is now `Idle`.
async fn spawn_sender(
    endpoint: &Arc<Endpoint>,
    send_rx: &SendReceiver,
    error_tx: &mpsc::Sender<BackendError>,
    metrics: &Arc<IngestMetrics>,
) {
    endpoint.set_status(EndpointStatus::Busy).await;
    tokio::spawn(sender_task(
        endpoint.clone(),
        send_rx.clone(),
        error_tx.clone(),
        metrics.clone(),
    ));
}

/// One sender task bound to one endpoint and the shared send queue
/// (§4.D). Runs until the connection is judged closed, at which point
/// it marks the endpoint `Closed` and returns — the next maintenance
/// pass will try to revive it.
async fn sender_task(
    endpoint: Arc<Endpoint>,
    send_rx: SendReceiver,
    error_tx: mpsc::Sender<BackendError>,
    metrics: Arc<IngestMetrics>,
) {
    loop {
        let payload = {
            let mut rx = send_rx.lock().await;
            rx.recv().await
        };
        let Some(payload) = payload else {
            // send queue producer side has been dropped; nothing left to do.
            endpoint.set_status(EndpointStatus::Closed).await;
            return;
        };

        let client = endpoint.client().await;
        let url = format!("{}/_bulk", endpoint.base_url.trim_end_matches('/'));
        match client.post(&url).body(payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                // 200: body discarded (§4.D).
            }
            Ok(resp) => {
                metrics.inc_backend_protocol_errors();
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                warn!(url = %endpoint.base_url, %status, body, "bulk request rejected by backend");
            }
            Err(e) => {
                if e.is_connect() || e.is_request() {
                    warn!(url = %endpoint.base_url, error = %e, "connection closed, retiring sender");
                    endpoint.set_status(EndpointStatus::Closed).await;
                    return;
                }
                metrics.inc_backend_transport_errors();
                let _ = error_tx
                    .send(BackendError {
                        url: endpoint.base_url.clone(),
                        source: e,
                    })
                    .await;
            }
        }
    }
}
