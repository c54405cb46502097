//! UDP ingest front end (§4.F).
//!
//! Two independent listeners, one per message kind, each decoding its
//! own wire form and handing parsed items to a bounded queue with
//! explicit overflow semantics. Deliberately not unified behind one
//! generic listener: the two loops differ only in decode call and
//! item type, the same shape the original Go frontend used for its two
//! (near-duplicate) goroutines.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wire_protocol::{decode_log_item, decode_rpc_item, LogItem, RpcItem};

use crate::metrics::IngestMetrics;

/// Sized for one Ethernet MTU; one datagram carries exactly one item
/// (§4.F). The read buffer is one byte larger so a datagram that
/// doesn't fit can be distinguished from one that exactly fills it.
const DATAGRAM_MTU: usize = 1500;
const READ_BUF_SIZE: usize = DATAGRAM_MTU + 1;
const READ_DEADLINE: Duration = Duration::from_secs(3);

/// Bind and run the `LogItem` UDP listener until `cancel` fires.
pub async fn run_log_listener(
    addr: SocketAddr,
    queue: mpsc::Sender<LogItem>,
    metrics: Arc<IngestMetrics>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let socket = UdpSocket::bind(addr).await?;
    info!(%addr, "log listener bound");
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        let recv = tokio::select! {
            () = cancel.cancelled() => {
                info!("log listener shutting down");
                return Ok(());
            }
            res = tokio::time::timeout(READ_DEADLINE, socket.recv_from(&mut buf)) => res,
        };
        let Ok(recv) = recv else {
            // read deadline elapsed; loop back to re-check cancellation
            continue;
        };
        let (len, _peer) = recv?;
        if len > DATAGRAM_MTU {
            metrics.inc_log_oversize_dropped();
            warn!(len, "log datagram exceeds MTU, dropped");
            continue;
        }
        let arrival = Utc::now();
        match decode_log_item(&buf[..len], arrival) {
            Ok(item) => {
                if queue.try_send(item).is_err() {
                    metrics.inc_log_queue_overflow();
                    warn!("log queue overflow, item dropped");
                }
            }
            Err(e) => {
                metrics.inc_log_decode_errors();
                warn!(error = %e, "failed to decode log datagram");
            }
        }
    }
}

/// Bind and run the `RpcItem` UDP listener until `cancel` fires.
pub async fn run_rpc_listener(
    addr: SocketAddr,
    queue: mpsc::Sender<RpcItem>,
    metrics: Arc<IngestMetrics>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let socket = UdpSocket::bind(addr).await?;
    info!(%addr, "rpc listener bound");
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        let recv = tokio::select! {
            () = cancel.cancelled() => {
                info!("rpc listener shutting down");
                return Ok(());
            }
            res = tokio::time::timeout(READ_DEADLINE, socket.recv_from(&mut buf)) => res,
        };
        let Ok(recv) = recv else {
            continue;
        };
        let (len, _peer) = recv?;
        if len > DATAGRAM_MTU {
            metrics.inc_rpc_oversize_dropped();
            warn!(len, "rpc datagram exceeds MTU, dropped");
            continue;
        }
        match decode_rpc_item(&buf[..len]) {
            Ok(item) => {
                if queue.try_send(item).is_err() {
                    metrics.inc_rpc_queue_overflow();
                    warn!("rpc queue overflow, item dropped");
                }
            }
            Err(e) => {
                metrics.inc_rpc_decode_errors();
                warn!(error = %e, "failed to decode rpc datagram");
            }
        }
    }
}
