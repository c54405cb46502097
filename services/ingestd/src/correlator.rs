//! Correlation / stitching engine (§4.E) — the hard part.
//!
//! Two pure, independently testable operations sit at the core:
//! [`Correlator::handle_rpc_item`] (the half-span merge) and
//! [`Correlator::handle_log_item`] (stitch-and-emit). Both take a
//! `SpanCache` trait object rather than the concrete `shard-cache`
//! client, so the merge/stitch logic is tested against an in-memory
//! fake with no live Redis required (§8 [EXPANSION]).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wire_protocol::{append_bulk_pair, DocKind, LogItem, RpcItem, TraceItem};

use crate::forwarder::{self, BackendError, SendReceiver};
use crate::metrics::IngestMetrics;
use crate::pool::EndpointPool;

/// The seam the correlator's merge/stitch logic is tested against —
/// implemented by `shard-cache::ShardCache` in production and by an
/// in-memory fake in tests.
#[async_trait::async_trait]
pub trait SpanCache: Send + Sync {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<RpcItem>, CacheOpError>;
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, RpcItem>, CacheOpError>;
    async fn hset(&self, key: &str, field: &str, item: &RpcItem) -> Result<(), CacheOpError>;
    async fn del(&self, key: &str) -> Result<(), CacheOpError>;
}

pub type CacheOpError = Box<dyn std::error::Error + Send + Sync>;

#[async_trait::async_trait]
impl SpanCache for shard_cache::ShardCache {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<RpcItem>, CacheOpError> {
        shard_cache::ShardCache::hget(self, key, field)
            .await
            .map_err(|e| Box::new(e) as CacheOpError)
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, RpcItem>, CacheOpError> {
        shard_cache::ShardCache::hgetall(self, key)
            .await
            .map_err(|e| Box::new(e) as CacheOpError)
    }

    async fn hset(&self, key: &str, field: &str, item: &RpcItem) -> Result<(), CacheOpError> {
        shard_cache::ShardCache::hset(self, key, field, item)
            .await
            .map_err(|e| Box::new(e) as CacheOpError)
    }

    async fn del(&self, key: &str) -> Result<(), CacheOpError> {
        shard_cache::ShardCache::del(self, key)
            .await
            .map_err(|e| Box::new(e) as CacheOpError)
    }
}

pub struct Correlator<C: SpanCache> {
    cache: Arc<C>,
    base_index: String,
    metrics: Arc<IngestMetrics>,
}

impl<C: SpanCache> Correlator<C> {
    pub fn new(cache: Arc<C>, base_index: String, metrics: Arc<IngestMetrics>) -> Self {
        Correlator {
            cache,
            base_index,
            metrics,
        }
    }

    /// Half-span merge (§4.E "RpcItem handling"). The incoming
    /// half-event is looked up by `(request_id, spanKey)`; missing,
    /// failed-lookup, and empty-`request_id` all collapse to the same
    /// "treat as not found, HSET the incoming item" path.
    pub async fn handle_rpc_item(&self, incoming: RpcItem) {
        let span_key = incoming.span_key();
        let existing = match self.cache.hget(&incoming.request_id, &span_key).await {
            Ok(Some(item)) if !item.has_empty_request_id() => Some(item),
            _ => None,
        };

        let merged = match existing {
            Some(mut cached) => {
                cached.merge_from(&incoming);
                cached
            }
            None => incoming,
        };

        if let Err(e) = self.cache.hset(&merged.request_id, &span_key, &merged).await {
            self.metrics.inc_cache_hset_errors();
            warn!(request_id = %merged.request_id, span_key, error = %e, "HSET failed, dropping rpc item");
        }
    }

    /// Stitch-and-emit (§4.E "LogItem handling"). Returns the bulk
    /// buffer to publish, or `None` if nothing should be published
    /// (HGETALL failure, or the empty-buffer corner of §9).
    pub async fn handle_log_item(&self, log: LogItem) -> Option<Vec<u8>> {
        let spans = match self.cache.hgetall(&log.request_id).await {
            Ok(spans) => spans,
            Err(e) => {
                self.metrics.inc_cache_hgetall_errors();
                warn!(request_id = %log.request_id, error = %e, "HGETALL failed, log item not emitted");
                return None;
            }
        };

        let mut buf = Vec::new();
        for rpc in spans.values() {
            let trace = TraceItem::from_rpc_and_log(rpc, &log);
            if let Err(e) = append_bulk_pair(&mut buf, DocKind::Trace, &self.base_index, trace.timestamp, &trace) {
                self.metrics.inc_stitch_encode_errors();
                warn!(request_id = %log.request_id, error = %e, "failed to encode trace item, aborting stitch");
                return None;
            }
        }

        if let Err(e) = append_bulk_pair(&mut buf, DocKind::Log, &self.base_index, log.timestamp, &log) {
            self.metrics.inc_stitch_encode_errors();
            warn!(request_id = %log.request_id, error = %e, "failed to encode log item, aborting stitch");
            return None;
        }

        if let Err(e) = self.cache.del(&log.request_id).await {
            warn!(request_id = %log.request_id, error = %e, "best-effort cache DEL failed");
        }

        if buf.is_empty() {
            None
        } else {
            Some(buf)
        }
    }

    /// Drive the correlator's single select loop: LogItems, RpcItems,
    /// the forwarder's error channel, and the endpoint-pool
    /// maintenance tick all arrive on the same task (§4.E, §5 —
    /// "the correlator is single-tasked on the stitching loop").
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        self: Arc<Self>,
        mut log_rx: mpsc::Receiver<LogItem>,
        mut rpc_rx: mpsc::Receiver<RpcItem>,
        mut error_rx: mpsc::Receiver<BackendError>,
        error_tx: mpsc::Sender<BackendError>,
        send_tx: mpsc::Sender<Vec<u8>>,
        send_rx: SendReceiver,
        pool: Arc<EndpointPool>,
        cancel: CancellationToken,
    ) {
        let mut maintenance = tokio::time::interval(Duration::from_secs(3));
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("correlator shutting down");
                    return;
                }
                item = log_rx.recv() => {
                    let Some(item) = item else { continue };
                    if let Some(buf) = self.handle_log_item(item).await {
                        if send_tx.send(buf).await.is_err() {
                            warn!("send queue closed, dropping stitched payload");
                        }
                    }
                }
                item = rpc_rx.recv() => {
                    let Some(item) = item else { continue };
                    self.handle_rpc_item(item).await;
                }
                err = error_rx.recv() => {
                    let Some(err) = err else { continue };
                    warn!(error = %err, "backend transport error");
                }
                _ = maintenance.tick() => {
                    forwarder::maintenance_pass(&pool, &send_rx, &error_tx, &self.metrics).await;
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeCache;
    use super::*;
    use chrono::Utc;

    fn rpc(request_id: &str, start: i64, end: i64, status: bool, api: &str) -> RpcItem {
        RpcItem {
            request_id: request_id.to_owned(),
            seq: 1,
            client: "A".to_owned(),
            server: "B".to_owned(),
            api: api.to_owned(),
            status,
            start,
            end,
        }
    }

    fn log(request_id: &str) -> LogItem {
        LogItem {
            request_id: request_id.to_owned(),
            path: "/x".to_owned(),
            host: "H1".to_owned(),
            seq: 0,
            status: 0,
            rt: 0,
            timestamp: Utc::now(),
        }
    }

    fn correlator() -> Correlator<FakeCache> {
        Correlator::new(Arc::new(FakeCache::new()), "ems".to_owned(), Arc::new(IngestMetrics::new()))
    }

    #[tokio::test]
    async fn s1_start_only_half_span_is_visible_via_hgetall() {
        let c = correlator();
        c.handle_rpc_item(rpc("R1", 1_700_000_000_000, 0, false, "")).await;
        let spans = c.cache.hgetall("R1").await.unwrap();
        let span = &spans["A#B#1"];
        assert_eq!(span.start, 1_700_000_000_000);
        assert_eq!(span.end, 0);
    }

    #[tokio::test]
    async fn s2_merge_commutativity_end_after_start() {
        let c = correlator();
        c.handle_rpc_item(rpc("R1", 1_700_000_000_000, 0, false, "")).await;
        c.handle_rpc_item(rpc("R1", 0, 1_700_000_000_250, true, "X")).await;
        let spans = c.cache.hgetall("R1").await.unwrap();
        assert_eq!(spans.len(), 1);
        let span = &spans["A#B#1"];
        assert_eq!(span.start, 1_700_000_000_000);
        assert_eq!(span.end, 1_700_000_000_250);
        assert!(span.status);
        assert_eq!(span.api, "X");
    }

    #[tokio::test]
    async fn merge_commutativity_start_after_end() {
        let c = correlator();
        c.handle_rpc_item(rpc("R1", 0, 1_700_000_000_250, true, "X")).await;
        c.handle_rpc_item(rpc("R1", 1_700_000_000_000, 0, false, "")).await;
        let spans = c.cache.hgetall("R1").await.unwrap();
        assert_eq!(spans.len(), 1);
        let span = &spans["A#B#1"];
        assert_eq!(span.start, 1_700_000_000_000);
        assert_eq!(span.end, 1_700_000_000_250);
        assert!(span.status);
    }

    #[tokio::test]
    async fn s3_log_item_stitches_trace_and_log_then_deletes_entry() {
        let c = correlator();
        c.handle_rpc_item(rpc("R1", 1_700_000_000_000, 0, false, "")).await;
        c.handle_rpc_item(rpc("R1", 0, 1_700_000_000_250, true, "X")).await;

        let buf = c.handle_log_item(log("R1")).await.expect("buffer should be published");
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4); // (meta,trace) + (meta,log)

        let trace_meta: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(trace_meta["index"]["_type"], "trace");
        let trace_payload: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(trace_payload["rt"], 250);
        assert_eq!(trace_payload["client"], "A");
        assert_eq!(trace_payload["server"], "B");
        assert_eq!(trace_payload["host"], "H1");
        assert_eq!(trace_payload["path"], "/x");

        let log_meta: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(log_meta["index"]["_type"], "log");

        let spans = c.cache.hgetall("R1").await.unwrap();
        assert!(spans.is_empty(), "cache entry should have been deleted");
    }

    #[tokio::test]
    async fn s4_log_item_with_no_prior_spans_emits_only_log_pair() {
        let c = correlator();
        let buf = c.handle_log_item(log("R2")).await.expect("buffer should be published");
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let meta: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(meta["index"]["_type"], "log");
    }

    #[tokio::test(start_paused = true)]
    async fn property_3_ttl_expiry_without_log_item() {
        let c = correlator();
        c.handle_rpc_item(rpc("R1", 1_700_000_000_000, 0, false, "")).await;
        assert_eq!(c.cache.hgetall("R1").await.unwrap().len(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;

        assert!(c.cache.hgetall("R1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stitch_completeness_k_spans_then_one_log() {
        let c = correlator();
        for seq in 0..3i32 {
            let mut start = rpc("R1", 1_700_000_000_000 + i64::from(seq), 0, false, "");
            start.seq = seq;
            c.handle_rpc_item(start).await;
            let mut end = rpc("R1", 0, 1_700_000_000_100 + i64::from(seq), true, "X");
            end.seq = seq;
            c.handle_rpc_item(end).await;
        }
        let buf = c.handle_log_item(log("R1")).await.unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        // 3 spans * 2 lines + 1 log * 2 lines = 8
        assert_eq!(lines.len(), 8);
        for i in 0..3 {
            let meta: serde_json::Value = serde_json::from_str(lines[i * 2]).unwrap();
            assert_eq!(meta["index"]["_type"], "trace");
        }
        let log_meta: serde_json::Value = serde_json::from_str(lines[6]).unwrap();
        assert_eq!(log_meta["index"]["_type"], "log");
    }
}
