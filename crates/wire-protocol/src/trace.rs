use crate::message::{seconds_to_datetime, LogItem, RpcItem};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stitched, complete span ready for indexing (§3).
///
/// Produced by joining one [`RpcItem`] with the [`LogItem`] of the
/// request it belongs to — never emitted speculatively from an
/// `RpcItem` alone (§3 invariants).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceItem {
    pub request_id: String,
    pub path: String,
    pub host: String,
    pub seq: i32,
    pub client: String,
    pub server: String,
    pub api: String,
    /// 0 = success, 1 = failure.
    pub status: i32,
    /// `end - start`; computed even when one side is zero, i.e. an
    /// incomplete span yields a meaningless but present value (§3).
    pub rt: i64,
    pub timestamp: DateTime<Utc>,
}

impl TraceItem {
    /// Project an `RpcItem` (a merged span, complete or partial) into a
    /// `TraceItem` by enriching it with the owning `LogItem`'s `host`
    /// and `path` (§3, §4.E step 2).
    pub fn from_rpc_and_log(rpc: &RpcItem, log: &LogItem) -> Self {
        TraceItem {
            request_id: rpc.request_id.clone(),
            path: log.path.clone(),
            host: log.host.clone(),
            seq: rpc.seq,
            client: rpc.client.clone(),
            server: rpc.server.clone(),
            api: rpc.api.clone(),
            status: i32::from(!rpc.status),
            rt: rpc.end - rpc.start,
            timestamp: seconds_to_datetime(rpc.start / 1000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> LogItem {
        LogItem {
            request_id: "R1".to_owned(),
            path: "/x".to_owned(),
            host: "H1".to_owned(),
            seq: 0,
            status: 0,
            rt: 0,
            timestamp: Utc::now(),
        }
    }

    fn rpc(start: i64, end: i64, status: bool) -> RpcItem {
        RpcItem {
            request_id: "R1".to_owned(),
            seq: 1,
            client: "A".to_owned(),
            server: "B".to_owned(),
            api: "X".to_owned(),
            status,
            start,
            end,
        }
    }

    #[test]
    fn projects_host_and_path_from_log_item() {
        let ti = TraceItem::from_rpc_and_log(&rpc(1_700_000_000_000, 1_700_000_000_250, true), &log());
        assert_eq!(ti.host, "H1");
        assert_eq!(ti.path, "/x");
        assert_eq!(ti.rt, 250);
        assert_eq!(ti.status, 0);
    }

    #[test]
    fn failure_status_maps_to_one() {
        let ti = TraceItem::from_rpc_and_log(&rpc(1_700_000_000_000, 1_700_000_000_250, false), &log());
        assert_eq!(ti.status, 1);
    }

    #[test]
    fn rt_is_computed_even_when_incomplete() {
        // start-only half-span: end is 0, rt is negative and meaningless
        // but is still produced (§3: "callers must interpret ... as incomplete").
        let ti = TraceItem::from_rpc_and_log(&rpc(1_700_000_000_000, 0, false), &log());
        assert_eq!(ti.rt, -1_700_000_000_000);
    }
}
