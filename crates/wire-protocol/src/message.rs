use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One front-door request summary (§3).
///
/// `timestamp` is normalized at decode time: a non-positive or absent
/// wire timestamp is replaced by the caller-supplied arrival time
/// (see [`crate::decode_log_item`]), so by the time a `LogItem` exists
/// in memory its `timestamp` is always meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogItem {
    pub request_id: String,
    pub path: String,
    pub host: String,
    pub seq: i32,
    /// 0 = success, 1 = failure.
    pub status: i32,
    pub rt: i64,
    pub timestamp: DateTime<Utc>,
}

/// One half-event of an RPC sub-call span (§3).
///
/// A physical span is carried by two `RpcItem`s sharing
/// `(request_id, client, server, seq)`: a start-side one (`start != 0`,
/// `end == 0`) and an end-side one (`end != 0`, `start == 0`). Either
/// may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcItem {
    pub request_id: String,
    pub seq: i32,
    pub client: String,
    pub server: String,
    #[serde(default)]
    pub api: String,
    #[serde(default)]
    pub status: bool,
    /// Epoch ms; 0 means "this half-event carries no start".
    #[serde(default)]
    pub start: i64,
    /// Epoch ms; 0 means "this half-event carries no end".
    #[serde(default)]
    pub end: i64,
}

impl RpcItem {
    /// `client#server#seq` — the per-span key within a request's cache entry.
    pub fn span_key(&self) -> String {
        format!("{}#{}#{}", self.client, self.server, self.seq)
    }

    /// Merge an incoming half-event into `self` (the previously-cached value).
    ///
    /// Field-wise: a non-zero incoming `start` overwrites; `end`/`status`
    /// are only taken from the incoming item when its `end` is non-zero.
    /// Commutative over the two legitimate orderings (start-first,
    /// end-first) — see `tests/merge_commutativity.rs`.
    pub fn merge_from(&mut self, incoming: &RpcItem) {
        if incoming.start != 0 {
            self.start = incoming.start;
        }
        if incoming.end != 0 {
            self.end = incoming.end;
            self.status = incoming.status;
            if !incoming.api.is_empty() {
                self.api = incoming.api.clone();
            }
        }
    }

    /// True if this half-event, on its own, has no usable `request_id`
    /// (the "empty request_id" miss-equivalent of §4.E).
    pub fn has_empty_request_id(&self) -> bool {
        self.request_id.is_empty()
    }
}

/// Coerce an epoch-millisecond timestamp to UTC wall-clock, falling back
/// to `fallback` when `millis` is non-positive.
pub fn millis_to_datetime_or(millis: i64, fallback: DateTime<Utc>) -> DateTime<Utc> {
    if millis <= 0 {
        return fallback;
    }
    Utc.timestamp_millis_opt(millis).single().unwrap_or(fallback)
}

/// Coerce an epoch-*second* timestamp (used for the `start / 1000`
/// projection in §3's `TraceItem.timestamp`) to UTC wall-clock.
pub fn seconds_to_datetime(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap())
}
