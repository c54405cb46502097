use crate::message::{millis_to_datetime_or, LogItem, RpcItem};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Decode failures for the two ingress JSON forms (§4.A, §7(a)).
///
/// Both variants are the "drop the datagram with a counted error" case;
/// callers at the ingest front end count and log, they do not retry.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("request_id is empty")]
    EmptyRequestId,
}

/// Wire shape of `LogItem`. `timestamp` is an optional epoch-millisecond
/// integer (mirroring `RpcItem.start`/`.end`); absent or non-positive is
/// normalized to `arrival` by [`decode_log_item`].
#[derive(Debug, Deserialize)]
struct LogItemWire {
    request_id: String,
    path: String,
    host: String,
    #[serde(default)]
    seq: i32,
    #[serde(default)]
    status: i32,
    #[serde(default)]
    rt: i64,
    #[serde(default)]
    timestamp: Option<i64>,
}

/// Decode a `LogItem` datagram.
///
/// `arrival` is the time the datagram was received; it substitutes for
/// an absent or non-positive wire `timestamp` (§3, §4.A).
pub fn decode_log_item(data: &[u8], arrival: DateTime<Utc>) -> Result<LogItem, DecodeError> {
    let wire: LogItemWire = serde_json::from_slice(data)?;
    if wire.request_id.is_empty() {
        return Err(DecodeError::EmptyRequestId);
    }
    Ok(LogItem {
        request_id: wire.request_id,
        path: wire.path,
        host: wire.host,
        seq: wire.seq,
        status: wire.status,
        rt: wire.rt,
        timestamp: millis_to_datetime_or(wire.timestamp.unwrap_or(0), arrival),
    })
}

/// Decode an `RpcItem` datagram.
pub fn decode_rpc_item(data: &[u8]) -> Result<RpcItem, DecodeError> {
    let item: RpcItem = serde_json::from_slice(data)?;
    if item.has_empty_request_id() {
        return Err(DecodeError::EmptyRequestId);
    }
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_log_item_substitutes_arrival_for_absent_timestamp() {
        let arrival = Utc::now();
        let raw = br#"{"request_id":"R2","path":"/x","host":"H1"}"#;
        let item = decode_log_item(raw, arrival).unwrap();
        assert_eq!(item.timestamp, arrival);
    }

    #[test]
    fn decode_log_item_substitutes_arrival_for_non_positive_timestamp() {
        let arrival = Utc::now();
        let raw = br#"{"request_id":"R2","path":"/x","host":"H1","timestamp":-5}"#;
        let item = decode_log_item(raw, arrival).unwrap();
        assert_eq!(item.timestamp, arrival);
    }

    #[test]
    fn decode_log_item_keeps_positive_timestamp() {
        let arrival = Utc::now();
        let raw = br#"{"request_id":"R2","path":"/x","host":"H1","timestamp":1700000000000}"#;
        let item = decode_log_item(raw, arrival).unwrap();
        assert_ne!(item.timestamp, arrival);
    }

    #[test]
    fn decode_log_item_rejects_empty_request_id() {
        let raw = br#"{"request_id":"","path":"/x","host":"H1"}"#;
        assert!(matches!(
            decode_log_item(raw, Utc::now()),
            Err(DecodeError::EmptyRequestId)
        ));
    }

    #[test]
    fn decode_log_item_rejects_malformed_json() {
        let raw = b"not json";
        assert!(matches!(
            decode_log_item(raw, Utc::now()),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn decode_rpc_item_roundtrips() {
        let raw = br#"{"request_id":"R1","client":"A","server":"B","seq":1,"start":1700000000000}"#;
        let item = decode_rpc_item(raw).unwrap();
        assert_eq!(item.client, "A");
        assert_eq!(item.start, 1_700_000_000_000);
        assert_eq!(item.end, 0);
    }

    #[test]
    fn decode_rpc_item_rejects_empty_request_id() {
        let raw = br#"{"request_id":"","client":"A","server":"B","seq":1}"#;
        assert!(matches!(
            decode_rpc_item(raw),
            Err(DecodeError::EmptyRequestId)
        ));
    }
}
