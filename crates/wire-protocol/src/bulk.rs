use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

/// Which document kind a bulk pair indexes (§4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    Log,
    Trace,
}

impl DocKind {
    fn type_name(self) -> &'static str {
        match self {
            DocKind::Log => "log",
            DocKind::Trace => "trace",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BulkEncodeError {
    #[error("failed to encode bulk payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// `base "-" YYYY.MM.DD`, the UTC day of `timestamp` (§4.A, tested
/// against the literal in §8.6).
pub fn index_name(base: &str, timestamp: DateTime<Utc>) -> String {
    format!("{}-{}", base, timestamp.format("%Y.%m.%d"))
}

/// Append one `(meta, payload)` bulk-indexing pair (§4.A) to `buf`.
///
/// This implementation only ever issues the `{"index":...}` metadata
/// form — never `{"update":...}` — because nothing in this pipeline
/// updates a previously indexed document (see `SPEC_FULL.md` §4.A).
pub fn append_bulk_pair<T: Serialize>(
    buf: &mut Vec<u8>,
    kind: DocKind,
    base_index: &str,
    timestamp: DateTime<Utc>,
    payload: &T,
) -> Result<(), BulkEncodeError> {
    let meta = json!({
        "index": {
            "_index": index_name(base_index, timestamp),
            "_type": kind.type_name(),
        }
    });
    serde_json::to_writer(&mut *buf, &meta)?;
    buf.push(b'\n');
    serde_json::to_writer(&mut *buf, payload)?;
    buf.push(b'\n');
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn index_name_rolls_by_utc_day() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 15, 23, 59, 59).unwrap();
        assert_eq!(index_name("ems", ts), "ems-2024.03.15");
    }

    #[test]
    fn append_bulk_pair_emits_index_metadata_form() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 15, 23, 59, 59).unwrap();
        let mut buf = Vec::new();
        append_bulk_pair(&mut buf, DocKind::Log, "ems", ts, &json!({"request_id": "R1"})).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        let meta: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(meta["index"]["_index"], "ems-2024.03.15");
        assert_eq!(meta["index"]["_type"], "log");
        let payload: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(payload["request_id"], "R1");
        assert!(lines.next().is_none());
    }

    #[test]
    fn trace_kind_uses_trace_type() {
        let ts = Utc::now();
        let mut buf = Vec::new();
        append_bulk_pair(&mut buf, DocKind::Trace, "ems", ts, &json!({})).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let meta: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(meta["index"]["_type"], "trace");
    }
}
