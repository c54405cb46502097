//! Drop/error counters (§7 [EXPANSION]).
//!
//! Every taxonomy entry in §7 that says "counted" / "drop + counter" is
//! realized here as an `AtomicU64`, incremented at the drop site and
//! logged via `tracing::warn!` at the moment of drop. There is no scrape
//! endpoint — §1 keeps metrics out of scope as an external surface —
//! but the counters themselves are always-on observability, and the
//! supervisor logs a final snapshot at shutdown (§7 [EXPANSION]).

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct IngestMetrics {
    pub log_decode_errors: AtomicU64,
    pub rpc_decode_errors: AtomicU64,
    pub log_oversize_dropped: AtomicU64,
    pub rpc_oversize_dropped: AtomicU64,
    pub log_queue_overflow: AtomicU64,
    pub rpc_queue_overflow: AtomicU64,
    pub cache_hset_errors: AtomicU64,
    pub cache_hgetall_errors: AtomicU64,
    pub stitch_encode_errors: AtomicU64,
    pub backend_protocol_errors: AtomicU64,
    pub backend_transport_errors: AtomicU64,
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every counter, in the order they're declared above —
    /// used to emit the shutdown-time summary (§7 "report at shutdown").
    pub fn snapshot(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("log_decode_errors", self.log_decode_errors.load(Ordering::Relaxed)),
            ("rpc_decode_errors", self.rpc_decode_errors.load(Ordering::Relaxed)),
            ("log_oversize_dropped", self.log_oversize_dropped.load(Ordering::Relaxed)),
            ("rpc_oversize_dropped", self.rpc_oversize_dropped.load(Ordering::Relaxed)),
            ("log_queue_overflow", self.log_queue_overflow.load(Ordering::Relaxed)),
            ("rpc_queue_overflow", self.rpc_queue_overflow.load(Ordering::Relaxed)),
            ("cache_hset_errors", self.cache_hset_errors.load(Ordering::Relaxed)),
            ("cache_hgetall_errors", self.cache_hgetall_errors.load(Ordering::Relaxed)),
            ("stitch_encode_errors", self.stitch_encode_errors.load(Ordering::Relaxed)),
            ("backend_protocol_errors", self.backend_protocol_errors.load(Ordering::Relaxed)),
            (
                "backend_transport_errors",
                self.backend_transport_errors.load(Ordering::Relaxed),
            ),
        ]
    }

    pub fn log_final_snapshot(&self) {
        for (name, value) in self.snapshot() {
            tracing::info!(counter = name, value, "final counter snapshot");
        }
    }
}

fn bump(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, Ordering::Relaxed) + 1
}

impl IngestMetrics {
    pub fn inc_log_decode_errors(&self) -> u64 {
        bump(&self.log_decode_errors)
    }
    pub fn inc_rpc_decode_errors(&self) -> u64 {
        bump(&self.rpc_decode_errors)
    }
    pub fn inc_log_oversize_dropped(&self) -> u64 {
        bump(&self.log_oversize_dropped)
    }
    pub fn inc_rpc_oversize_dropped(&self) -> u64 {
        bump(&self.rpc_oversize_dropped)
    }
    pub fn inc_log_queue_overflow(&self) -> u64 {
        bump(&self.log_queue_overflow)
    }
    pub fn inc_rpc_queue_overflow(&self) -> u64 {
        bump(&self.rpc_queue_overflow)
    }
    pub fn inc_cache_hset_errors(&self) -> u64 {
        bump(&self.cache_hset_errors)
    }
    pub fn inc_cache_hgetall_errors(&self) -> u64 {
        bump(&self.cache_hgetall_errors)
    }
    pub fn inc_stitch_encode_errors(&self) -> u64 {
        bump(&self.stitch_encode_errors)
    }
    pub fn inc_backend_protocol_errors(&self) -> u64 {
        bump(&self.backend_protocol_errors)
    }
    pub fn inc_backend_transport_errors(&self) -> u64 {
        bump(&self.backend_transport_errors)
    }
}
