//! Wire types and codec for the ingest pipeline.
//!
//! Two ingress JSON forms (`LogItem`, `RpcItem`, §3/§4.A of the design doc)
//! and one egress form (the search backend's bulk-indexing envelope,
//! §4.A). Decode is failure-reporting: see [`DecodeError`].

mod bulk;
mod codec;
mod message;
mod trace;

pub use bulk::{append_bulk_pair, index_name, BulkEncodeError, DocKind};
pub use codec::{decode_log_item, decode_rpc_item, DecodeError};
pub use message::{LogItem, RpcItem};
pub use trace::TraceItem;
