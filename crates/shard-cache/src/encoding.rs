use crate::error::CacheError;
use wire_protocol::RpcItem;

/// Compact binary encoding of a cached `RpcItem` (§4.B: "a compact
/// binary encoding"). `bincode` fills the role the Go original's
/// `encoding/gob` filled.
pub fn encode(item: &RpcItem) -> Result<Vec<u8>, CacheError> {
    Ok(bincode::serialize(item)?)
}

pub fn decode(bytes: &[u8]) -> Result<RpcItem, CacheError> {
    Ok(bincode::deserialize(bytes)?)
}
