//! Consistent-hashed shard cache client (§4.B of the design doc).
//!
//! Maps `request_id` onto one of N independent cache servers via a
//! stable hash ring, built once at startup, and exposes the four
//! operations the correlator needs: `HSET`, `HGET`, `HGETALL`, `DEL`.

mod client;
mod encoding;
mod error;
mod ring;

pub use client::ShardCache;
pub use error::CacheError;
pub use ring::Ring;
