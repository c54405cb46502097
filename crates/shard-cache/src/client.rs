use std::collections::HashMap;

use redis::AsyncCommands;
use tracing::warn;
use wire_protocol::RpcItem;

use crate::encoding;
use crate::error::CacheError;
use crate::ring::Ring;

/// TTL refreshed on every `HSET` (§3, §4.B).
const ENTRY_TTL_SECS: u64 = 60;

/// Sharded cache client: a consistent-hash ring over N independent
/// servers, each reached through an auto-reconnecting pooled
/// connection (§4.B).
///
/// `redis::aio::ConnectionManager` plays the role of the Go original's
/// `fzzy/radix` connection pool — it is internally pooled and
/// reconnects transparently, and is cheap to clone across tasks.
pub struct ShardCache {
    ring: Ring,
    connections: HashMap<String, redis::aio::ConnectionManager>,
}

impl ShardCache {
    /// Dial every configured server and build the ring. A server that
    /// fails to connect at startup is a hard error — unlike the
    /// endpoint pool (§4.C), the cache ring has no notion of a
    /// partially-up cluster (§4.B: "ring is built at startup and never
    /// changes").
    pub async fn connect(servers: &[String]) -> Result<Self, CacheError> {
        if servers.is_empty() {
            return Err(CacheError::NoServers);
        }
        let mut connections = HashMap::with_capacity(servers.len());
        for server in servers {
            let url = to_redis_url(server);
            let client = redis::Client::open(url)?;
            let conn = client.get_connection_manager().await?;
            connections.insert(server.clone(), conn);
        }
        Ok(ShardCache {
            ring: Ring::build(servers),
            connections,
        })
    }

    fn conn_for(&self, key: &str) -> Result<redis::aio::ConnectionManager, CacheError> {
        let server = self.ring.get(key).ok_or(CacheError::NoServers)?;
        // ConnectionManager is Clone + cheap: clones share the same
        // underlying multiplexed connection.
        Ok(self
            .connections
            .get(server)
            .expect("ring only names servers present in `connections`")
            .clone())
    }

    /// `HSET(key, field, item)` then refresh `key`'s TTL (§4.B).
    /// Both commands are issued; success requires both to dispatch
    /// cleanly.
    pub async fn hset(&self, key: &str, field: &str, item: &RpcItem) -> Result<(), CacheError> {
        let mut conn = self.conn_for(key)?;
        let bytes = encoding::encode(item)?;
        conn.hset::<_, _, _, ()>(key, field, bytes).await?;
        conn.expire::<_, ()>(key, ENTRY_TTL_SECS as i64).await?;
        Ok(())
    }

    /// `HGET(key, field)`. Returns `Ok(None)` for a missing field —
    /// callers that want the "treat cache errors as miss" behavior of
    /// §4.E fold `Err` into `None` themselves.
    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<RpcItem>, CacheError> {
        let mut conn = self.conn_for(key)?;
        let raw: Option<Vec<u8>> = conn.hget(key, field).await?;
        match raw {
            Some(bytes) => Ok(Some(encoding::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// `HGETALL(key)`. The wire protocol returns an alternating
    /// `[field, value, field, value, ...]` sequence; the `redis` crate
    /// pairs them into a map for us (§4.B).
    ///
    /// A field whose value fails to decode is logged and skipped
    /// rather than aborting the whole call — one corrupt cache entry
    /// should not lose every sibling span of the same request.
    pub async fn hgetall(&self, key: &str) -> Result<HashMap<String, RpcItem>, CacheError> {
        let mut conn = self.conn_for(key)?;
        let raw: HashMap<String, Vec<u8>> = conn.hgetall(key).await?;
        let mut out = HashMap::with_capacity(raw.len());
        for (field, bytes) in raw {
            match encoding::decode(&bytes) {
                Ok(item) => {
                    out.insert(field, item);
                }
                Err(e) => warn!(key, field, error = %e, "dropping undecodable cache entry"),
            }
        }
        Ok(out)
    }

    /// `DEL(key)` (§4.B).
    pub async fn del(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn_for(key)?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    /// Drains and closes every pool (§4.B). Callable through a shared
    /// `Arc<ShardCache>` (the correlator holds its own clone of the
    /// cache for the lifetime of the pipeline), so this takes `&self`
    /// rather than `self`: `ConnectionManager` has no explicit close,
    /// and its sockets are released when the last reference to this
    /// client is dropped, not at this call specifically. This method's
    /// job is just to signal "no more commands should be issued" in the
    /// supervisor's shutdown sequence.
    pub fn close(&self) {}
}

fn to_redis_url(server: &str) -> String {
    if server.starts_with("redis://") {
        server.to_owned()
    } else {
        format!("redis://{server}")
    }
}
