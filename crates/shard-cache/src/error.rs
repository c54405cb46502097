/// Cache failures (§4.B, §7(c)).
///
/// Interpretation of a given variant is the *caller's* responsibility —
/// e.g. the correlator treats any `HGET` error as "not found" (§4.E) —
/// this type only distinguishes the failure's origin.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("no cache servers configured")]
    NoServers,
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("failed to encode cache value: {0}")]
    Encode(#[from] bincode::Error),
}
