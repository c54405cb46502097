//! Ingest pipeline configuration loading.
//!
//! YAML is the sole config source (§6). Default config path:
//! `/etc/ingestd/ingestd.yml`.
//!
//! # Required fields
//! - `frontend.log_listen`, `frontend.rpc_listen`
//! - At least one `store.elasticsearchs` entry
//! - At least one `store.redis.server` entry
//! - `store.index`
//!
//! `frontend.queue_size` and `store.redis.pool_size` fall back to
//! defaults when absent; the `log` section is entirely optional
//! (§6 [EXPANSION]).

use serde::Deserialize;
use std::path::Path;

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level ingest pipeline configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub frontend: FrontendConfig,
    pub store: StoreConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct FrontendConfig {
    pub log_listen: String,
    pub rpc_listen: String,
    pub queue_size: usize,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub elasticsearchs: Vec<String>,
    pub redis: RedisConfig,
    pub index: String,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub server: Vec<String>,
    pub pool_size: usize,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
}

// ---------------------------------------------------------------------------
// Raw YAML deserialization types (all fields optional; defaults applied below)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    frontend: Option<RawFrontendConfig>,
    store: Option<RawStoreConfig>,
    log: Option<RawLogConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFrontendConfig {
    log_listen: Option<String>,
    rpc_listen: Option<String>,
    queue_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStoreConfig {
    elasticsearchs: Option<Vec<String>>,
    redis: Option<RawRedisConfig>,
    index: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRedisConfig {
    server: Option<Vec<String>>,
    pool_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLogConfig {
    level: Option<String>,
}

const DEFAULT_QUEUE_SIZE: usize = 1024;
const DEFAULT_POOL_SIZE: usize = 8;
const DEFAULT_LOG_LEVEL: &str = "info";

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Load config from a custom path.
pub fn load_config_from_path(path: &Path) -> Result<Config, ConfigError> {
    let yaml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {}", path.display(), e)))?;
    load_config_from_str(&yaml_str)
}

/// Load config from the default path `/etc/ingestd/ingestd.yml`.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from_path(Path::new("/etc/ingestd/ingestd.yml"))
}

/// Load config from a YAML string.
pub fn load_config_from_str(yaml_str: &str) -> Result<Config, ConfigError> {
    let raw: RawConfig = serde_yaml::from_str(yaml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let raw_frontend = raw.frontend.ok_or_else(|| ConfigError::MissingField("frontend".to_owned()))?;
    let log_listen = raw_frontend
        .log_listen
        .ok_or_else(|| ConfigError::MissingField("frontend.log_listen".to_owned()))?;
    let rpc_listen = raw_frontend
        .rpc_listen
        .ok_or_else(|| ConfigError::MissingField("frontend.rpc_listen".to_owned()))?;
    let queue_size = raw_frontend.queue_size.unwrap_or(DEFAULT_QUEUE_SIZE);
    if queue_size == 0 {
        return Err(ConfigError::InvalidValue(
            "frontend.queue_size must be greater than zero".to_owned(),
        ));
    }

    let raw_store = raw.store.ok_or_else(|| ConfigError::MissingField("store".to_owned()))?;
    let elasticsearchs = raw_store
        .elasticsearchs
        .ok_or_else(|| ConfigError::MissingField("store.elasticsearchs".to_owned()))?;
    if elasticsearchs.is_empty() {
        return Err(ConfigError::InvalidValue(
            "at least one store.elasticsearchs entry is required".to_owned(),
        ));
    }
    let index = raw_store
        .index
        .ok_or_else(|| ConfigError::MissingField("store.index".to_owned()))?;

    let raw_redis = raw_store
        .redis
        .ok_or_else(|| ConfigError::MissingField("store.redis".to_owned()))?;
    let server = raw_redis
        .server
        .ok_or_else(|| ConfigError::MissingField("store.redis.server".to_owned()))?;
    if server.is_empty() {
        return Err(ConfigError::InvalidValue(
            "at least one store.redis.server entry is required".to_owned(),
        ));
    }
    let pool_size = raw_redis.pool_size.unwrap_or(DEFAULT_POOL_SIZE);

    let log = match raw.log {
        Some(l) => LogConfig {
            level: l.level.unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_owned()),
        },
        None => LogConfig {
            level: DEFAULT_LOG_LEVEL.to_owned(),
        },
    };

    Ok(Config {
        frontend: FrontendConfig {
            log_listen,
            rpc_listen,
            queue_size,
        },
        store: StoreConfig {
            elasticsearchs,
            redis: RedisConfig { server, pool_size },
            index,
        },
        log,
    })
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
frontend:
  log_listen: "0.0.0.0:9001"
  rpc_listen: "0.0.0.0:9002"
store:
  elasticsearchs:
    - "http://es1:9200"
  redis:
    server:
      - "redis1:6379"
  index: "ems"
"#;

    #[test]
    fn loads_minimal_config_with_defaults() {
        let cfg = load_config_from_str(MINIMAL).unwrap();
        assert_eq!(cfg.frontend.queue_size, DEFAULT_QUEUE_SIZE);
        assert_eq!(cfg.store.redis.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn rejects_empty_elasticsearchs() {
        let yaml = r#"
frontend:
  log_listen: "0.0.0.0:9001"
  rpc_listen: "0.0.0.0:9002"
store:
  elasticsearchs: []
  redis:
    server:
      - "redis1:6379"
  index: "ems"
"#;
        assert!(matches!(
            load_config_from_str(yaml),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn rejects_missing_redis_server() {
        let yaml = r#"
frontend:
  log_listen: "0.0.0.0:9001"
  rpc_listen: "0.0.0.0:9002"
store:
  elasticsearchs:
    - "http://es1:9200"
  redis:
    server: []
  index: "ems"
"#;
        assert!(matches!(
            load_config_from_str(yaml),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn explicit_log_level_overrides_default() {
        let yaml = format!("{MINIMAL}\nlog:\n  level: \"debug\"\n");
        let cfg = load_config_from_str(&yaml).unwrap();
        assert_eq!(cfg.log.level, "debug");
    }
}
