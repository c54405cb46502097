use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Virtual points per server, matching the node-multiplication technique
/// of `stathat/consistent` (the library the Go original links against;
/// see `SPEC_FULL.md` §4.B).
const REPLICAS: u32 = 160;

fn hash_str(s: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

/// A stable consistent-hash ring over a fixed set of server names.
///
/// Built once at startup from `store.redis.server` (§6) and never
/// mutated afterward — cache-server addition/removal is explicitly out
/// of scope (§4.B).
#[derive(Debug, Default)]
pub struct Ring {
    points: BTreeMap<u64, String>,
}

impl Ring {
    pub fn new() -> Self {
        Ring {
            points: BTreeMap::new(),
        }
    }

    pub fn build(servers: &[String]) -> Self {
        let mut ring = Ring::new();
        for server in servers {
            ring.add(server);
        }
        ring
    }

    pub fn add(&mut self, server: &str) {
        for replica in 0..REPLICAS {
            let point = hash_str(&format!("{server}#{replica}"));
            self.points.insert(point, server.to_owned());
        }
    }

    /// Map `key` to the server owning the first ring point at or after
    /// `hash(key)`, wrapping around to the lowest point if `key` hashes
    /// past the last one.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.points.is_empty() {
            return None;
        }
        let h = hash_str(key);
        self.points
            .range(h..)
            .next()
            .or_else(|| self.points.iter().next())
            .map(|(_, server)| server.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring_returns_none() {
        let ring = Ring::new();
        assert_eq!(ring.get("R1"), None);
    }

    #[test]
    fn single_server_owns_every_key() {
        let ring = Ring::build(&["redis-a".to_owned()]);
        assert_eq!(ring.get("R1"), Some("redis-a"));
        assert_eq!(ring.get("R2"), Some("redis-a"));
    }

    #[test]
    fn same_key_always_maps_to_same_server() {
        let ring = Ring::build(&["a".to_owned(), "b".to_owned(), "c".to_owned()]);
        let first = ring.get("some-request-id").unwrap().to_owned();
        for _ in 0..100 {
            assert_eq!(ring.get("some-request-id").unwrap(), first);
        }
    }

    #[test]
    fn distributes_keys_across_all_servers() {
        let servers = vec!["a".to_owned(), "b".to_owned(), "c".to_owned()];
        let ring = Ring::build(&servers);
        let mut seen = std::collections::HashSet::new();
        for i in 0..1000 {
            seen.insert(ring.get(&format!("request-{i}")).unwrap().to_owned());
        }
        assert_eq!(seen.len(), 3, "expected all three servers to receive keys");
    }
}
