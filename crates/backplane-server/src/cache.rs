//! Read-through cache for service-level lookups.
//!
//! Values are stored as serialized JSON so the cache never hands out
//! aliased mutable state. Writes evict an entire namespace rather than
//! chasing individual keys, which keeps invalidation correct even for
//! derived entries like counts and filtered listings.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Debug, Clone)]
struct CachedEntry {
    bytes: Arc<Vec<u8>>,
    inserted_at: Instant,
    ttl: Option<Duration>,
}

impl CachedEntry {
    fn is_expired(&self) -> bool {
        match self.ttl {
            Some(ttl) => self.inserted_at.elapsed() >= ttl,
            None => false,
        }
    }
}

/// Process-local cache backend. `Disabled` turns every operation into a
/// no-op so services need no branching of their own.
#[derive(Debug, Clone)]
pub enum CacheBackend {
    Local {
        entries: Arc<DashMap<String, CachedEntry>>,
        ttl: Option<Duration>,
    },
    Disabled,
}

impl CacheBackend {
    pub fn local(ttl: Option<Duration>) -> Self {
        Self::Local {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn disabled() -> Self {
        Self::Disabled
    }

    pub fn from_config(cfg: &crate::config::CacheConfig) -> Self {
        if cfg.enabled {
            Self::local(cfg.ttl())
        } else {
            Self::disabled()
        }
    }

    fn get_bytes(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        match self {
            Self::Local { entries, .. } => {
                let expired = match entries.get(key) {
                    Some(entry) if entry.is_expired() => true,
                    Some(entry) => return Some(Arc::clone(&entry.bytes)),
                    None => return None,
                };
                // Expired entries are dropped lazily on the read path.
                if expired {
                    entries.remove_if(key, |_, entry| entry.is_expired());
                }
                None
            }
            Self::Disabled => None,
        }
    }

    fn put_bytes(&self, key: String, bytes: Vec<u8>) {
        if let Self::Local { entries, ttl } = self {
            entries.insert(
                key,
                CachedEntry {
                    bytes: Arc::new(bytes),
                    inserted_at: Instant::now(),
                    ttl: *ttl,
                },
            );
        }
    }

    fn remove(&self, key: &str) {
        if let Self::Local { entries, .. } = self {
            entries.remove(key);
        }
    }

    fn remove_namespace(&self, namespace: &str) {
        if let Self::Local { entries, .. } = self {
            let prefix = format!("{namespace}:");
            entries.retain(|key, _| !key.starts_with(&prefix));
        }
    }
}

/// Namespaced view over a [`CacheBackend`], used one-per-service.
///
/// Keys are `"{namespace}:{suffix}"`, so evicting the namespace clears
/// every entry the owning service ever wrote without touching others.
#[derive(Debug, Clone)]
pub struct EntityCache {
    backend: CacheBackend,
    namespace: &'static str,
}

impl EntityCache {
    pub fn new(backend: CacheBackend, namespace: &'static str) -> Self {
        Self { backend, namespace }
    }

    fn full_key(&self, suffix: &str) -> String {
        format!("{}:{suffix}", self.namespace)
    }

    /// Looks up and deserializes a cached value. Entries that fail to
    /// deserialize are evicted and reported as a miss.
    pub fn get<T: DeserializeOwned>(&self, suffix: &str) -> Option<T> {
        let key = self.full_key(suffix);
        let bytes = self.backend.get_bytes(&key)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "evicting undecodable cache entry");
                self.backend.remove(&key);
                None
            }
        }
    }

    /// Serializes and stores a value. Serialization failures skip the
    /// cache rather than failing the caller.
    pub fn put<T: Serialize>(&self, suffix: &str, value: &T) {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.backend.put_bytes(self.full_key(suffix), bytes),
            Err(err) => {
                tracing::warn!(namespace = self.namespace, error = %err, "failed to serialize cache value");
            }
        }
    }

    pub fn evict(&self, suffix: &str) {
        self.backend.remove(&self.full_key(suffix));
    }

    /// Drops every entry in this cache's namespace.
    pub fn evict_all(&self) {
        self.backend.remove_namespace(self.namespace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_values() {
        let cache = EntityCache::new(CacheBackend::local(None), "modules");
        cache.put("count", &42u64);
        assert_eq!(cache.get::<u64>("count"), Some(42));
    }

    #[test]
    fn disabled_backend_never_stores() {
        let cache = EntityCache::new(CacheBackend::disabled(), "modules");
        cache.put("count", &42u64);
        assert_eq!(cache.get::<u64>("count"), None);
    }

    #[test]
    fn eviction_is_scoped_to_the_namespace() {
        let backend = CacheBackend::local(None);
        let modules = EntityCache::new(backend.clone(), "modules");
        let calculations = EntityCache::new(backend, "calculations");
        modules.put("count", &1u64);
        calculations.put("count", &2u64);

        modules.evict_all();

        assert_eq!(modules.get::<u64>("count"), None);
        assert_eq!(calculations.get::<u64>("count"), Some(2));
    }

    #[test]
    fn single_key_eviction() {
        let cache = EntityCache::new(CacheBackend::local(None), "modules");
        cache.put("count", &1u64);
        cache.put("all", &vec!["a".to_string()]);

        cache.evict("count");

        assert_eq!(cache.get::<u64>("count"), None);
        assert_eq!(cache.get::<Vec<String>>("all"), Some(vec!["a".to_string()]));
    }

    #[test]
    fn expired_entries_read_as_misses() {
        let cache = EntityCache::new(
            CacheBackend::local(Some(Duration::from_millis(10))),
            "modules",
        );
        cache.put("count", &1u64);
        assert_eq!(cache.get::<u64>("count"), Some(1));

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get::<u64>("count"), None);
    }

    #[test]
    fn undecodable_entries_are_evicted() {
        let backend = CacheBackend::local(None);
        let cache = EntityCache::new(backend.clone(), "modules");
        cache.put("all", &vec![1u64, 2, 3]);

        // A reader expecting a different shape gets a miss, not an error.
        assert_eq!(cache.get::<std::collections::HashMap<String, u64>>("all"), None);
        if let CacheBackend::Local { entries, .. } = &backend {
            assert!(!entries.contains_key("modules:all"));
        }
    }

    #[test]
    fn backend_from_config() {
        let enabled = crate::config::CacheConfig {
            enabled: true,
            ttl_secs: Some(60),
        };
        assert!(matches!(
            CacheBackend::from_config(&enabled),
            CacheBackend::Local {
                ttl: Some(ttl),
                ..
            } if ttl == Duration::from_secs(60)
        ));

        let disabled = crate::config::CacheConfig {
            enabled: false,
            ttl_secs: None,
        };
        assert!(matches!(
            CacheBackend::from_config(&disabled),
            CacheBackend::Disabled
        ));
    }
}
