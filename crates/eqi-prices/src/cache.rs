//! Key/value cache with per-entry TTL.
//!
//! Expired entries are not dropped on read: the price fallback chain can
//! still ask for them through [`PriceCache::get_stale`].

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Cache boundary used by the price service.
pub trait PriceCache<V: Clone>: Send + Sync {
    /// Value if present and not yet expired.
    fn get(&self, key: &str) -> Option<V>;

    /// Value if present, expired or not.
    fn get_stale(&self, key: &str) -> Option<V>;

    fn set(&self, key: &str, value: V, ttl: Duration);
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Process-local cache.
#[derive(Debug, Default)]
pub struct InMemoryPriceCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V> InMemoryPriceCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Poisoning leaves the map intact.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry<V>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<V: Clone + Send> PriceCache<V> for InMemoryPriceCache<V> {
    fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        self.lock()
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone())
    }

    fn get_stale(&self, key: &str) -> Option<V> {
        self.lock().get(key).map(|e| e.value.clone())
    }

    fn set(&self, key: &str, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.lock()
            .insert(key.to_string(), Entry { value, expires_at });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entry_is_served() {
        let c = InMemoryPriceCache::new();
        c.set("PETR4", 25.0_f64, Duration::from_secs(60));
        assert_eq!(c.get("PETR4"), Some(25.0));
        assert_eq!(c.get_stale("PETR4"), Some(25.0));
        assert_eq!(c.get("VALE3"), None);
    }

    #[test]
    fn expired_entry_is_only_stale() {
        let c = InMemoryPriceCache::new();
        c.set("PETR4", 25.0_f64, Duration::ZERO);
        assert_eq!(c.get("PETR4"), None);
        assert_eq!(c.get_stale("PETR4"), Some(25.0));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn set_overwrites() {
        let c = InMemoryPriceCache::new();
        c.set("X", 1.0_f64, Duration::from_secs(60));
        c.set("X", 2.0_f64, Duration::from_secs(60));
        assert_eq!(c.get("X"), Some(2.0));
        assert_eq!(c.len(), 1);
    }
}
