//! TTL-governed weather cache over the key/value store.
//!
//! Expiry is lazy: an entry's age is computed against the clock at read time,
//! and an expired entry is deleted only when it is next touched.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use weatherly_core::StorageError;

use crate::clock::Clock;
use crate::storage::KeyValueStore;
use crate::types::{CityKey, WeatherPayload};

/// Maximum age of a cached payload.
pub const CACHE_TTL_HOURS: i64 = 24;

const KEY_PREFIX: &str = "weather:";

/// A stored snapshot for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CityKey,
    pub payload: WeatherPayload,
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.cached_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.age(now) > Duration::hours(CACHE_TTL_HOURS)
    }
}

/// Persisted shape; the key lives in the storage key, not the value.
#[derive(Serialize, Deserialize)]
struct StoredEntry {
    payload: WeatherPayload,
    cached_at: DateTime<Utc>,
}

impl StoredEntry {
    fn encode(&self) -> Result<String, StorageError> {
        serde_json::to_string(self).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    fn decode(raw: &str) -> Result<Self, StorageError> {
        serde_json::from_str(raw).map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

pub struct CacheStore {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn storage_key(key: &CityKey) -> String {
        format!("{}{}", KEY_PREFIX, key.as_str())
    }

    /// Store `payload` for `city`, replacing any previous entry and resetting its age.
    ///
    /// Best-effort: persistence failures are logged and swallowed.
    pub fn write(&self, city: &str, payload: &WeatherPayload) {
        let key = CityKey::normalize(city);
        let entry = StoredEntry {
            payload: payload.clone(),
            cached_at: self.clock.now(),
        };

        let json = match entry.encode() {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize weather for '{}': {}", key, e);
                return;
            }
        };

        match self.store.set(&Self::storage_key(&key), &json) {
            Ok(()) => tracing::debug!("Cached weather for '{}'", key),
            Err(e) => tracing::warn!("Failed to cache weather for '{}': {}", key, e),
        }
    }

    /// Fresh entry for `city`, if any. Expired entries are evicted and reported absent.
    ///
    /// Eviction only removes the exact value that was read, so a concurrent
    /// `write` for the same city survives.
    pub fn read_entry(&self, city: &str) -> Option<CacheEntry> {
        let key = CityKey::normalize(city);
        let storage_key = Self::storage_key(&key);

        let raw = match self.store.get(&storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to read cached weather for '{}': {}", key, e);
                return None;
            }
        };

        let stored = match StoredEntry::decode(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Discarding unreadable cache entry for '{}': {}", key, e);
                self.evict_stale(&storage_key, &raw);
                return None;
            }
        };

        let entry = CacheEntry {
            key,
            payload: stored.payload,
            cached_at: stored.cached_at,
        };

        if entry.is_expired(self.clock.now()) {
            tracing::debug!("Cache entry for '{}' expired, evicting", entry.key);
            self.evict_stale(&storage_key, &raw);
            return None;
        }

        Some(entry)
    }

    pub fn read(&self, city: &str) -> Option<WeatherPayload> {
        self.read_entry(city).map(|entry| entry.payload)
    }

    pub fn has(&self, city: &str) -> bool {
        self.read_entry(city).is_some()
    }

    /// Drop the entry for `city` regardless of age.
    pub fn invalidate(&self, city: &str) {
        let key = CityKey::normalize(city);
        self.evict(&Self::storage_key(&key));
    }

    fn evict(&self, storage_key: &str) {
        if let Err(e) = self.store.remove(storage_key) {
            tracing::warn!("Failed to evict '{}': {}", storage_key, e);
        }
    }

    fn evict_stale(&self, storage_key: &str, raw: &str) {
        match self.store.remove_if(storage_key, raw) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("'{}' was rewritten before eviction, keeping it", storage_key)
            }
            Err(e) => tracing::warn!("Failed to evict '{}': {}", storage_key, e),
        }
    }
}
