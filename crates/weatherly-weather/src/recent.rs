//! Bounded most-recently-used list of searched cities.

use std::sync::Arc;

use parking_lot::Mutex;

use weatherly_core::StorageError;

use crate::storage::KeyValueStore;
use crate::types::CityKey;

pub const RECENT_CITIES_CAPACITY: usize = 5;

const RECENT_CITIES_KEY: &str = "recent_cities";

/// Most-recent-first, duplicate-free, capped at [`RECENT_CITIES_CAPACITY`].
///
/// The list is loaded from storage on first use and written back in full on
/// every touch. The lock is held across the read-modify-write so concurrent
/// touches cannot interleave.
pub struct RecentCitiesTracker {
    store: Arc<dyn KeyValueStore>,
    cities: Mutex<Option<Vec<CityKey>>>,
}

impl RecentCitiesTracker {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            cities: Mutex::new(None),
        }
    }

    /// Move `city` to the front, evicting the oldest entry past capacity.
    pub fn touch(&self, city: &str) {
        let key = CityKey::normalize(city);
        if key.is_empty() {
            return;
        }

        let mut guard = self.cities.lock();
        let cities = guard.get_or_insert_with(|| self.load());

        cities.retain(|existing| existing != &key);
        cities.insert(0, key);
        cities.truncate(RECENT_CITIES_CAPACITY);

        self.persist(cities);
    }

    pub fn list(&self) -> Vec<String> {
        let mut guard = self.cities.lock();
        guard
            .get_or_insert_with(|| self.load())
            .iter()
            .map(|key| key.as_str().to_string())
            .collect()
    }

    fn load(&self) -> Vec<CityKey> {
        let raw = match self.store.get(RECENT_CITIES_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to load recent cities: {}", e);
                return Vec::new();
            }
        };

        match decode(&raw) {
            Ok(mut cities) => {
                cities.truncate(RECENT_CITIES_CAPACITY);
                cities
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable recent cities list: {}", e);
                Vec::new()
            }
        }
    }

    fn persist(&self, cities: &[CityKey]) {
        let json = match encode(cities) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize recent cities: {}", e);
                return;
            }
        };

        if let Err(e) = self.store.set(RECENT_CITIES_KEY, &json) {
            tracing::warn!("Failed to save recent cities: {}", e);
        }
    }
}

fn decode(raw: &str) -> Result<Vec<CityKey>, StorageError> {
    serde_json::from_str(raw).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn encode(cities: &[CityKey]) -> Result<String, StorageError> {
    serde_json::to_string(cities).map_err(|e| StorageError::Serialization(e.to_string()))
}
