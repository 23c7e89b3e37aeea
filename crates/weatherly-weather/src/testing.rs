//! Shared stubs for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use weatherly_core::{NetworkError, StorageError};

use crate::cache::CacheStore;
use crate::clock::ManualClock;
use crate::coordinator::FetchCoordinator;
use crate::network::{ManualNetworkMonitor, NetworkStatusTracker};
use crate::provider::WeatherSource;
use crate::recent::RecentCitiesTracker;
use crate::storage::{KeyValueStore, MemoryStore};
use crate::types::{CityKey, CurrentConditions, FetchError, WeatherPayload};

pub(crate) fn payload(address: &str, temp: f64) -> WeatherPayload {
    WeatherPayload {
        resolved_address: address.to_string(),
        current_conditions: CurrentConditions {
            temp,
            conditions: "Clear".to_string(),
            humidity: 50.0,
            windspeed: 8.0,
            visibility: 10.0,
            uvindex: 2.0,
            icon: Some("clear-day".to_string()),
        },
        days: Vec::new(),
    }
}

/// Let spawned tasks on the current-thread runtime run to their next await.
pub(crate) async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Storage that fails every operation.
pub(crate) struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("disk detached".into()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("disk detached".into()))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("disk detached".into()))
    }

    fn remove_if(&self, _key: &str, _expected: &str) -> Result<bool, StorageError> {
        Err(StorageError::Unavailable("disk detached".into()))
    }
}

/// Weather source with canned per-city answers and optional gates that hold
/// a lookup until released.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    responses: Mutex<HashMap<CityKey, Result<WeatherPayload, FetchError>>>,
    gates: Mutex<HashMap<CityKey, Arc<Notify>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub(crate) fn respond(&self, city: &str, response: Result<WeatherPayload, FetchError>) {
        self.responses
            .lock()
            .insert(CityKey::normalize(city), response);
    }

    /// Hold lookups for `city` until the returned handle is notified.
    pub(crate) fn gate(&self, city: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .insert(CityKey::normalize(city), gate.clone());
        gate
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherSource for ScriptedSource {
    async fn fetch_weather(&self, city: &str) -> Result<WeatherPayload, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = CityKey::normalize(city);

        let gate = self.gates.lock().get(&key).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.responses
            .lock()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| {
                Err(FetchError::Service(NetworkError::ConnectionFailed(
                    "no scripted response".into(),
                )))
            })
    }
}

pub(crate) struct Fixture {
    pub(crate) coordinator: FetchCoordinator,
    pub(crate) cache: Arc<CacheStore>,
    pub(crate) source: Arc<ScriptedSource>,
    pub(crate) monitor: Arc<ManualNetworkMonitor>,
}

impl Fixture {
    fn build(store: Arc<dyn KeyValueStore>, online: bool) -> Self {
        let clock = Arc::new(ManualClock::default());
        let cache = Arc::new(CacheStore::new(store.clone(), clock));
        let recent = Arc::new(RecentCitiesTracker::new(store));
        let monitor = Arc::new(ManualNetworkMonitor::new(true));
        let network = NetworkStatusTracker::start(monitor.clone());
        if !online {
            monitor.set(false);
        }
        let source = Arc::new(ScriptedSource::default());

        let coordinator = FetchCoordinator::new(cache.clone(), recent, network, source.clone());

        Self {
            coordinator,
            cache,
            source,
            monitor,
        }
    }

    pub(crate) fn online() -> Self {
        Self::build(Arc::new(MemoryStore::new()), true)
    }

    pub(crate) fn offline() -> Self {
        Self::build(Arc::new(MemoryStore::new()), false)
    }

    pub(crate) fn with_failing_storage() -> Self {
        Self::build(Arc::new(FailingStore), true)
    }
}
