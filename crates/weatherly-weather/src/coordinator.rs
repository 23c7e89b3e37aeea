//! Cache-versus-network decision for a single city request.

use std::sync::Arc;
use std::time::Duration;

use weatherly_core::NetworkError;

use crate::cache::CacheStore;
use crate::network::NetworkStatusTracker;
use crate::provider::WeatherSource;
use crate::recent::RecentCitiesTracker;
use crate::session::SessionState;
use crate::types::{CityKey, ErrorKind, FetchError, WeatherPayload};

/// Upper bound on one remote lookup when the source sets none of its own.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

pub struct FetchCoordinator {
    cache: Arc<CacheStore>,
    recent: Arc<RecentCitiesTracker>,
    network: NetworkStatusTracker,
    source: Arc<dyn WeatherSource>,
    fetch_timeout: Duration,
}

impl FetchCoordinator {
    pub fn new(
        cache: Arc<CacheStore>,
        recent: Arc<RecentCitiesTracker>,
        network: NetworkStatusTracker,
        source: Arc<dyn WeatherSource>,
    ) -> Self {
        Self {
            cache,
            recent,
            network,
            source,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn network(&self) -> &NetworkStatusTracker {
        &self.network
    }

    pub fn recent_cities(&self) -> Vec<String> {
        self.recent.list()
    }

    /// Resolve `city` to a terminal state, discarding intermediate states.
    pub async fn resolve(&self, city: &str) -> SessionState {
        self.resolve_with(city, false, |_| {}).await
    }

    /// Resolve `city`, handing `Loading` to `emit` before the first suspension point.
    ///
    /// `refreshing` only flags the `Loading` state for the UI. Empty input
    /// fails with `InvalidInput` without emitting `Loading`.
    pub async fn resolve_with<F>(&self, city: &str, refreshing: bool, mut emit: F) -> SessionState
    where
        F: FnMut(SessionState) + Send,
    {
        let key = CityKey::normalize(city);
        if key.is_empty() {
            return SessionState::Error {
                city: city.to_string(),
                kind: ErrorKind::InvalidInput,
            };
        }

        emit(SessionState::Loading {
            city: city.to_string(),
            refreshing,
        });

        if !self.network.current() {
            tracing::debug!("Offline, serving '{}' from cache only", key);
            return match self.cache.read(city) {
                Some(payload) => Self::ready(city, payload, true),
                None => {
                    tracing::info!("Offline with no cached weather for '{}'", key);
                    Self::error(city, ErrorKind::NoCachedData)
                }
            };
        }

        match self.fetch(city.trim()).await {
            Ok(payload) => {
                tracing::info!("Fetched fresh weather for '{}'", key);
                self.cache.write(city, &payload);
                self.recent.touch(city);
                Self::ready(city, payload, false)
            }
            Err(FetchError::NotFound(_)) => {
                tracing::info!("City '{}' not found", key);
                Self::error(city, ErrorKind::CityNotFound)
            }
            Err(FetchError::Service(e)) => match self.cache.read(city) {
                Some(payload) => {
                    tracing::warn!("Weather fetch for '{}' failed ({}), using cache", key, e);
                    Self::ready(city, payload, true)
                }
                None => {
                    tracing::warn!("Weather fetch for '{}' failed with no cache: {}", key, e);
                    Self::error(city, ErrorKind::FetchFailed)
                }
            },
        }
    }

    async fn fetch(&self, city: &str) -> Result<WeatherPayload, FetchError> {
        match tokio::time::timeout(self.fetch_timeout, self.source.fetch_weather(city)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Service(NetworkError::Timeout)),
        }
    }

    fn ready(city: &str, payload: WeatherPayload, served_from_cache: bool) -> SessionState {
        SessionState::Ready {
            city: city.to_string(),
            payload,
            served_from_cache,
        }
    }

    fn error(city: &str, kind: ErrorKind) -> SessionState {
        SessionState::Error {
            city: city.to_string(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use crate::testing::{payload, Fixture};

    #[tokio::test]
    async fn test_empty_input_is_invalid_without_loading() {
        let fx = Fixture::online();
        let mut emitted = Vec::new();

        let state = fx
            .coordinator
            .resolve_with("   ", false, |s| emitted.push(s))
            .await;

        assert!(matches!(
            state,
            SessionState::Error { kind: ErrorKind::InvalidInput, .. }
        ));
        assert!(emitted.is_empty());
        assert_eq!(fx.source.calls(), 0);
    }

    #[tokio::test]
    async fn test_loading_is_emitted_even_for_cache_hits() {
        let fx = Fixture::offline();
        fx.cache.write("paris", &payload("Paris", 12.0));
        let mut emitted = Vec::new();

        let state = fx
            .coordinator
            .resolve_with("Paris", false, |s| emitted.push(s))
            .await;

        assert_eq!(
            emitted,
            vec![SessionState::Loading {
                city: "Paris".into(),
                refreshing: false
            }]
        );
        assert!(state.is_offline_ready());
    }

    #[tokio::test]
    async fn test_refresh_flags_loading() {
        let fx = Fixture::online();
        fx.source.respond("Paris", Ok(payload("Paris", 12.0)));
        let mut emitted = Vec::new();

        fx.coordinator
            .resolve_with("Paris", true, |s| emitted.push(s))
            .await;

        assert!(matches!(
            emitted.as_slice(),
            [SessionState::Loading { refreshing: true, .. }]
        ));
    }

    #[tokio::test]
    async fn test_offline_without_cache() {
        let fx = Fixture::offline();

        let state = fx.coordinator.resolve("Paris").await;

        assert_eq!(
            state,
            SessionState::Error {
                city: "Paris".into(),
                kind: ErrorKind::NoCachedData
            }
        );
        assert_eq!(fx.source.calls(), 0, "no network access while offline");
    }

    #[tokio::test]
    async fn test_offline_with_normalized_cache_hit() {
        let fx = Fixture::offline();
        let cached = payload("Paris, France", 9.0);
        fx.cache.write("paris", &cached);

        let state = fx.coordinator.resolve("Paris").await;

        assert_eq!(
            state,
            SessionState::Ready {
                city: "Paris".into(),
                payload: cached,
                served_from_cache: true
            }
        );
        assert_eq!(fx.source.calls(), 0);
    }

    #[tokio::test]
    async fn test_online_success_writes_cache_and_recent() {
        let fx = Fixture::online();
        let fresh = payload("Lisbon, Portugal", 21.0);
        fx.source.respond("Lisbon", Ok(fresh.clone()));

        let state = fx.coordinator.resolve(" Lisbon ").await;

        assert_eq!(
            state,
            SessionState::Ready {
                city: " Lisbon ".into(),
                payload: fresh.clone(),
                served_from_cache: false
            }
        );
        assert_eq!(fx.cache.read("lisbon"), Some(fresh));
        assert_eq!(fx.coordinator.recent_cities(), vec!["lisbon"]);
    }

    #[tokio::test]
    async fn test_online_success_replaces_stale_cache() {
        let fx = Fixture::online();
        fx.cache.write("oslo", &payload("Oslo", 1.0));
        let fresh = payload("Oslo", 4.0);
        fx.source.respond("Oslo", Ok(fresh.clone()));

        let state = fx.coordinator.resolve("Oslo").await;

        assert!(matches!(state, SessionState::Ready { served_from_cache: false, .. }));
        assert_eq!(fx.cache.read("Oslo"), Some(fresh));
    }

    #[tokio::test]
    async fn test_not_found_does_not_fall_back_to_cache() {
        let fx = Fixture::online();
        fx.cache.write("atlantis", &payload("Atlantis", 30.0));
        fx.source
            .respond("Atlantis", Err(FetchError::NotFound("Atlantis".into())));

        let state = fx.coordinator.resolve("Atlantis").await;

        assert_eq!(
            state,
            SessionState::Error {
                city: "Atlantis".into(),
                kind: ErrorKind::CityNotFound
            }
        );
        assert!(fx.coordinator.recent_cities().is_empty());
    }

    #[tokio::test]
    async fn test_service_error_falls_back_to_cache() {
        let fx = Fixture::online();
        let cached = payload("Rome, Italy", 24.0);
        fx.cache.write("rome", &cached);
        fx.source.respond(
            "Rome",
            Err(FetchError::Service(NetworkError::ServerError {
                status: 503,
                message: "maintenance".into(),
            })),
        );

        let state = fx.coordinator.resolve("Rome").await;

        assert_eq!(
            state,
            SessionState::Ready {
                city: "Rome".into(),
                payload: cached,
                served_from_cache: true
            }
        );
    }

    #[tokio::test]
    async fn test_service_error_without_cache() {
        let fx = Fixture::online();
        fx.source.respond(
            "Rome",
            Err(FetchError::Service(NetworkError::ConnectionFailed("reset".into()))),
        );

        let state = fx.coordinator.resolve("Rome").await;

        assert!(matches!(
            state,
            SessionState::Error { kind: ErrorKind::FetchFailed, .. }
        ));
    }

    #[tokio::test]
    async fn test_cache_write_failure_still_shows_fresh_data() {
        let fx = Fixture::with_failing_storage();
        let fresh = payload("Lima, Peru", 18.0);
        fx.source.respond("Lima", Ok(fresh.clone()));

        let state = fx.coordinator.resolve("Lima").await;

        assert_eq!(state.payload(), Some(&fresh));
        assert!(!fx.cache.has("Lima"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_times_out_as_service_error() {
        let mut fx = Fixture::online();
        fx.coordinator = fx.coordinator.with_fetch_timeout(Duration::from_secs(2));
        let _gate = fx.source.gate("Quito");
        fx.source.respond("Quito", Ok(payload("Quito", 15.0)));
        let cached = payload("Quito (cached)", 14.0);
        fx.cache.write("quito", &cached);

        let state = fx.coordinator.resolve("Quito").await;

        assert_eq!(state.payload(), Some(&cached));
        assert!(state.is_offline_ready());
    }

    #[tokio::test]
    async fn test_offline_branch_is_decided_at_request_time() {
        let fx = Fixture::online();
        fx.source.respond("Oslo", Ok(payload("Oslo", 2.0)));
        let gate = fx.source.gate("Oslo");

        let resolving = fx.coordinator.resolve("Oslo");
        tokio::pin!(resolving);

        // Drive the request up to the gated fetch, then drop connectivity.
        tokio::select! {
            biased;
            _ = &mut resolving => panic!("fetch should be gated"),
            _ = tokio::task::yield_now() => {}
        }
        fx.monitor.set(false);
        gate.notify_one();

        let state = resolving.await;
        assert!(matches!(state, SessionState::Ready { served_from_cache: false, .. }));
    }
}
