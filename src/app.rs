use std::sync::Arc;

use weatherly_core::{AppError, Config, ReqwestErrorExt};
use weatherly_weather::{
    CacheStore, CitySuggester, FetchCoordinator, GeoDbClient, HttpReachabilityMonitor,
    KeyValueStore, MemoryStore, NetworkStatusTracker, RecentCitiesTracker, SqliteStore,
    SystemClock, VisualCrossingClient, WeatherSession,
};

/// Wires the weather services together from configuration.
pub struct App {
    config: Config,
    coordinator: Arc<FetchCoordinator>,
    suggester: CitySuggester,
}

impl App {
    /// Must be called from within a tokio runtime.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let store = Self::open_store(&config);

        let cache = Arc::new(CacheStore::new(store.clone(), Arc::new(SystemClock)));
        let recent = Arc::new(RecentCitiesTracker::new(store));

        let monitor = HttpReachabilityMonitor::new(&config.network)
            .map_err(ReqwestErrorExt::into_network_error)?;
        let network = NetworkStatusTracker::start(Arc::new(monitor));

        let source = Arc::new(VisualCrossingClient::new(&config.weather)?);
        let coordinator = Arc::new(FetchCoordinator::new(
            cache,
            recent,
            network.clone(),
            source,
        ));

        let search =
            Arc::new(GeoDbClient::new(&config.search).map_err(ReqwestErrorExt::into_network_error)?);
        let suggester = CitySuggester::from_config(search, network, &config.search);

        tracing::info!("Weatherly services ready");

        Ok(Self {
            config,
            coordinator,
            suggester,
        })
    }

    /// SQLite under the config directory, or memory-only if that cannot be opened.
    fn open_store(config: &Config) -> Arc<dyn KeyValueStore> {
        let path = config.database_path();
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("Failed to create data directory {}: {}", parent.display(), e);
            }
        }

        match SqliteStore::new(&path) {
            Ok(store) => {
                tracing::debug!("Opened weather store at {}", path.display());
                Arc::new(store)
            }
            Err(e) => {
                tracing::warn!(
                    "Weather store unavailable at {} ({}); nothing will persist",
                    path.display(),
                    e
                );
                Arc::new(MemoryStore::new())
            }
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn new_session(&self) -> WeatherSession {
        WeatherSession::new(self.coordinator.clone())
    }

    pub fn suggester(&self) -> &CitySuggester {
        &self.suggester
    }

    pub fn recent_cities(&self) -> Vec<String> {
        self.coordinator.recent_cities()
    }
}
