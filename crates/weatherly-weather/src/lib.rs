//! Weather lookups for Weatherly
//!
//! Fetches current conditions and forecasts from Visual Crossing, keeps a
//! 24-hour cache per city, tracks connectivity, and falls back to cached data
//! when the network cannot answer.

pub mod cache;
pub mod clock;
pub mod coordinator;
pub mod network;
pub mod provider;
pub mod recent;
pub mod search;
pub mod session;
pub mod storage;
pub mod suggest;
pub mod types;

#[cfg(test)]
mod testing;

pub use cache::{CacheEntry, CacheStore, CACHE_TTL_HOURS};
pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{FetchCoordinator, DEFAULT_FETCH_TIMEOUT};
pub use network::{
    HttpReachabilityMonitor, ManualNetworkMonitor, NetworkMonitor, NetworkStatusTracker,
    Subscription,
};
pub use provider::{VisualCrossingClient, WeatherSource};
pub use recent::{RecentCitiesTracker, RECENT_CITIES_CAPACITY};
pub use search::{CitySearch, GeoDbClient};
pub use session::{SessionState, WeatherSession};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore};
pub use suggest::{CitySuggester, PendingLookup, SuggestionOutcome};
pub use types::*;
