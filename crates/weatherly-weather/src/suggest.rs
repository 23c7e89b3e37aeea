//! Debounced city suggestions.
//!
//! Each keystroke produces a [`PendingLookup`] that does nothing until awaited,
//! waits out the debounce window, and is cancelled by the next keystroke.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use weatherly_core::SearchConfig;

use crate::network::NetworkStatusTracker;
use crate::search::CitySearch;
use crate::types::{CityKey, CityResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestionOutcome {
    /// Possibly empty: "no matches" and a failed search look the same.
    Cities(Vec<CityResult>),
    /// Query below the minimum length; nothing was requested
    TooShort,
    /// No connectivity; nothing was requested
    Offline,
    /// Superseded by newer input or cancelled by the caller
    Cancelled,
}

pub struct CitySuggester {
    search: Arc<dyn CitySearch>,
    network: NetworkStatusTracker,
    debounce: Duration,
    min_query_len: usize,
    pending: Mutex<Option<CancellationToken>>,
}

impl CitySuggester {
    pub fn new(
        search: Arc<dyn CitySearch>,
        network: NetworkStatusTracker,
        debounce: Duration,
        min_query_len: usize,
    ) -> Self {
        Self {
            search,
            network,
            debounce,
            min_query_len,
            pending: Mutex::new(None),
        }
    }

    pub fn from_config(
        search: Arc<dyn CitySearch>,
        network: NetworkStatusTracker,
        config: &SearchConfig,
    ) -> Self {
        Self::new(
            search,
            network,
            Duration::from_millis(config.debounce_ms),
            config.min_query_len,
        )
    }

    /// Prepare a lookup for `raw`, cancelling the previous one.
    pub fn lookup(&self, raw: &str) -> PendingLookup {
        let token = CancellationToken::new();
        if let Some(previous) = self.pending.lock().replace(token.clone()) {
            previous.cancel();
        }

        PendingLookup {
            query: raw.trim().to_string(),
            token,
            search: self.search.clone(),
            network: self.network.clone(),
            debounce: self.debounce,
            min_query_len: self.min_query_len,
        }
    }

    /// Cancel whatever lookup is pending, e.g. when the input is cleared.
    pub fn cancel_pending(&self) {
        if let Some(token) = self.pending.lock().take() {
            token.cancel();
        }
    }
}

pub struct PendingLookup {
    query: String,
    token: CancellationToken,
    search: Arc<dyn CitySearch>,
    network: NetworkStatusTracker,
    debounce: Duration,
    min_query_len: usize,
}

impl PendingLookup {
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Handle for cancelling this lookup from elsewhere.
    pub fn cancellation(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn run(self) -> SuggestionOutcome {
        if CityKey::normalize(&self.query).as_str().chars().count() < self.min_query_len {
            return SuggestionOutcome::TooShort;
        }

        tokio::select! {
            biased;
            _ = self.token.cancelled() => return SuggestionOutcome::Cancelled,
            _ = tokio::time::sleep(self.debounce) => {}
        }

        if !self.network.current() {
            tracing::debug!("Skipping city search for '{}' while offline", self.query);
            return SuggestionOutcome::Offline;
        }

        tokio::select! {
            biased;
            _ = self.token.cancelled() => SuggestionOutcome::Cancelled,
            cities = self.search.search_cities(&self.query) => SuggestionOutcome::Cities(cities),
        }
    }
}
