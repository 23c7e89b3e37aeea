//! Observable per-screen weather state.
//!
//! A [`WeatherSession`] drives its [`SessionState`] exclusively through the
//! [`FetchCoordinator`] and publishes every accepted transition on a
//! `tokio::sync::watch` channel. Newer requests supersede older ones: a result
//! that arrives after the session moved on is dropped.
//!
//! The watch channel only guarantees the latest value; a receiver that polls
//! late may skip intermediate states such as `Loading`. Use
//! [`WeatherSession::observe`] to see every accepted transition in order.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::coordinator::FetchCoordinator;
use crate::types::{CityKey, ErrorKind, WeatherPayload};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Loading {
        city: String,
        /// User-initiated re-pull rather than a first load
        refreshing: bool,
    },
    Ready {
        city: String,
        payload: WeatherPayload,
        served_from_cache: bool,
    },
    Error {
        city: String,
        kind: ErrorKind,
    },
}

impl SessionState {
    pub fn city(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Loading { city, .. } | Self::Ready { city, .. } | Self::Error { city, .. } => {
                Some(city)
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready { .. } | Self::Error { .. })
    }

    /// Showing saved data because the network could not supply fresh data.
    pub fn is_offline_ready(&self) -> bool {
        matches!(
            self,
            Self::Ready {
                served_from_cache: true,
                ..
            }
        )
    }

    pub fn payload(&self) -> Option<&WeatherPayload> {
        match self {
            Self::Ready { payload, .. } => Some(payload),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&'static str> {
        match self {
            Self::Error { kind, .. } => Some(kind.user_message()),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct ActiveCity {
    city: String,
    key: CityKey,
}

#[derive(Debug, Default)]
struct SessionInner {
    generation: u64,
    active: Option<ActiveCity>,
    closed: bool,
}

type Observer = Arc<dyn Fn(&SessionState) + Send + Sync>;

pub struct WeatherSession {
    coordinator: Arc<FetchCoordinator>,
    inner: Mutex<SessionInner>,
    state_tx: watch::Sender<SessionState>,
    observers: Mutex<Vec<Observer>>,
}

impl WeatherSession {
    pub fn new(coordinator: Arc<FetchCoordinator>) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            coordinator,
            inner: Mutex::new(SessionInner::default()),
            state_tx,
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Current state, read synchronously.
    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    /// Latest accepted state; intermediate values may be coalesced.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Call `observer` synchronously with every accepted transition, in order.
    ///
    /// Runs while the session lock is held, so `observer` must not call back
    /// into this session.
    pub fn observe(&self, observer: impl Fn(&SessionState) + Send + Sync + 'static) {
        self.observers.lock().push(Arc::new(observer));
    }

    fn apply(&self, state: SessionState) {
        let observers: Vec<Observer> = self.observers.lock().clone();
        for observer in &observers {
            observer(&state);
        }
        self.state_tx.send_replace(state);
    }

    pub fn active_city(&self) -> Option<String> {
        self.inner.lock().active.as_ref().map(|a| a.city.clone())
    }

    /// Look up `city`, superseding any request still in flight.
    ///
    /// Returns the terminal state if it was applied, or `None` if a newer
    /// request, `clear`, or `close` overtook this one.
    pub async fn request(&self, city: &str) -> Option<SessionState> {
        self.run(city, false).await
    }

    /// Re-pull the active city. `None` if there is nothing to refresh.
    pub async fn refresh(&self) -> Option<SessionState> {
        let city = self.active_city()?;
        self.run(&city, true).await
    }

    /// Back to `Idle`; anything in flight is discarded.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        inner.active = None;
        if !inner.closed {
            self.apply(SessionState::Idle);
        }
    }

    /// Stop delivering transitions. In-flight lookups still finish but are ignored.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        inner.closed = true;
        tracing::debug!("Weather session closed");
    }

    async fn run(&self, city: &str, refreshing: bool) -> Option<SessionState> {
        let generation = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return None;
            }
            inner.generation += 1;
            inner.active = Some(ActiveCity {
                city: city.to_string(),
                key: CityKey::normalize(city),
            });
            inner.generation
        };

        let outcome = self
            .coordinator
            .resolve_with(city, refreshing, |state| {
                self.publish(generation, state);
            })
            .await;

        if self.publish(generation, outcome.clone()) {
            Some(outcome)
        } else {
            tracing::debug!("Discarding superseded result for '{}'", city);
            None
        }
    }

    /// Apply `state` only if it still belongs to the active request.
    fn publish(&self, generation: u64, state: SessionState) -> bool {
        let inner = self.inner.lock();
        if inner.closed || inner.generation != generation {
            return false;
        }

        let belongs_to_active = match (&inner.active, state.city()) {
            (Some(active), Some(city)) => active.key == CityKey::normalize(city),
            _ => false,
        };
        if !belongs_to_active {
            return false;
        }

        self.apply(state);
        true
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::testing::{payload, settle, Fixture};

    fn session(fx: Fixture) -> Arc<WeatherSession> {
        Arc::new(WeatherSession::new(Arc::new(fx.coordinator)))
    }

    #[tokio::test]
    async fn test_starts_idle() {
        let fx = Fixture::online();
        let session = session(fx);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.active_city(), None);
    }

    #[tokio::test]
    async fn test_observers_see_loading_then_ready() {
        let fx = Fixture::online();
        fx.source.respond("Paris", Ok(payload("Paris", 15.0)));
        let gate = fx.source.gate("Paris");
        let session = session(fx);
        let mut rx = session.subscribe();

        let s = session.clone();
        let task = tokio::spawn(async move { s.request("Paris").await });

        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_loading());

        gate.notify_one();
        rx.changed().await.unwrap();
        assert!(matches!(
            *rx.borrow_and_update(),
            SessionState::Ready { served_from_cache: false, .. }
        ));

        assert!(task.await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_observe_sees_every_transition_of_a_quick_lookup() {
        let fx = Fixture::online();
        fx.source.respond("Paris", Ok(payload("Paris", 15.0)));
        let session = session(fx);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        session.observe(move |state| sink.lock().push(state.clone()));
        let rx = session.subscribe();

        session.request("Paris").await.unwrap();
        session.clear();

        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert!(seen[0].is_loading());
        assert!(matches!(seen[1], SessionState::Ready { .. }));
        assert_eq!(seen[2], SessionState::Idle);
        // The watch channel only kept the last value.
        assert_eq!(*rx.borrow(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_observe_skips_discarded_results() {
        let fx = Fixture::online();
        fx.source.respond("London", Ok(payload("London", 11.0)));
        fx.source.respond("Paris", Ok(payload("Paris", 15.0)));
        let london_gate = fx.source.gate("London");
        let session = session(fx);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        session.observe(move |state| sink.lock().push(state.city().map(str::to_string)));

        let s = session.clone();
        let london = tokio::spawn(async move { s.request("London").await });
        settle().await;
        session.request("Paris").await;
        london_gate.notify_one();
        assert_eq!(london.await.unwrap(), None);

        let cities = seen.lock().clone();
        assert_eq!(
            cities,
            vec![
                Some("London".to_string()),
                Some("Paris".to_string()),
                Some("Paris".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_stale_response_is_discarded() {
        let fx = Fixture::online();
        fx.source.respond("London", Ok(payload("London", 11.0)));
        fx.source.respond("Paris", Ok(payload("Paris", 15.0)));
        let london_gate = fx.source.gate("London");
        let session = session(fx);

        let s = session.clone();
        let london = tokio::spawn(async move { s.request("London").await });
        settle().await;
        assert_eq!(session.state().city(), Some("London"));

        let paris = session.request("Paris").await;
        assert!(paris.is_some());

        london_gate.notify_one();
        assert_eq!(london.await.unwrap(), None);

        let state = session.state();
        assert_eq!(state.city(), Some("Paris"));
        assert_eq!(state.payload().map(|p| p.resolved_address.as_str()), Some("Paris"));
    }

    #[tokio::test]
    async fn test_stale_response_discarded_while_newer_still_loading() {
        let fx = Fixture::online();
        fx.source.respond("London", Ok(payload("London", 11.0)));
        fx.source.respond("Paris", Ok(payload("Paris", 15.0)));
        let london_gate = fx.source.gate("London");
        let paris_gate = fx.source.gate("Paris");
        let session = session(fx);

        let s = session.clone();
        let london = tokio::spawn(async move { s.request("London").await });
        settle().await;
        let s = session.clone();
        let paris = tokio::spawn(async move { s.request("Paris").await });
        settle().await;

        london_gate.notify_one();
        assert_eq!(london.await.unwrap(), None);
        assert!(session.state().is_loading());
        assert_eq!(session.state().city(), Some("Paris"));

        paris_gate.notify_one();
        assert!(paris.await.unwrap().is_some());
        assert_eq!(session.state().city(), Some("Paris"));
    }

    #[tokio::test]
    async fn test_refresh_reuses_active_city() {
        let fx = Fixture::online();
        fx.source.respond("Oslo", Ok(payload("Oslo", 2.0)));
        let source = fx.source.clone();
        let session = session(fx);

        assert_eq!(session.refresh().await, None);

        session.request("Oslo").await.unwrap();

        let refreshed = session.refresh().await.unwrap();
        assert!(matches!(refreshed, SessionState::Ready { .. }));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_refresh_marks_loading_as_refresh() {
        let fx = Fixture::online();
        fx.source.respond("Oslo", Ok(payload("Oslo", 2.0)));
        let source = fx.source.clone();
        let session = session(fx);
        session.request("Oslo").await.unwrap();

        let gate = source.gate("Oslo");
        let s = session.clone();
        let task = tokio::spawn(async move { s.refresh().await });
        settle().await;

        assert_eq!(
            session.state(),
            SessionState::Loading {
                city: "Oslo".into(),
                refreshing: true
            }
        );
        gate.notify_one();
        assert!(task.await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear_discards_in_flight_result() {
        let fx = Fixture::online();
        fx.source.respond("Oslo", Ok(payload("Oslo", 2.0)));
        let gate = fx.source.gate("Oslo");
        let session = session(fx);

        let s = session.clone();
        let task = tokio::spawn(async move { s.request("Oslo").await });
        settle().await;

        session.clear();
        gate.notify_one();

        assert_eq!(task.await.unwrap(), None);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.active_city(), None);
    }

    #[tokio::test]
    async fn test_close_stops_delivery() {
        let fx = Fixture::online();
        fx.source.respond("Oslo", Ok(payload("Oslo", 2.0)));
        let session = session(fx);

        session.request("Oslo").await.unwrap();
        let before = session.state();

        session.close();
        assert_eq!(session.request("Oslo").await, None);
        assert_eq!(session.state(), before);
    }

    #[tokio::test]
    async fn test_invalid_input_surfaces_error() {
        let fx = Fixture::online();
        let session = session(fx);

        let state = session.request("  ").await.unwrap();
        assert!(matches!(
            state,
            SessionState::Error { kind: ErrorKind::InvalidInput, .. }
        ));
        assert_eq!(session.state().error_message(), Some("Please enter a city name."));
    }

    #[tokio::test]
    async fn test_offline_ready_after_connectivity_loss() {
        let fx = Fixture::online();
        fx.source.respond("Rome", Ok(payload("Rome", 25.0)));
        let monitor = fx.monitor.clone();
        let session = session(fx);

        session.request("Rome").await.unwrap();
        assert!(!session.state().is_offline_ready());

        monitor.set(false);
        let state = session.refresh().await.unwrap();
        assert!(state.is_offline_ready());
    }
}
