//! Process-wide network reachability.
//!
//! [`NetworkStatusTracker`] mirrors a [`NetworkMonitor`]'s change events into
//! a synchronously readable flag. It starts optimistic (`online = true`) and
//! corrects itself from one startup probe unless a real transition arrives first.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use weatherly_core::NetworkConfig;

/// Invoked with the new reachability on every transition.
pub type ConnectivityCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Handle returned by `subscribe`; unsubscribes when dropped.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Source of connectivity signals.
///
/// Implementations call subscribers only when the value changes; duplicate
/// states are filtered here, not by the tracker.
#[async_trait]
pub trait NetworkMonitor: Send + Sync {
    /// One-off reachability check.
    async fn probe(&self) -> bool;

    fn subscribe(&self, on_change: ConnectivityCallback) -> Subscription;
}

#[derive(Default)]
struct Listeners {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, ConnectivityCallback)>>,
}

impl Listeners {
    fn add(&self, callback: ConnectivityCallback) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().push((id, callback));
        id
    }

    fn remove(&self, id: u64) {
        self.entries.lock().retain(|(existing, _)| *existing != id);
    }

    fn notify(&self, online: bool) {
        // Snapshot so callbacks may (un)subscribe without deadlocking.
        let callbacks: Vec<ConnectivityCallback> = self
            .entries
            .lock()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback(online);
        }
    }
}

struct TrackerState {
    online: AtomicBool,
    saw_transition: AtomicBool,
    listeners: Listeners,
}

impl TrackerState {
    fn on_transition(&self, online: bool) {
        self.saw_transition.store(true, Ordering::SeqCst);
        if self.online.swap(online, Ordering::SeqCst) == online {
            return;
        }
        tracing::info!("Network is now {}", if online { "online" } else { "offline" });
        self.listeners.notify(online);
    }

    fn on_probe(&self, online: bool) {
        if self.saw_transition.load(Ordering::SeqCst) {
            tracing::debug!("Ignoring startup probe; a transition already arrived");
            return;
        }
        let previous = self.online.swap(online, Ordering::SeqCst);
        tracing::debug!("Startup reachability probe: online={}", online);
        if previous != online {
            self.listeners.notify(online);
        }
    }
}

/// Shared reachability state. Cheap to clone; all clones observe the same flag.
#[derive(Clone)]
pub struct NetworkStatusTracker {
    state: Arc<TrackerState>,
    _upstream: Arc<Subscription>,
}

impl NetworkStatusTracker {
    /// Subscribe to `monitor` and launch the startup probe.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(monitor: Arc<dyn NetworkMonitor>) -> Self {
        let state = Arc::new(TrackerState {
            online: AtomicBool::new(true),
            saw_transition: AtomicBool::new(false),
            listeners: Listeners::default(),
        });

        let weak: Weak<TrackerState> = Arc::downgrade(&state);
        let upstream = monitor.subscribe(Arc::new(move |online| {
            if let Some(state) = weak.upgrade() {
                state.on_transition(online);
            }
        }));

        let probe_state = Arc::downgrade(&state);
        tokio::spawn(async move {
            let online = monitor.probe().await;
            if let Some(state) = probe_state.upgrade() {
                state.on_probe(online);
            }
        });

        Self {
            state,
            _upstream: Arc::new(upstream),
        }
    }

    /// Last known reachability. Never blocks.
    pub fn current(&self) -> bool {
        self.state.online.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self, on_change: impl Fn(bool) + Send + Sync + 'static) -> Subscription {
        let id = self.state.listeners.add(Arc::new(on_change));
        let weak = Arc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = weak.upgrade() {
                state.listeners.remove(id);
            }
        })
    }
}

impl std::fmt::Debug for NetworkStatusTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkStatusTracker")
            .field("online", &self.current())
            .finish()
    }
}

/// Monitor whose state is set by hand: airplane-mode toggles, tests.
pub struct ManualNetworkMonitor {
    online: Mutex<bool>,
    listeners: Arc<Listeners>,
}

impl ManualNetworkMonitor {
    pub fn new(online: bool) -> Self {
        Self {
            online: Mutex::new(online),
            listeners: Arc::new(Listeners::default()),
        }
    }

    /// Update reachability, notifying subscribers only if it changed.
    pub fn set(&self, online: bool) {
        let changed = {
            let mut current = self.online.lock();
            let changed = *current != online;
            *current = online;
            changed
        };
        if changed {
            self.listeners.notify(online);
        }
    }

    pub fn is_online(&self) -> bool {
        *self.online.lock()
    }
}

#[async_trait]
impl NetworkMonitor for ManualNetworkMonitor {
    async fn probe(&self) -> bool {
        self.is_online()
    }

    fn subscribe(&self, on_change: ConnectivityCallback) -> Subscription {
        let id = self.listeners.add(on_change);
        let listeners = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.remove(id);
            }
        })
    }
}

/// Polls an HTTP endpoint; any response at all counts as reachable.
pub struct HttpReachabilityMonitor {
    client: Client,
    probe_url: String,
    poll_interval: Duration,
}

impl HttpReachabilityMonitor {
    pub fn new(config: &NetworkConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.probe_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            probe_url: config.probe_url.clone(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        })
    }

    async fn check(client: &Client, url: &str) -> bool {
        match client.head(url).send().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Reachability probe failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl NetworkMonitor for HttpReachabilityMonitor {
    async fn probe(&self) -> bool {
        Self::check(&self.client, &self.probe_url).await
    }

    /// Spawns the polling task; must be called from within a tokio runtime.
    fn subscribe(&self, on_change: ConnectivityCallback) -> Subscription {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let client = self.client.clone();
        let url = self.probe_url.clone();
        let period = self.poll_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            let mut last: Option<bool> = None;

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                // The first result is always delivered.
                let online = Self::check(&client, &url).await;
                if last != Some(online) {
                    on_change(online);
                }
                last = Some(online);
            }

            tracing::debug!("Reachability polling stopped");
        });

        Subscription::new(move || token.cancel())
    }
}
