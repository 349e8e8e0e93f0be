mod fetch;
mod tracker;

pub use self::fetch::{FetchResponse, HttpFetcher, TagFetcher};
pub use self::tracker::{Observation, PushTracker};

use crate::error::{ConfigError, WatchError};
use crate::events::{EventKind, Listener, ListenerRegistry, WatchEvent};
use crate::metrics::{
    FETCH_DURATION, LAST_PUSHED_TIMESTAMP, PUSHES_DETECTED_TOTAL, TICK_ERRORS_TOTAL, TICKS_TOTAL,
    WATCHING,
};
use crate::models::{TagSnapshot, WatchTarget};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Docker Hub, whose API serves `tag_last_pushed`
pub const DEFAULT_REGISTRY_URL: &str = "https://hub.docker.com";

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Longest accepted polling interval (one year)
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Options accepted by [`TagWatcher::new`]
#[derive(Clone, Debug)]
pub struct WatcherOptions {
    /// Image name, e.g. `debian` or `containrrr/watchtower`
    pub image: String,
    /// Tag name, e.g. `10` or `latest`
    pub tag: String,
    /// Time between polls
    pub interval: Duration,
    /// Registry API base URL
    pub registry_url: String,
}

impl WatcherOptions {
    pub fn new(image: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            tag: tag.into(),
            interval: DEFAULT_INTERVAL,
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_registry_url(mut self, url: impl Into<String>) -> Self {
        self.registry_url = url.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.image.trim().is_empty() {
            return Err(ConfigError::EmptyImage);
        }
        if self.tag.trim().is_empty() {
            return Err(ConfigError::EmptyTag);
        }
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if self.interval > MAX_INTERVAL {
            return Err(ConfigError::IntervalTooLong {
                max_secs: MAX_INTERVAL.as_secs(),
            });
        }
        Ok(())
    }
}

/// State shared between the watcher and its spawned tasks
struct Shared {
    target: WatchTarget,
    endpoint: String,
    fetcher: Arc<dyn TagFetcher>,
    listeners: ListenerRegistry,
}

/// Baseline tracking for one `start()`..`stop()` run
#[derive(Default)]
struct Session {
    tracker: Mutex<PushTracker>,
    /// Held from observation through `push` delivery so pushes arrive in order
    delivery: Mutex<()>,
}

impl Session {
    /// Compare-and-record in a single critical section
    fn observe(&self, pushed_at: DateTime<Utc>) -> Observation {
        let mut tracker = self.tracker.lock().unwrap_or_else(|e| e.into_inner());
        tracker.observe(pushed_at)
    }

    fn last_seen(&self) -> Option<DateTime<Utc>> {
        let tracker = self.tracker.lock().unwrap_or_else(|e| e.into_inner());
        tracker.last_seen()
    }
}

struct Running {
    timer: JoinHandle<()>,
    session: Arc<Session>,
}

/// Polls the registry for one image tag and emits `error`, `fetch` and
/// `push` events.
///
/// Stopping cancels future ticks only. A tick already waiting on the
/// registry finishes and still emits its events, but it records into the
/// session it was started for, so it can never affect the baseline of a
/// later `start()`.
///
/// `push` events of one run are delivered in timestamp order, even when
/// ticks overlap on a multi-threaded runtime. `fetch` and `error` events of
/// overlapping ticks are delivered in completion order.
pub struct TagWatcher {
    shared: Arc<Shared>,
    interval: Duration,
    running: Mutex<Option<Running>>,
}

impl TagWatcher {
    /// Create a watcher. No I/O happens until [`start`](Self::start).
    pub fn new(options: WatcherOptions, fetcher: Arc<dyn TagFetcher>) -> Result<Self, ConfigError> {
        options.validate()?;

        let target = WatchTarget::parse(&options.image, &options.tag);
        let endpoint = target.endpoint(&options.registry_url);

        Ok(Self {
            shared: Arc::new(Shared {
                target,
                endpoint,
                fetcher,
                listeners: ListenerRegistry::new(),
            }),
            interval: options.interval,
            running: Mutex::new(None),
        })
    }

    /// Create a watcher backed by [`HttpFetcher`]
    pub fn with_http(
        options: WatcherOptions,
        request_timeout: Option<Duration>,
    ) -> anyhow::Result<Self> {
        let fetcher = HttpFetcher::new(request_timeout)?;
        Ok(Self::new(options, Arc::new(fetcher))?)
    }

    pub fn target(&self) -> &WatchTarget {
        &self.shared.target
    }

    pub fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True while a polling timer is scheduled
    pub fn is_watching(&self) -> bool {
        self.lock_running().is_some()
    }

    /// Baseline of the current run, if one has been observed
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.lock_running()
            .as_ref()
            .and_then(|running| running.session.last_seen())
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.shared.listeners.count(kind)
    }

    /// Start polling, restarting if already running.
    ///
    /// One tick is spawned immediately, then one per interval. Each start
    /// begins a fresh session, so the next successful tick becomes the new
    /// baseline.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn start(&self) -> &Self {
        let mut running = self.lock_running();
        if Self::cancel(&mut running) {
            debug!("Restarting watcher for {}", self.shared.target);
        }

        let session = Arc::new(Session::default());

        tokio::spawn(run_tick(Arc::clone(&self.shared), Arc::clone(&session)));

        let shared = Arc::clone(&self.shared);
        let tick_session = Arc::clone(&session);
        let interval = self.interval;
        let timer = tokio::spawn(async move {
            let now = Instant::now();
            let first = now.checked_add(interval).unwrap_or(now + MAX_INTERVAL);
            let mut ticker = tokio::time::interval_at(first, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // Ticks run detached so a slow registry never delays the schedule
                tokio::spawn(run_tick(Arc::clone(&shared), Arc::clone(&tick_session)));
            }
        });

        *running = Some(Running { timer, session });
        WATCHING.inc();

        info!(
            "Watching {} every {}ms",
            self.shared.target,
            self.interval.as_millis()
        );

        self
    }

    /// Stop polling. Listeners stay registered. No-op when not running.
    pub fn stop(&self) -> &Self {
        let mut running = self.lock_running();
        if Self::cancel(&mut running) {
            info!("Stopped watching {}", self.shared.target);
        }
        self
    }

    pub fn on(&self, kind: EventKind, listener: Listener) -> &Self {
        self.shared.listeners.add(kind, listener);
        self
    }

    /// Remove every registration of `listener` under `kind`
    pub fn off(&self, kind: EventKind, listener: &Listener) -> &Self {
        self.shared.listeners.remove(kind, listener);
        self
    }

    /// Remove all listeners for `kind`, or for every kind when `None`
    pub fn off_all(&self, kind: Option<EventKind>) -> &Self {
        self.shared.listeners.clear(kind);
        self
    }

    fn lock_running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn cancel(running: &mut Option<Running>) -> bool {
        match running.take() {
            Some(previous) => {
                previous.timer.abort();
                WATCHING.dec();
                true
            },
            None => false,
        }
    }
}

impl Drop for TagWatcher {
    fn drop(&mut self) {
        let running = self.running.get_mut().unwrap_or_else(|e| e.into_inner());
        Self::cancel(running);
    }
}

impl std::fmt::Debug for TagWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagWatcher")
            .field("target", &self.shared.target)
            .field("endpoint", &self.shared.endpoint)
            .field("interval", &self.interval)
            .field("watching", &self.is_watching())
            .field("listeners", &self.shared.listeners)
            .finish()
    }
}

/// One poll: fetch, validate, compare, emit
async fn run_tick(shared: Arc<Shared>, session: Arc<Session>) {
    TICKS_TOTAL.inc();
    debug!("Polling {}", shared.endpoint);

    let snapshot = match fetch_snapshot(&shared).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            debug!("Failed to poll {}: {}", shared.target, e);
            TICK_ERRORS_TOTAL.inc();
            shared.listeners.emit(&WatchEvent::Error(Arc::new(e)));
            return;
        },
    };

    shared.listeners.emit(&WatchEvent::Fetch(snapshot.body()));

    let pushed_at = snapshot.pushed_at();
    let _delivery = session.delivery.lock().unwrap_or_else(|e| e.into_inner());
    match session.observe(pushed_at) {
        Observation::Baseline => {
            debug!("Baseline for {} is {}", shared.target, pushed_at);
            LAST_PUSHED_TIMESTAMP.set(pushed_at.timestamp());
        },
        Observation::Advanced => {
            info!("New push detected for {} at {}", shared.target, pushed_at);
            PUSHES_DETECTED_TOTAL.inc();
            LAST_PUSHED_TIMESTAMP.set(pushed_at.timestamp());
            shared.listeners.emit(&WatchEvent::Push(pushed_at));
        },
        Observation::Unchanged => {
            debug!("No new push for {}", shared.target);
        },
    }
}

async fn fetch_snapshot(shared: &Shared) -> Result<TagSnapshot, WatchError> {
    let timer = FETCH_DURATION.start_timer();
    let response = shared.fetcher.fetch(&shared.endpoint).await;
    timer.observe_duration();

    let response = response?;
    if !response.is_success() {
        return Err(WatchError::Status(response.status));
    }

    TagSnapshot::from_body(response.json()?)
}
