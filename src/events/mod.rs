//! Listener registry for watcher events.
//!
//! Listeners are keyed by [`EventKind`] and invoked in registration order.
//! A listener that panics is logged and skipped; the remaining listeners for
//! the same emission still run.

use crate::error::WatchError;
use crate::metrics::LISTENER_PANICS_TOTAL;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, RwLock};
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A tick failed (transport, status or body problem)
    Error,
    /// The tag was pushed again since the last observation
    Push,
    /// A tick returned a valid response
    Fetch,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::Error, EventKind::Push, EventKind::Fetch];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Push => "push",
            Self::Fetch => "fetch",
        }
    }
}

/// Payload delivered to listeners
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Error(Arc<WatchError>),
    /// New `tag_last_pushed` value
    Push(DateTime<Utc>),
    /// Full decoded response body
    Fetch(Arc<Value>),
}

impl WatchEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Error(_) => EventKind::Error,
            Self::Push(_) => EventKind::Push,
            Self::Fetch(_) => EventKind::Fetch,
        }
    }
}

/// Callback handle. Two handles are the same listener iff they share the allocation.
pub type Listener = Arc<dyn Fn(&WatchEvent) + Send + Sync>;

/// Wrap a closure into a [`Listener`] handle that can later be passed to `off`.
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&WatchEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<HashMap<EventKind, Vec<Listener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener. The same handle may be registered more than once.
    pub fn add(&self, kind: EventKind, listener: Listener) {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        listeners.entry(kind).or_default().push(listener);
    }

    /// Remove every registration of `listener` under `kind`
    pub fn remove(&self, kind: EventKind, listener: &Listener) {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        if let Some(list) = listeners.get_mut(&kind) {
            list.retain(|l| !Arc::ptr_eq(l, listener));
            if list.is_empty() {
                listeners.remove(&kind);
            }
        }
    }

    /// Remove all listeners for `kind`, or for every kind when `None`
    pub fn clear(&self, kind: Option<EventKind>) {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        match kind {
            Some(kind) => {
                listeners.remove(&kind);
            },
            None => listeners.clear(),
        }
    }

    pub fn count(&self, kind: EventKind) -> usize {
        let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner());
        listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Deliver `event` to a snapshot of the listeners registered for its kind.
    ///
    /// The lock is released before any listener runs, so listeners may
    /// subscribe or unsubscribe from inside the callback.
    pub fn emit(&self, event: &WatchEvent) {
        let kind = event.kind();
        let snapshot: Vec<Listener> = {
            let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner());
            match listeners.get(&kind) {
                Some(list) => list.clone(),
                None => return,
            }
        };

        for (index, listener) in snapshot.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                error!(
                    event = kind.as_str(),
                    listener = index,
                    "Event listener panicked; continuing with remaining listeners"
                );
                LISTENER_PANICS_TOTAL.inc();
            }
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for kind in EventKind::ALL {
            map.entry(&kind.as_str(), &self.count(kind));
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> Listener {
        let log = Arc::clone(log);
        listener(move |event| {
            log.lock()
                .unwrap()
                .push(format!("{}:{}", name, event.kind().as_str()));
        })
    }

    fn push_event() -> WatchEvent {
        WatchEvent::Push(Utc::now())
    }

    #[test]
    fn test_emit_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ListenerRegistry::new();
        registry.add(EventKind::Push, recorder(&log, "a"));
        registry.add(EventKind::Push, recorder(&log, "b"));
        registry.add(EventKind::Fetch, recorder(&log, "c"));

        registry.emit(&push_event());

        assert_eq!(*log.lock().unwrap(), vec!["a:push", "b:push"]);
    }

    #[test]
    fn test_duplicate_registration_invoked_twice() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ListenerRegistry::new();
        let l = recorder(&log, "dup");
        registry.add(EventKind::Push, Arc::clone(&l));
        registry.add(EventKind::Push, l);

        registry.emit(&push_event());

        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_remove_only_matching_listener() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ListenerRegistry::new();
        let a = recorder(&log, "a");
        registry.add(EventKind::Push, Arc::clone(&a));
        registry.add(EventKind::Push, recorder(&log, "b"));
        registry.add(EventKind::Push, Arc::clone(&a));

        registry.remove(EventKind::Push, &a);
        registry.emit(&push_event());

        assert_eq!(*log.lock().unwrap(), vec!["b:push"]);
        assert_eq!(registry.count(EventKind::Push), 1);
    }

    #[test]
    fn test_remove_under_other_kind_is_noop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ListenerRegistry::new();
        let a = recorder(&log, "a");
        registry.add(EventKind::Push, Arc::clone(&a));

        registry.remove(EventKind::Error, &a);

        assert_eq!(registry.count(EventKind::Push), 1);
    }

    #[test]
    fn test_clear_single_kind_and_all() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ListenerRegistry::new();
        for kind in EventKind::ALL {
            registry.add(kind, recorder(&log, "x"));
        }

        registry.clear(Some(EventKind::Fetch));
        assert_eq!(registry.count(EventKind::Fetch), 0);
        assert_eq!(registry.count(EventKind::Push), 1);

        registry.clear(None);
        for kind in EventKind::ALL {
            assert_eq!(registry.count(kind), 0);
        }
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ListenerRegistry::new();
        registry.add(EventKind::Push, listener(|_| panic!("listener failure")));
        registry.add(EventKind::Push, recorder(&log, "after"));

        registry.emit(&push_event());

        assert_eq!(*log.lock().unwrap(), vec!["after:push"]);
    }

    #[test]
    fn test_listener_can_unsubscribe_itself() {
        let registry = Arc::new(ListenerRegistry::new());
        let calls = Arc::new(Mutex::new(0));

        let slot: Arc<Mutex<Option<Listener>>> = Arc::new(Mutex::new(None));
        let once = {
            let registry = Arc::clone(&registry);
            let calls = Arc::clone(&calls);
            let slot = Arc::clone(&slot);
            listener(move |_| {
                *calls.lock().unwrap() += 1;
                if let Some(me) = slot.lock().unwrap().as_ref() {
                    registry.remove(EventKind::Push, me);
                }
            })
        };
        *slot.lock().unwrap() = Some(Arc::clone(&once));
        registry.add(EventKind::Push, once);

        registry.emit(&push_event());
        registry.emit(&push_event());

        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_event_kind_strings() {
        assert_eq!(EventKind::Error.as_str(), "error");
        assert_eq!(EventKind::Push.as_str(), "push");
        assert_eq!(EventKind::Fetch.as_str(), "fetch");
    }
}
