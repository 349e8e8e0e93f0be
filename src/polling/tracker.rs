use chrono::{DateTime, Utc};

/// Outcome of comparing a pushed-at timestamp against the last one seen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First timestamp of the session; recorded, not reported
    Baseline,
    /// Strictly later than the previous value
    Advanced,
    /// Equal or earlier; ignored
    Unchanged,
}

/// Remembers the latest `tag_last_pushed` value for one watch session.
///
/// The recorded value never moves backwards, so late results from slow
/// overlapping ticks cannot undo a newer observation.
#[derive(Debug, Default, Clone)]
pub struct PushTracker {
    last_seen: Option<DateTime<Utc>>,
}

impl PushTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, pushed_at: DateTime<Utc>) -> Observation {
        match self.last_seen {
            None => {
                self.last_seen = Some(pushed_at);
                Observation::Baseline
            },
            Some(previous) if pushed_at > previous => {
                self.last_seen = Some(pushed_at);
                Observation::Advanced
            },
            Some(_) => Observation::Unchanged,
        }
    }

    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_seen
    }
}
