// Common test utilities for integration tests
//
// Provides a scripted registry transport and an event recorder so watcher
// behaviour can be exercised without network access

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tagwatch::{EventKind, FetchResponse, TagFetcher, TagWatcher, WatchError, WatchEvent, listener};

/// One canned registry reply
#[derive(Debug, Clone)]
pub enum Reply {
    /// 200 with the given `tag_last_pushed`
    Pushed(&'static str),
    /// Non-success status
    Status(u16),
    /// 200 with an arbitrary body
    Body(&'static str),
    /// Network-level failure
    Fail(&'static str),
}

impl Reply {
    fn build(&self) -> Result<FetchResponse, WatchError> {
        match self {
            Self::Pushed(ts) => Ok(FetchResponse::new(200, tag_body(ts))),
            Self::Status(code) => Ok(FetchResponse::new(*code, "{\"message\":\"error\"}")),
            Self::Body(body) => Ok(FetchResponse::new(200, *body)),
            Self::Fail(msg) => Err(WatchError::transport(*msg)),
        }
    }
}

/// Docker Hub tag metadata body
pub fn tag_body(last_pushed: &str) -> String {
    serde_json::json!({
        "creator": 7,
        "id": 2034,
        "name": "latest",
        "last_updated": last_pushed,
        "tag_status": "active",
        "tag_last_pulled": "2024-06-01T00:00:00Z",
        "tag_last_pushed": last_pushed
    })
    .to_string()
}

/// Serves replies in order, repeating the last one once exhausted.
/// Each reply can be delayed to simulate a slow registry.
pub struct ScriptedFetcher {
    script: Vec<(Duration, Reply)>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Self::with_delays(replies.into_iter().map(|r| (Duration::ZERO, r)).collect())
    }

    pub fn with_delays(script: Vec<(Duration, Reply)>) -> Arc<Self> {
        assert!(!script.is_empty(), "script needs at least one reply");
        Arc::new(Self {
            script,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TagFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, WatchError> {
        let (delay, reply) = {
            let mut requests = self.requests.lock().unwrap();
            let index = requests.len().min(self.script.len() - 1);
            requests.push(url.to_string());
            self.script[index].clone()
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        reply.build()
    }
}

/// Records every event a watcher emits as `kind:detail` strings
#[derive(Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn attach(watcher: &TagWatcher) -> Self {
        let log = Self::default();
        for kind in EventKind::ALL {
            let entries = Arc::clone(&log.entries);
            watcher.on(
                kind,
                listener(move |event| {
                    entries.lock().unwrap().push(describe(event));
                }),
            );
        }
        log
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn of(&self, kind: EventKind) -> Vec<String> {
        let prefix = format!("{}:", kind.as_str());
        self.entries()
            .into_iter()
            .filter(|e| e.starts_with(&prefix))
            .collect()
    }
}

pub fn describe(event: &WatchEvent) -> String {
    match event {
        WatchEvent::Error(e) => format!("error:{}", e),
        WatchEvent::Push(ts) => format!("push:{}", ts.to_rfc3339()),
        WatchEvent::Fetch(body) => format!(
            "fetch:{}",
            body["tag_last_pushed"].as_str().unwrap_or_default()
        ),
    }
}

/// Let spawned ticks run without crossing the next interval boundary
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
