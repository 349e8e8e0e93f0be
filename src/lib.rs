// Library exports for integration testing
//
// This file exposes the watcher and its collaborators while keeping
// the binary entrypoint in main.rs

pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod models;
pub mod notifications;
pub mod polling;

// Re-export commonly used types
pub use error::{ConfigError, WatchError};
pub use events::{EventKind, Listener, WatchEvent, listener};
pub use models::{TagSnapshot, WatchTarget};
pub use polling::{FetchResponse, HttpFetcher, TagFetcher, TagWatcher, WatcherOptions};
