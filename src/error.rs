use thiserror::Error;

/// Failure of a single polling tick.
///
/// Every variant is routed to the `error` event; none of them stop the watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Registry request failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Registry API response is not OK: {0}")]
    Status(u16),

    #[error("Registry API response is not valid JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("Registry API response does not include '{0}' key")]
    MissingField(&'static str),

    #[error("Registry API response has an invalid '{field}' timestamp: {value}")]
    InvalidTimestamp {
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl WatchError {
    pub fn transport(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Transport(err.into())
    }
}

/// Invalid watcher or process configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Image name must not be empty")]
    EmptyImage,

    #[error("Tag name must not be empty")]
    EmptyTag,

    #[error("Polling interval must be greater than zero")]
    ZeroInterval,

    #[error("Polling interval must not exceed {max_secs}s")]
    IntervalTooLong { max_secs: u64 },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
}
