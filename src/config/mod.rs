use crate::error::ConfigError;
use crate::polling::{DEFAULT_REGISTRY_URL, WatcherOptions};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Env var naming an optional YAML config file
pub const CONFIG_PATH_ENV: &str = "TAGWATCH_CONFIG";

/// Tagwatch configuration loaded from a YAML file and environment variables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TagwatchConfig {
    pub watch: WatchConfig,
    pub metrics: MetricsConfig,
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WatchConfig {
    pub image: String,
    pub tag: String,
    /// Polling interval in milliseconds
    pub interval_ms: u64,
    pub registry_url: String,
    /// Per-request timeout applied by the HTTP client; none when unset
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebhookConfig {
    pub enabled: bool,
    pub url: Option<String>,
    pub secret: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            image: String::new(),
            tag: "latest".to_string(),
            interval_ms: 60_000,
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            request_timeout_secs: None,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: "0.0.0.0:9090".to_string(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            secret: None,
            timeout_seconds: 10,
        }
    }
}

impl TagwatchConfig {
    /// Load from `$TAGWATCH_CONFIG` (if set) and apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::load_from(&vars)
    }

    /// Same as [`load`](Self::load) with an explicit variable map
    pub fn load_from(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = match vars.get(CONFIG_PATH_ENV) {
            Some(path) if !path.is_empty() => Self::from_file(path)?,
            _ => Self::default(),
        };
        config.apply_env(vars)?;
        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let shown = path.display().to_string();

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: shown.clone(),
            source,
        })?;
        let config = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: shown.clone(),
            source,
        })?;

        info!("Loaded configuration file {}", shown);
        Ok(config)
    }

    /// Override file values with any `TAGWATCH_*` variables present
    pub fn apply_env(&mut self, vars: &HashMap<String, String>) -> Result<(), ConfigError> {
        if let Some(v) = vars.get("TAGWATCH_IMAGE") {
            self.watch.image = v.clone();
        }
        if let Some(v) = vars.get("TAGWATCH_TAG") {
            self.watch.tag = v.clone();
        }
        if let Some(v) = parse_env(vars, "TAGWATCH_INTERVAL_MS")? {
            self.watch.interval_ms = v;
        }
        if let Some(v) = vars.get("TAGWATCH_REGISTRY_URL") {
            self.watch.registry_url = v.clone();
        }
        if let Some(v) = parse_env(vars, "TAGWATCH_REQUEST_TIMEOUT_SECS")? {
            self.watch.request_timeout_secs = Some(v);
        }
        if let Some(v) = parse_env(vars, "TAGWATCH_METRICS_ENABLED")? {
            self.metrics.enabled = v;
        }
        if let Some(v) = vars.get("TAGWATCH_METRICS_ADDR") {
            self.metrics.addr = v.clone();
        }
        if let Some(v) = vars.get("TAGWATCH_WEBHOOK_URL") {
            self.webhook.url = Some(v.clone());
            self.webhook.enabled = true;
        }
        if let Some(v) = vars.get("TAGWATCH_WEBHOOK_SECRET") {
            self.webhook.secret = Some(v.clone());
        }
        if let Some(v) = parse_env(vars, "TAGWATCH_WEBHOOK_TIMEOUT_SECS")? {
            self.webhook.timeout_seconds = v;
        }
        Ok(())
    }

    pub fn watcher_options(&self) -> Result<WatcherOptions, ConfigError> {
        let options = WatcherOptions::new(&self.watch.image, &self.watch.tag)
            .with_interval(Duration::from_millis(self.watch.interval_ms))
            .with_registry_url(&self.watch.registry_url);
        options.validate()?;
        Ok(options)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.watch.request_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_env<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match vars.get(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                key,
                value: value.clone(),
            }),
    }
}
