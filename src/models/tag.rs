use crate::error::WatchError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

/// Field carrying the time the tag was last pushed
pub const LAST_PUSHED_FIELD: &str = "tag_last_pushed";

/// A structurally valid tag metadata response
#[derive(Debug, Clone)]
pub struct TagSnapshot {
    pushed_at: DateTime<Utc>,
    body: Arc<Value>,
}

impl TagSnapshot {
    /// Validate a decoded response body.
    ///
    /// A falsy `tag_last_pushed` (`null`, `false`, `0`, `""`) counts as missing.
    pub fn from_body(body: Value) -> Result<Self, WatchError> {
        let raw = match body.get(LAST_PUSHED_FIELD) {
            Some(value) if is_falsy(value) => {
                return Err(WatchError::MissingField(LAST_PUSHED_FIELD));
            },
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => return Err(WatchError::MissingField(LAST_PUSHED_FIELD)),
        };

        let pushed_at = DateTime::parse_from_rfc3339(&raw)
            .map_err(|source| WatchError::InvalidTimestamp {
                field: LAST_PUSHED_FIELD,
                value: raw.clone(),
                source,
            })?
            .with_timezone(&Utc);

        Ok(Self {
            pushed_at,
            body: Arc::new(body),
        })
    }

    pub fn pushed_at(&self) -> DateTime<Utc> {
        self.pushed_at
    }

    /// The full decoded body, handed to `fetch` listeners
    pub fn body(&self) -> Arc<Value> {
        Arc::clone(&self.body)
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}
