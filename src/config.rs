//! Configuration schema and server-level settings.
//!
//! Game configs are strongly typed structs; the `ConfigField` list the
//! frontend consumes is a pure derivation from the typed schema, never from
//! runtime value inspection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field descriptor tag telling the frontend how to render an option.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigFieldType {
    Bool,
    Number,
    String,
    Select,
}

/// One host-configurable option with its current value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: ConfigFieldType,
    pub value: Value,
}

impl ConfigField {
    pub fn bool(name: &str, value: bool) -> Self {
        Self {
            name: name.to_string(),
            field_type: ConfigFieldType::Bool,
            value: Value::from(value),
        }
    }

    pub fn number(name: &str, value: i64) -> Self {
        Self {
            name: name.to_string(),
            field_type: ConfigFieldType::Number,
            value: Value::from(value),
        }
    }

    pub fn select(name: &str, values: &[String]) -> Self {
        Self {
            name: name.to_string(),
            field_type: ConfigFieldType::Select,
            value: Value::from(values.to_vec()),
        }
    }
}

/// A rejected config key with the reason it was not applied.
pub type ConfigRejection = (String, String);

/// Coerce a JSON value into an i64, accepting whole floats.
pub fn as_i64(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

/// Server-level settings, loaded once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Artificial per-write latency (ms) injected into connection writer
    /// tasks. Debug aid: one laggy socket must never stall the rest.
    pub simulate_ws_lag_ms: Option<u64>,
}

impl ServerConfig {
    /// Load from `PORT` and `SIMULATE_WS_LAG_MS` environment variables.
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(8000);
        let simulate_ws_lag_ms = std::env::var("SIMULATE_WS_LAG_MS")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .filter(|ms| *ms > 0);
        if simulate_ws_lag_ms.is_some() {
            tracing::warn!("WS lag simulation enabled - do not run this in production");
        }
        Self {
            port,
            simulate_ws_lag_ms,
        }
    }
}
