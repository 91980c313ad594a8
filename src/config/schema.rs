//! Configuration schema definitions.
//!
//! All types derive Serde traits and carry full defaults, so a missing
//! or partial config file is never an error.

use serde::{Deserialize, Serialize};

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// HTTP listener (health, date queries, WebSocket upgrades).
    pub http: HttpConfig,

    /// Raw TCP stream listener.
    pub stream: StreamConfig,

    /// Warning store settings.
    pub database: DatabaseConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Per-request timeout; WebSocket sessions outlive it once
    /// upgraded.
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Raw TCP stream listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Bind address (e.g., "0.0.0.0:8081").
    pub bind_address: String,

    /// Maximum concurrent stream subscribers (backpressure).
    pub max_connections: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8081".to_string(),
            max_connections: 1024,
        }
    }
}

/// Warning store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite URL; the file is created if missing.
    pub url: String,

    /// Pool size; writes are short-lived, a handful suffices.
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:stormcast.db".to_string(),
            max_connections: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Expose a Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Address for the metrics endpoint.
    pub metrics_address: String,

    /// Default tracing filter; `RUST_LOG` overrides.
    pub log_filter: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
            log_filter: "stormcast=info".to_string(),
        }
    }
}
