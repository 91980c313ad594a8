//! Configuration loading from disk and environment.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use crate::config::schema::RelayConfig;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration: defaults, then the optional TOML file, then
/// `STORMCAST_*` environment overrides, then semantic validation.
pub fn load_config(path: Option<&Path>) -> Result<RelayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => RelayConfig::default(),
    };

    apply_env_overrides(&mut config);
    validate_config(&config)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut RelayConfig) {
    if let Ok(addr) = std::env::var("STORMCAST_HTTP_ADDR") {
        config.http.bind_address = addr;
    }
    if let Ok(addr) = std::env::var("STORMCAST_STREAM_ADDR") {
        config.stream.bind_address = addr;
    }
    if let Ok(url) = std::env::var("STORMCAST_DATABASE_URL") {
        config.database.url = url;
    }
    if let Ok(filter) = std::env::var("STORMCAST_LOG") {
        config.observability.log_filter = filter;
    }
}

fn validate_config(config: &RelayConfig) -> Result<(), ConfigError> {
    for (name, addr) in [
        ("http.bind_address", &config.http.bind_address),
        ("stream.bind_address", &config.stream.bind_address),
    ] {
        if addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "{name} is not a socket address: {addr}"
            )));
        }
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        return Err(ConfigError::Invalid(format!(
            "observability.metrics_address is not a socket address: {}",
            config.observability.metrics_address
        )));
    }
    if config.stream.max_connections == 0 {
        return Err(ConfigError::Invalid(
            "stream.max_connections must be at least 1".to_string(),
        ));
    }
    if config.database.max_connections == 0 {
        return Err(ConfigError::Invalid(
            "database.max_connections must be at least 1".to_string(),
        ));
    }
    Ok(())
}
