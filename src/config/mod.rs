//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! .env (dotenvy)
//!     → optional TOML file (--config <path>)
//!     → loader.rs (parse & deserialize)
//!     → env overrides (STORMCAST_*)
//!     → semantic validation
//!     → RelayConfig (immutable, shared by value at startup)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart.
//! - All fields have defaults so the relay runs with no config at all.
//! - Validation separates syntactic (serde) from semantic checks.

pub mod loader;
pub mod schema;

pub use loader::{load_config, ConfigError};
pub use schema::{
    DatabaseConfig, HttpConfig, ObservabilityConfig, RelayConfig, StreamConfig,
};
