//! Stormcast: real-time geospatial warning relay.
//!
//! Distributes short-lived warning events to many concurrent
//! subscribers over two transports, with durable state so reconnecting
//! clients recover the active set and expiries survive restarts.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────┐
//!                      │                  STORMCAST                   │
//!                      │                                              │
//!   WebSocket client ──┼─▶ http/ws ──┐                                │
//!                      │             ├─▶ relay ─▶ store (SQLite)      │
//!   TCP subscriber ────┼─▶ net ──────┘     │  ▲                       │
//!                      │                   │  │ ExpiryFired           │
//!                      │                   ▼  │                       │
//!                      │               scheduler (one timer per id)   │
//!                      │                   │                          │
//!                      │                   ▼                          │
//!   all subscribers ◀──┼────────────── fanout (both registries)       │
//!                      │                                              │
//!                      │  ┌────────────────────────────────────────┐  │
//!                      │  │          Cross-Cutting Concerns        │  │
//!                      │  │  config   lifecycle   observability    │  │
//!                      │  └────────────────────────────────────────┘  │
//!                      └──────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod errors;
pub mod fanout;
pub mod model;
pub mod protocol;
pub mod relay;
pub mod scheduler;
pub mod store;

// Transports
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::RelayConfig;
pub use errors::{RelayError, RelayResult};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use relay::RelayController;
