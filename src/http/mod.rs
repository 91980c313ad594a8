//! HTTP transport subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, trace + timeout layers)
//!     → GET /health          liveness probe
//!     → GET /warnings/{date} historical query
//!     → GET /ws              upgrade → ws.rs session
//!                              ├─ inbound frames → relay controller
//!                              └─ outbound channel → WS text frames
//! ```

pub mod server;
pub mod ws;

pub use server::HttpServer;
