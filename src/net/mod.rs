//! Raw TCP stream transport.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (newline-delimited JSON session)
//!         ├─ inbound lines → relay controller
//!         └─ outbound channel → socket writes
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion; the permit is
//!   held for the connection's lifetime.
//! - Same logical messages as the WebSocket channel; only the framing
//!   differs (one JSON document per line).

pub mod connection;
pub mod listener;

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::lifecycle::Shutdown;
use crate::relay::RelayController;

pub use listener::{Listener, ListenerError};

/// Accept stream subscribers until shutdown, one task per connection.
pub async fn run_stream_listener(
    listener: Listener,
    controller: Arc<RelayController>,
    shutdown: &Shutdown,
) {
    let mut stop: broadcast::Receiver<()> = shutdown.subscribe();
    loop {
        tokio::select! {
            _ = stop.recv() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer, permit)) => {
                        let controller = controller.clone();
                        let stop = shutdown.subscribe();
                        tokio::spawn(async move {
                            connection::serve_connection(stream, peer, controller, permit, stop).await;
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Stream accept failed");
                    }
                }
            }
        }
    }
    tracing::info!("Stream listener stopped");
}
