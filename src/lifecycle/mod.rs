//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → open store → restore timers → start listeners
//!
//! Shutdown:
//!     SIGTERM/SIGINT → Shutdown::trigger()
//!     → HTTP server drains, TCP accept loop stops, expiry loop exits
//!     → scheduler aborts pending timers (rebuilt from the store on
//!       next start, so cancellation loses no durable state)
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;

/// Wait for the first termination signal (Ctrl+C, plus SIGTERM on
/// Unix).
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("Received Ctrl+C"),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Received Ctrl+C");
    }
}
