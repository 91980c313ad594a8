//! HTTP server setup and request handlers.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (tracing, request timeout)
//! - Serve with graceful shutdown
//! - Answer liveness and historical date queries

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::RelayConfig;
use crate::http::ws;
use crate::lifecycle::Shutdown;
use crate::relay::RelayController;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<RelayController>,
    /// WebSocket sessions subscribe so a process shutdown closes them
    /// instead of stalling the graceful drain.
    pub shutdown: Shutdown,
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server wired to the controller.
    pub fn new(config: &RelayConfig, controller: Arc<RelayController>, shutdown: &Shutdown) -> Self {
        let state = AppState {
            controller,
            shutdown: shutdown.clone(),
        };
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/warnings/{date}", get(warnings_by_date))
            .route("/ws", get(ws::ws_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.http.request_timeout_secs,
            )))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener
    /// until the shutdown signal arrives.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[derive(Serialize)]
struct HealthStatus {
    ok: bool,
    timestamp: DateTime<Utc>,
}

/// Liveness probe; no interaction with core state.
async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        ok: true,
        timestamp: Utc::now(),
    })
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Warnings issued on a calendar date, ascending by issue time, with
/// polygons in structured form.
async fn warnings_by_date(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Response {
    let parsed = match NaiveDate::parse_from_str(&date, "%Y-%m-%d") {
        Ok(parsed) => parsed,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: format!("not a calendar date (expected YYYY-MM-DD): {date}"),
                }),
            )
                .into_response();
        }
    };

    match state.controller.warnings_issued_on(parsed).await {
        Ok(warnings) => Json(warnings).into_response(),
        Err(e) => {
            tracing::error!(date = %date, error = %e, "Date query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "query failed".to_string(),
                }),
            )
                .into_response()
        }
    }
}
