//! WebSocket subscriber sessions.
//!
//! # Responsibilities
//! - Complete the upgrade handshake
//! - Attach the subscriber (bootstrap snapshot is its first frame)
//! - Feed inbound text frames to the relay controller
//! - Drain the per-subscriber channel into outbound frames
//! - Detach on close or write failure

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};

use crate::fanout::TransportKind;
use crate::http::server::AppState;
use crate::relay::RelayController;

/// Upgrade handler for `GET /ws`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let shutdown = state.shutdown.subscribe();
    ws.on_upgrade(move |socket| session(socket, state.controller, shutdown))
}

async fn session(
    socket: WebSocket,
    controller: Arc<RelayController>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let subscriber = match controller.attach(TransportKind::WebSocket, tx).await {
        Ok(subscriber) => subscriber,
        Err(e) => {
            tracing::warn!(error = %e, "WebSocket attach failed");
            return;
        }
    };

    // Writer: drain the subscriber channel into text frames. Exits when
    // the channel closes (detach) or the peer stops reading.
    let writer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if sink.send(Message::Text(line.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    controller
                        .handle_inbound(TransportKind::WebSocket, subscriber, text.as_str())
                        .await;
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Pings are answered by axum; binary and pong frames
                // carry nothing for us.
                Some(Ok(_)) => {}
            },
        }
    }

    controller.detach(TransportKind::WebSocket, subscriber);
    writer.abort();
}
