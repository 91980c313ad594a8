//! Stream subscriber sessions.
//!
//! # Responsibilities
//! - Attach the subscriber (bootstrap snapshot is its first line)
//! - Parse inbound lines and feed them to the relay controller
//! - Drain the per-subscriber channel into newline-terminated writes
//! - Detach on EOF, write failure, or shutdown

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};

use crate::fanout::TransportKind;
use crate::net::listener::ConnectionPermit;
use crate::relay::RelayController;

/// Serve one stream subscriber until it disconnects or the relay shuts
/// down. The permit is held for the whole session.
pub async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    controller: Arc<RelayController>,
    permit: ConnectionPermit,
    mut shutdown: broadcast::Receiver<()>,
) {
    let (read_half, mut write_half) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let subscriber = match controller.attach(TransportKind::Stream, tx).await {
        Ok(subscriber) => subscriber,
        Err(e) => {
            tracing::warn!(peer_addr = %peer, error = %e, "Stream attach failed");
            return;
        }
    };

    // Writer: one JSON document per line.
    let writer = tokio::spawn(async move {
        while let Some(mut line) = rx.recv().await {
            line.push('\n');
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(read_half).lines();
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    controller
                        .handle_inbound(TransportKind::Stream, subscriber, trimmed)
                        .await;
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(peer_addr = %peer, error = %e, "Stream read failed");
                    break;
                }
            },
        }
    }

    controller.detach(TransportKind::Stream, subscriber);
    writer.abort();
    drop(permit);
    tracing::debug!(peer_addr = %peer, "Stream session closed");
}
