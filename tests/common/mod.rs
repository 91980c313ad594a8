//! Shared utilities for integration testing.
//!
//! Wires a full relay (store, scheduler, controller, both transports)
//! on ephemeral loopback ports, the way `main` does.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use stormcast::config::RelayConfig;
use stormcast::fanout::FanOut;
use stormcast::lifecycle::Shutdown;
use stormcast::net::{self, Listener};
use stormcast::relay::RelayController;
use stormcast::scheduler::ExpiryScheduler;
use stormcast::store::WarningStore;
use stormcast::HttpServer;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub const WAIT: Duration = Duration::from_secs(5);

/// A fully wired relay on ephemeral ports.
pub struct TestRelay {
    pub http_addr: SocketAddr,
    pub stream_addr: SocketAddr,
    pub controller: Arc<RelayController>,
    shutdown: Shutdown,
}

impl TestRelay {
    pub async fn start(database_url: &str) -> Self {
        let mut config = RelayConfig::default();
        config.http.bind_address = "127.0.0.1:0".to_string();
        config.stream.bind_address = "127.0.0.1:0".to_string();
        config.database.url = database_url.to_string();

        let store = WarningStore::connect(&config.database.url, config.database.max_connections)
            .await
            .expect("store");
        let (scheduler, fired_rx) = ExpiryScheduler::new();
        let controller = Arc::new(RelayController::new(store, scheduler, FanOut::new()));
        controller.restore().await.expect("restore");

        let shutdown = Shutdown::new();
        RelayController::spawn_expiry_loop(controller.clone(), fired_rx, shutdown.subscribe());

        let stream_listener = Listener::bind(&config.stream).await.expect("stream bind");
        let stream_addr = stream_listener.local_addr().expect("stream addr");
        {
            let controller = controller.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                net::run_stream_listener(stream_listener, controller, &shutdown).await;
            });
        }

        let http_listener = TcpListener::bind(&config.http.bind_address)
            .await
            .expect("http bind");
        let http_addr = http_listener.local_addr().expect("http addr");
        let server = HttpServer::new(&config, controller.clone(), &shutdown);
        {
            let shutdown_rx = shutdown.subscribe();
            tokio::spawn(async move {
                let _ = server.run(http_listener, shutdown_rx).await;
            });
        }

        Self {
            http_addr,
            stream_addr,
            controller,
            shutdown,
        }
    }

    /// Stop every task, as a process shutdown would.
    pub fn stop(&self) {
        self.shutdown.trigger();
        self.controller.shutdown();
    }
}

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connect a WebSocket subscriber.
pub async fn ws_client(relay: &TestRelay) -> WsClient {
    let (client, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", relay.http_addr))
        .await
        .expect("ws connect");
    client
}

/// Next JSON frame from a WebSocket subscriber.
pub async fn ws_next(client: &mut WsClient) -> serde_json::Value {
    loop {
        let frame = tokio::time::timeout(WAIT, client.next())
            .await
            .expect("timed out waiting for ws frame")
            .expect("ws stream ended")
            .expect("ws error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("ws frame is json");
        }
    }
}

/// True if no frame arrives within the grace period.
pub async fn ws_silent(client: &mut WsClient, grace: Duration) -> bool {
    tokio::time::timeout(grace, client.next()).await.is_err()
}

pub async fn ws_send(client: &mut WsClient, frame: &serde_json::Value) {
    client
        .send(Message::Text(frame.to_string().into()))
        .await
        .expect("ws send");
}

/// A TCP stream subscriber speaking newline-delimited JSON.
pub struct TcpClient {
    reader: tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl TcpClient {
    pub async fn connect(relay: &TestRelay) -> Self {
        let stream = TcpStream::connect(relay.stream_addr).await.expect("tcp connect");
        let (read_half, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read_half).lines(),
            writer,
        }
    }

    pub async fn next(&mut self) -> serde_json::Value {
        let line = tokio::time::timeout(WAIT, self.reader.next_line())
            .await
            .expect("timed out waiting for tcp line")
            .expect("tcp read")
            .expect("tcp stream ended");
        serde_json::from_str(&line).expect("tcp line is json")
    }

    pub async fn silent(&mut self, grace: Duration) -> bool {
        tokio::time::timeout(grace, self.reader.next_line())
            .await
            .is_err()
    }

    pub async fn send(&mut self, frame: &serde_json::Value) {
        let mut line = frame.to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await.expect("tcp send");
    }
}
