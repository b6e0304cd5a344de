#![allow(dead_code)]
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::routing::get;
use axum::Router;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-process stream endpoint replaying a fixed script to each client
pub struct StreamServer {
    pub url: String,
    connections: Arc<AtomicUsize>,
}

impl StreamServer {
    /// With `hold_open` the server keeps the socket open after the script until
    /// the client goes away; otherwise it sends a close frame.
    pub async fn start(script: Vec<String>, hold_open: bool) -> Self {
        Self::start_after(script, hold_open, Duration::ZERO).await
    }

    /// Like [`StreamServer::start`] but waits `delay` before replaying.
    pub async fn start_after(script: Vec<String>, hold_open: bool, delay: Duration) -> Self {
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = connections.clone();
        let app = Router::new().route(
            "/ws/simulation",
            get(move |ws: WebSocketUpgrade| {
                let script = script.clone();
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    ws.on_upgrade(move |socket| replay(socket, script, hold_open, delay))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            url: format!("ws://{addr}/ws/simulation"),
            connections,
        }
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

async fn replay(mut socket: WebSocket, script: Vec<String>, hold_open: bool, delay: Duration) {
    tokio::time::sleep(delay).await;
    for text in script {
        if socket.send(Message::Text(text)).await.is_err() {
            return;
        }
    }
    if hold_open {
        while let Some(Ok(msg)) = socket.recv().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    } else {
        let _ = socket.send(Message::Close(None)).await;
    }
}
