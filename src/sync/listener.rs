//! # Update Channel Listener
//!
//! Holds one WebSocket connection to the backend and forwards every recognised
//! field of every inbound message to the reconciler as its own patch.
//!
//! The listener never reconnects. When the connection drops, the task ends and
//! reports why through [`ListenerHandle::join`]; whether to try again is up to
//! whoever created it.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::event::{PatchEvent, SyncEvent};
use crate::error::SyncError;
use crate::ingest::parse_stream_message;

/// Why a listener stopped
#[derive(Debug)]
pub enum ListenerExit {
    /// `close()` was called or the parent token was cancelled
    Closed,
    /// The server closed the stream
    Disconnected,
    /// Could not connect, or the connection failed mid-stream
    Failed(SyncError),
    /// The reconciler queue is gone
    QueueClosed,
}

/// Owning handle to a running listener
pub struct ListenerHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<ListenerExit>>,
}

impl ListenerHandle {
    /// Connect to `url` and start forwarding patches. Connection errors surface
    /// through [`ListenerHandle::join`], never as a panic.
    pub fn spawn(url: String, events: mpsc::Sender<SyncEvent>, parent: &CancellationToken) -> Self {
        let cancel = parent.child_token();
        let task = tokio::spawn(listen(url, events, cancel.clone()));
        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Close the connection; no patch is forwarded after this returns.
    pub async fn close(mut self) -> ListenerExit {
        self.cancel.cancel();
        self.wait().await
    }

    /// Wait for the listener to stop on its own.
    pub async fn join(mut self) -> ListenerExit {
        self.wait().await
    }

    async fn wait(&mut self) -> ListenerExit {
        let Some(task) = self.task.take() else {
            return ListenerExit::Closed;
        };
        match task.await {
            Ok(exit) => exit,
            Err(e) => {
                warn!(error = %e, "listener task failed");
                ListenerExit::Closed
            }
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn listen(url: String, events: mpsc::Sender<SyncEvent>, cancel: CancellationToken) -> ListenerExit {
    let connect = tokio::select! {
        biased;
        _ = cancel.cancelled() => return ListenerExit::Closed,
        result = tokio_tungstenite::connect_async(url.as_str()) => result,
    };
    let mut stream = match connect {
        Ok((stream, _)) => stream,
        Err(e) => {
            warn!(%url, error = %e, "stream connection failed");
            return ListenerExit::Failed(e.into());
        }
    };
    info!(%url, "stream connected");

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                if let Err(e) = stream.close(None).await {
                    debug!(error = %e, "error while closing stream");
                }
                info!("stream closed");
                return ListenerExit::Closed;
            }
            frame = stream.next() => frame,
        };

        let text = match frame {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    debug!("discarding non-UTF-8 binary frame");
                    continue;
                }
            },
            Some(Ok(Message::Close(_))) | None => {
                info!("stream ended by server");
                return ListenerExit::Disconnected;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                warn!(error = %e, "stream failed");
                return ListenerExit::Failed(e.into());
            }
        };

        let patches = match parse_stream_message(&text) {
            Ok(patches) => patches,
            Err(e) => {
                debug!(error = %e, "discarding malformed message");
                continue;
            }
        };

        for patch in patches {
            if cancel.is_cancelled() {
                return ListenerExit::Closed;
            }
            if events.send(PatchEvent::now(patch).into()).await.is_err() {
                return ListenerExit::QueueClosed;
            }
        }
    }
}

/// Stream URL derived from the pull base URL: same host, `ws`/`wss` scheme.
pub fn derive_stream_url(base_url: &str) -> Result<String, SyncError> {
    let base = base_url.trim_end_matches('/');
    let rest = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(SyncError::Url(base_url.to_string()));
    };
    Ok(format!("{rest}/ws/simulation"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_stream_url() {
        assert_eq!(
            derive_stream_url("http://localhost:8000").unwrap(),
            "ws://localhost:8000/ws/simulation"
        );
        assert_eq!(
            derive_stream_url("https://solar.example.org/").unwrap(),
            "wss://solar.example.org/ws/simulation"
        );
        assert!(derive_stream_url("ftp://nope").is_err());
    }

    #[tokio::test]
    async fn test_connection_failure_is_reported_not_fatal() {
        let (tx, _rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        // nothing listens on port 9 on loopback
        let handle = ListenerHandle::spawn("ws://127.0.0.1:9/ws".into(), tx, &cancel);
        assert!(matches!(handle.join().await, ListenerExit::Failed(_)));
    }

    #[tokio::test]
    async fn test_close_before_connect() {
        let (tx, _rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let handle = ListenerHandle::spawn("ws://127.0.0.1:9/ws".into(), tx, &cancel);
        assert!(matches!(handle.close().await, ListenerExit::Closed));
    }
}
