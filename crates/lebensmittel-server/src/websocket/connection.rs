//! Live connection state and the bounded write path.
//!
//! Every outbound frame for a connection goes through [`Connection`], which
//! bounds each write by `write_wait`. The underlying [`ConnectionSink`]
//! serializes writers, so the dispatcher, the keep-alive task, and echo
//! replies can share one socket.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures::SinkExt;
use futures::stream::SplitSink;
use lebensmittel_core::{ConnectionId, UserId};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A failed outbound write.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The write did not finish within the deadline.
    #[error("write timed out after {0:?}")]
    Timeout(Duration),
    /// The socket rejected the write.
    #[error("socket write failed: {0}")]
    Socket(String),
    /// The connection was already closed locally.
    #[error("connection closed")]
    Closed,
}

/// Write half of a client transport.
#[async_trait]
pub trait ConnectionSink: Send + Sync {
    /// Write one text frame.
    async fn send_text(&self, frame: Utf8Bytes) -> Result<(), TransportError>;
    /// Write a protocol ping.
    async fn send_ping(&self) -> Result<(), TransportError>;
    /// Send a close frame and shut the write half.
    async fn close(&self) -> Result<(), TransportError>;
}

/// [`ConnectionSink`] over the write half of an axum WebSocket.
pub struct WsSink {
    inner: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsSink {
    /// Wrap a split write half.
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            inner: Mutex::new(sink),
        }
    }

    async fn send(&self, message: Message) -> Result<(), TransportError> {
        self.inner
            .lock()
            .await
            .send(message)
            .await
            .map_err(|e| TransportError::Socket(e.to_string()))
    }
}

#[async_trait]
impl ConnectionSink for WsSink {
    async fn send_text(&self, frame: Utf8Bytes) -> Result<(), TransportError> {
        self.send(Message::Text(frame)).await
    }

    async fn send_ping(&self) -> Result<(), TransportError> {
        self.send(Message::Ping(vec![].into())).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.inner
            .lock()
            .await
            .close()
            .await
            .map_err(|e| TransportError::Socket(e.to_string()))
    }
}

/// A registered client connection.
pub struct Connection {
    /// Connection handle.
    pub id: ConnectionId,
    /// Authenticated owner.
    pub user_id: UserId,
    /// When the connection was accepted.
    pub connected_at: Instant,
    sink: Arc<dyn ConnectionSink>,
    write_wait: Duration,
    closed: CancellationToken,
}

impl Connection {
    /// Create a connection writing through `sink`.
    pub fn new(
        id: ConnectionId,
        user_id: UserId,
        sink: Arc<dyn ConnectionSink>,
        write_wait: Duration,
    ) -> Self {
        Self {
            id,
            user_id,
            connected_at: Instant::now(),
            sink,
            write_wait,
            closed: CancellationToken::new(),
        }
    }

    /// Write one text frame within `write_wait`.
    pub async fn send_text(&self, frame: Utf8Bytes) -> Result<(), TransportError> {
        self.bounded(self.sink.send_text(frame)).await
    }

    /// Write a ping within `write_wait`.
    pub async fn ping(&self) -> Result<(), TransportError> {
        self.bounded(self.sink.send_ping()).await
    }

    /// Close the transport. Idempotent; later writes fail with [`TransportError::Closed`].
    pub async fn close(&self) {
        if self.closed.is_cancelled() {
            return;
        }
        self.closed.cancel();
        let result = tokio::time::timeout(self.write_wait, self.sink.close()).await;
        debug!(conn_id = %self.id, ?result, "transport closed");
    }

    /// Whether [`Self::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the connection is closed locally.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// How long the connection has been open.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    async fn bounded<F>(&self, write: F) -> Result<(), TransportError>
    where
        F: Future<Output = Result<(), TransportError>>,
    {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        tokio::time::timeout(self.write_wait, write)
            .await
            .map_err(|_| TransportError::Timeout(self.write_wait))?
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
