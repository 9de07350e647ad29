//! Server-initiated keep-alive pings.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, warn};

use super::connection::Connection;

/// Why the keep-alive loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveResult {
    /// A ping failed or timed out; the connection has been closed.
    PingFailed,
    /// The connection was closed elsewhere.
    Closed,
}

/// Ping `connection` every `period` until a ping fails or it is closed.
///
/// The first ping goes out one full period after start. A failed ping closes
/// the connection, which in turn ends the session's read loop.
pub async fn run_keepalive(connection: Arc<Connection>, period: Duration) -> KeepaliveResult {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = connection.closed() => return KeepaliveResult::Closed,
            _ = ticker.tick() => {
                if let Err(error) = connection.ping().await {
                    warn!(conn_id = %connection.id, %error, "keep-alive ping failed");
                    connection.close().await;
                    return KeepaliveResult::PingFailed;
                }
                debug!(conn_id = %connection.id, "ping sent");
            }
        }
    }
}
