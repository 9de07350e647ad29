//! Graceful shutdown coordination via `CancellationToken`.
//!
//! Long-lived tasks (HTTP listener, dispatcher) observe a child of the root
//! token and are tracked here so shutdown can wait for them to drain.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default time allowed for tracked tasks to finish.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(15);

/// How a graceful shutdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every tracked task finished in time.
    Drained,
    /// The timeout hit; remaining tasks were aborted.
    TimedOut,
}

/// Coordinates shutdown across server tasks.
#[derive(Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tasks: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
}

impl ShutdownCoordinator {
    /// Create a coordinator with no tracked tasks.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token cancelled when shutdown starts.
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Track a task so [`Self::graceful_shutdown`] waits for it.
    pub fn track(&self, name: &'static str, handle: JoinHandle<()>) {
        self.tasks.lock().push((name, handle));
    }

    /// Signal shutdown without waiting.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has started.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel, then wait up to `timeout` for tracked tasks, aborting stragglers.
    pub async fn graceful_shutdown(&self, timeout: Option<Duration>) -> ShutdownOutcome {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        self.shutdown();

        let tasks = std::mem::take(&mut *self.tasks.lock());
        let (names, handles): (Vec<&str>, Vec<_>) = tasks.into_iter().unzip();
        info!(tasks = ?names, timeout_ms = timeout.as_millis(), "shutting down");

        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        let drain = futures::future::join_all(handles);

        if tokio::time::timeout(timeout, drain).await.is_ok() {
            info!("shutdown complete");
            ShutdownOutcome::Drained
        } else {
            for (name, abort) in names.iter().zip(&aborts) {
                if !abort.is_finished() {
                    warn!(task = name, "task did not stop in time; aborting");
                    abort.abort();
                }
            }
            ShutdownOutcome::TimedOut
        }
    }
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("shutting_down", &self.is_shutting_down())
            .field("tasks", &self.tasks.lock().len())
            .finish()
    }
}
