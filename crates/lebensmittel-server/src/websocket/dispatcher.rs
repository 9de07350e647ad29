//! Single-writer event dispatcher.
//!
//! One task owns the [`Registry`] and processes every lifecycle command and
//! broadcast from a bounded intake queue in arrival order. Producers hold a
//! cloneable [`DispatcherHandle`]; [`DispatcherHandle::emit`] never waits.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::extract::ws::Utf8Bytes;
use futures::future::join_all;
use lebensmittel_core::{ConnectionId, GroupId};
use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connection::Connection;
use super::protocol;
use super::registry::Registry;
use crate::config::RealtimeConfig;
use crate::metrics::{
    REALTIME_DELIVERIES_FAILED_TOTAL, REALTIME_EVENTS_DROPPED_TOTAL, REALTIME_EVENTS_EMITTED_TOTAL,
};

/// The dispatcher task is no longer accepting commands.
#[derive(Debug, Error)]
#[error("dispatcher stopped")]
pub struct DispatcherStopped;

/// Point-in-time view of the registry.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Registered connections.
    pub connections: usize,
    /// Subscriber count per non-empty group.
    pub groups: BTreeMap<GroupId, usize>,
}

enum Command {
    Register {
        connection: Arc<Connection>,
        groups: Vec<GroupId>,
    },
    Subscribe {
        id: ConnectionId,
        groups: Vec<GroupId>,
    },
    Unregister {
        id: ConnectionId,
    },
    Broadcast {
        event: String,
        frame: Utf8Bytes,
        groups: Vec<GroupId>,
    },
    Snapshot(oneshot::Sender<Snapshot>),
}

/// Cloneable submission side of the dispatcher.
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<Command>,
    dropped: Arc<AtomicU64>,
    cancel: CancellationToken,
}

/// Owner of the registry; lives inside the spawned task.
pub struct Dispatcher {
    rx: mpsc::Receiver<Command>,
    registry: Registry,
    cancel: CancellationToken,
}

impl Dispatcher {
    /// Spawn the dispatcher task.
    ///
    /// The task runs until `cancel` fires or [`DispatcherHandle::stop`] is
    /// called, then closes every registered transport.
    pub fn start(
        config: &RealtimeConfig,
        cancel: CancellationToken,
    ) -> (DispatcherHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.intake_capacity.max(1));
        let handle = DispatcherHandle {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
            cancel: cancel.clone(),
        };
        let dispatcher = Self {
            rx,
            registry: Registry::new(),
            cancel,
        };
        let task = tokio::spawn(dispatcher.run());
        (handle, task)
    }

    async fn run(mut self) {
        info!(capacity = self.rx.max_capacity(), "dispatcher started");
        loop {
            let command = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                command = self.rx.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };
            self.handle(command).await;
        }
        self.rx.close();

        // connections still waiting in the queue were never registered
        let mut pending = Vec::new();
        while let Ok(command) = self.rx.try_recv() {
            if let Command::Register { connection, .. } = command {
                pending.push(connection);
            }
        }
        let clients = self.registry.drain();
        let count = clients.len() + pending.len();
        let _ = join_all(
            clients
                .iter()
                .map(|client| &client.connection)
                .chain(&pending)
                .map(|connection| connection.close()),
        )
        .await;
        info!(closed = count, "dispatcher stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Register { connection, groups } => self.register(connection, groups).await,
            Command::Subscribe { id, groups } => {
                if self.registry.subscribe(&id, groups.iter().cloned()) {
                    debug!(conn_id = %id, ?groups, "subscribed");
                } else {
                    debug!(conn_id = %id, "subscribe for unknown connection ignored");
                }
            }
            Command::Unregister { id } => self.unregister(&id),
            Command::Broadcast {
                event,
                frame,
                groups,
            } => self.broadcast(&event, &frame, &groups).await,
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    async fn register(&mut self, connection: Arc<Connection>, groups: Vec<GroupId>) {
        let id = connection.id.clone();
        if !self.registry.register(connection.clone(), groups.iter().cloned()) {
            warn!(conn_id = %id, "connection already registered");
            return;
        }
        debug!(conn_id = %id, user_id = %connection.user_id, ?groups, "registered");

        if let Err(error) = connection.send_text(protocol::welcome_frame()).await {
            warn!(conn_id = %id, %error, "welcome write failed");
            self.unregister(&id);
        }
    }

    fn unregister(&mut self, id: &ConnectionId) {
        let Some(client) = self.registry.unregister(id) else {
            return;
        };
        debug!(conn_id = %id, groups = client.groups.len(), "unregistered");
        let connection = client.connection;
        drop(tokio::spawn(async move { connection.close().await }));
    }

    async fn broadcast(&mut self, event: &str, frame: &Utf8Bytes, groups: &[GroupId]) {
        let targets = self.registry.resolve(groups);
        if targets.is_empty() {
            debug!(event, ?groups, "no recipients");
            return;
        }

        let results = join_all(targets.iter().map(|connection| {
            let frame = frame.clone();
            async move { (connection, connection.send_text(frame).await) }
        }))
        .await;

        let mut failed = Vec::new();
        for (connection, result) in results {
            if let Err(error) = result {
                warn!(event, conn_id = %connection.id, %error, "delivery failed");
                counter!(REALTIME_DELIVERIES_FAILED_TOTAL).increment(1);
                failed.push(connection.id.clone());
            }
        }
        debug!(
            event,
            recipients = targets.len(),
            failed = failed.len(),
            "event delivered"
        );
        for id in &failed {
            self.unregister(id);
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            connections: self.registry.connection_count(),
            groups: self.registry.group_members(),
        }
    }
}

impl DispatcherHandle {
    /// Queue an event for the listed groups, or for everyone when `groups` is empty.
    ///
    /// The envelope is serialized once here. Never blocks: when the intake is
    /// full or the dispatcher has stopped the event is dropped and counted.
    pub fn emit<T: Serialize + ?Sized>(&self, event: &str, data: &T, groups: &[GroupId]) {
        let frame = match protocol::encode(event, data) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(event, %error, "failed to serialize event");
                return;
            }
        };
        let command = Command::Broadcast {
            event: event.to_owned(),
            frame,
            groups: groups.to_vec(),
        };
        match self.tx.try_send(command) {
            Ok(()) => counter!(REALTIME_EVENTS_EMITTED_TOTAL).increment(1),
            Err(error) => {
                let reason = match error {
                    mpsc::error::TrySendError::Full(_) => "full",
                    mpsc::error::TrySendError::Closed(_) => "closed",
                };
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                counter!(REALTIME_EVENTS_DROPPED_TOTAL, "reason" => reason).increment(1);
                warn!(event, reason, dropped_total = total, "event dropped at intake");
            }
        }
    }

    /// Register a connection with its initial groups and send the welcome frame.
    pub async fn register(
        &self,
        connection: Arc<Connection>,
        groups: Vec<GroupId>,
    ) -> Result<(), DispatcherStopped> {
        self.send(Command::Register { connection, groups }).await
    }

    /// Add already-authorized groups to a registered connection.
    pub async fn subscribe(
        &self,
        id: ConnectionId,
        groups: Vec<GroupId>,
    ) -> Result<(), DispatcherStopped> {
        self.send(Command::Subscribe { id, groups }).await
    }

    /// Remove a connection and close its transport. Idempotent.
    pub async fn unregister(&self, id: ConnectionId) -> Result<(), DispatcherStopped> {
        self.send(Command::Unregister { id }).await
    }

    /// Registry state after every previously queued command has been processed.
    pub async fn snapshot(&self) -> Result<Snapshot, DispatcherStopped> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot(reply)).await?;
        rx.await.map_err(|_| DispatcherStopped)
    }

    /// Like [`snapshot`](Self::snapshot), but gives up instead of waiting.
    ///
    /// Returns `None` when the intake is full, the dispatcher has stopped, or
    /// no reply arrives within `wait`.
    pub async fn snapshot_within(&self, wait: Duration) -> Option<Snapshot> {
        let (reply, rx) = oneshot::channel();
        if let Err(error) = self.tx.try_send(Command::Snapshot(reply)) {
            let full = matches!(error, mpsc::error::TrySendError::Full(_));
            debug!(full, "snapshot not queued");
            return None;
        }
        match tokio::time::timeout(wait, rx).await {
            Ok(Ok(snapshot)) => Some(snapshot),
            Ok(Err(_)) => None,
            Err(_) => {
                warn!(?wait, "snapshot timed out");
                None
            }
        }
    }

    /// Handle whose intake is never drained, for exercising backpressure.
    #[cfg(test)]
    pub(crate) fn stalled(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        drop(tokio::spawn(async move {
            let _rx = rx;
            std::future::pending::<()>().await;
        }));
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
            cancel: CancellationToken::new(),
        }
    }

    /// Events dropped at submission since start.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Ask the dispatcher task to stop.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    async fn send(&self, command: Command) -> Result<(), DispatcherStopped> {
        self.tx.send(command).await.map_err(|_| DispatcherStopped)
    }
}

impl std::fmt::Debug for DispatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherHandle")
            .field("dropped", &self.dropped_events())
            .field("stopped", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
