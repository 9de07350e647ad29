//! WebSocket session lifecycle: one connected client from upgrade through
//! disconnect.

use std::collections::HashSet;
use std::ops::ControlFlow;
use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use futures::stream::SplitStream;
use lebensmittel_core::{ConnectionId, GroupId, UserId};
use lebensmittel_store::MembershipQuery;
use metrics::{counter, gauge, histogram};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::connection::{Connection, WsSink};
use super::dispatcher::DispatcherHandle;
use super::heartbeat::run_keepalive;
use super::protocol::{self, ECHO_EVENT, Inbound};
use crate::auth;
use crate::errors::ApiError;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};
use crate::server::AppState;

/// Query string accepted by `/ws`.
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// Access token; wins over the `Authorization` header when non-empty.
    pub token: Option<String>,
    /// Comma-separated group ids to join at connect time.
    pub groups: Option<String>,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The client sent a close frame.
    ClientClosed,
    /// The read half ended without a close frame.
    StreamEnded,
    /// Reading failed, including oversized frames.
    ReadError,
    /// Nothing arrived within `pong_wait`.
    IdleTimeout,
    /// The server closed the connection: failed delivery, failed ping, or shutdown.
    ServerClosed,
    /// An echo reply could not be written.
    EchoFailed,
}

impl DisconnectReason {
    /// Metric label value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientClosed => "client_closed",
            Self::StreamEnded => "stream_ended",
            Self::ReadError => "read_error",
            Self::IdleTimeout => "idle_timeout",
            Self::ServerClosed => "server_closed",
            Self::EchoFailed => "echo_failed",
        }
    }
}

/// `GET /ws`: authenticate, then upgrade.
///
/// Credentials are checked before the upgrade so a rejected client gets a
/// plain `401` with a JSON body instead of a socket.
pub async fn ws_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let Some(token) = auth::extract_credential(query.token.as_deref(), authorization) else {
        return ApiError::unauthorized("Missing token").into_response();
    };
    let user = match state.auth.validate(token) {
        Ok(user) => user,
        Err(error) => {
            debug!(%error, "websocket credential rejected");
            return ApiError::unauthorized("Invalid token").into_response();
        }
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let requested = protocol::parse_group_list(query.groups.as_deref());
    let max_message_bytes = state.realtime.max_message_bytes;
    ws.max_message_size(max_message_bytes)
        .on_upgrade(move |socket| run_session(socket, ConnectionId::generate(), user, requested, state))
}

/// Drive one upgraded socket until it disconnects.
#[instrument(skip_all, fields(conn_id = %conn_id, user_id = %user))]
async fn run_session(
    socket: WebSocket,
    conn_id: ConnectionId,
    user: UserId,
    requested: Vec<GroupId>,
    state: AppState,
) {
    let (sink, mut stream) = socket.split();
    let connection = Arc::new(Connection::new(
        conn_id.clone(),
        user.clone(),
        Arc::new(WsSink::new(sink)),
        state.realtime.write_wait,
    ));

    let initial = authorized_subset(state.membership.as_ref(), &user, requested).await;
    info!(groups = ?initial, "client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let reason = if state
        .dispatcher
        .register(connection.clone(), initial)
        .await
        .is_err()
    {
        warn!("dispatcher stopped, refusing connection");
        DisconnectReason::ServerClosed
    } else {
        let keepalive = tokio::spawn(run_keepalive(
            connection.clone(),
            state.realtime.ping_period,
        ));
        let reason = read_loop(&mut stream, &connection, &state).await;
        keepalive.abort();
        reason
    };

    if state.dispatcher.unregister(conn_id).await.is_err() {
        connection.close().await;
    }

    let age = connection.age();
    info!(reason = reason.as_str(), age_secs = age.as_secs(), "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL, "reason" => reason.as_str()).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(age.as_secs_f64());
}

async fn read_loop(
    stream: &mut SplitStream<WebSocket>,
    connection: &Arc<Connection>,
    state: &AppState,
) -> DisconnectReason {
    loop {
        let next = tokio::select! {
            () = connection.closed() => return DisconnectReason::ServerClosed,
            next = tokio::time::timeout(state.realtime.pong_wait, stream.next()) => next,
        };
        let message = match next {
            Err(_) => return DisconnectReason::IdleTimeout,
            Ok(None) => return DisconnectReason::StreamEnded,
            Ok(Some(Err(error))) => {
                debug!(%error, "websocket read failed");
                return DisconnectReason::ReadError;
            }
            Ok(Some(Ok(message))) => message,
        };

        match message {
            Message::Text(text) => {
                let flow = handle_text(
                    text.as_str(),
                    connection,
                    &state.dispatcher,
                    state.membership.as_ref(),
                )
                .await;
                if let ControlFlow::Break(reason) = flow {
                    return reason;
                }
            }
            Message::Close(_) => return DisconnectReason::ClientClosed,
            Message::Binary(data) => debug!(len = data.len(), "binary frame ignored"),
            // any inbound frame, pongs included, already reset the idle timer
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
}

/// Act on one inbound text frame. Breaks with the reason when the session should end.
async fn handle_text(
    text: &str,
    connection: &Connection,
    dispatcher: &DispatcherHandle,
    membership: &dyn MembershipQuery,
) -> ControlFlow<DisconnectReason> {
    let inbound = match protocol::decode(text) {
        Ok(Some(inbound)) => inbound,
        Ok(None) => return ControlFlow::Continue(()),
        Err(error) => {
            debug!(%error, "undecodable frame ignored");
            return ControlFlow::Continue(());
        }
    };

    match inbound {
        Inbound::Subscribe { groups } => {
            let allowed = authorized_subset(membership, &connection.user_id, groups).await;
            if allowed.is_empty() {
                debug!("subscribe named no authorized groups");
            } else {
                info!(groups = ?allowed, "subscribed");
                if dispatcher
                    .subscribe(connection.id.clone(), allowed)
                    .await
                    .is_err()
                {
                    connection.close().await;
                    return ControlFlow::Break(DisconnectReason::ServerClosed);
                }
            }
        }
        Inbound::Echo(data) => match protocol::encode(ECHO_EVENT, &data) {
            Ok(frame) => {
                if let Err(error) = connection.send_text(frame).await {
                    warn!(%error, "echo reply failed");
                    return ControlFlow::Break(DisconnectReason::EchoFailed);
                }
            }
            Err(error) => warn!(%error, "echo payload not serializable"),
        },
        Inbound::Unknown(event) => debug!(event = %event, "unknown event ignored"),
    }
    ControlFlow::Continue(())
}

/// The requested groups `user` is currently a member of, in request order
/// without repeats.
///
/// A failed membership lookup authorizes nothing.
pub async fn authorized_subset(
    membership: &dyn MembershipQuery,
    user: &UserId,
    requested: Vec<GroupId>,
) -> Vec<GroupId> {
    if requested.is_empty() {
        return Vec::new();
    }
    let member_of: HashSet<GroupId> = match membership.user_groups(user).await {
        Ok(groups) => groups.into_iter().collect(),
        Err(error) => {
            warn!(user_id = %user, %error, "membership lookup failed");
            return Vec::new();
        }
    };
    let mut seen = HashSet::new();
    requested
        .into_iter()
        .filter(|group| member_of.contains(group) && seen.insert(group.clone()))
        .collect()
}
