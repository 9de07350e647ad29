//! End-to-end tests against a listening server with real WebSocket and HTTP clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use lebensmittel_core::{GroupId, UserId};
use lebensmittel_server::auth::{Claims, TokenKind, encode};
use lebensmittel_server::{JwtValidator, LebensmittelServer, ServerConfig};
use lebensmittel_store::Store;
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{self, Message};

const SECRET: &str = "integration-secret";
const TIMEOUT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(300);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

struct TestServer {
    server: LebensmittelServer,
    addr: SocketAddr,
    store: Store,
}

impl TestServer {
    async fn boot() -> Self {
        let store = Store::in_memory().unwrap();
        let server = LebensmittelServer::new(
            ServerConfig::default(),
            store.clone(),
            Arc::new(JwtValidator::new(SECRET, 0)),
        );
        let addr = server.listen().await.unwrap();
        Self {
            server,
            addr,
            store,
        }
    }

    fn ws_url(&self, query: &str) -> String {
        format!("ws://{}/ws?{query}", self.addr)
    }

    async fn group(&self, name: &str, members: &[&str]) -> GroupId {
        let group = self
            .store
            .create_group(name.into(), &UserId::from(members[0]))
            .await
            .unwrap();
        for member in &members[1..] {
            let _ = self
                .store
                .add_member(&UserId::from(*member), &group.id)
                .await
                .unwrap();
        }
        group.id
    }

    /// Connect as `user` and consume the welcome frame.
    async fn connect(&self, user: &str, groups: &[&GroupId]) -> WsStream {
        let groups: Vec<String> = groups.iter().map(ToString::to_string).collect();
        let url = self.ws_url(&format!(
            "token={}&groups={}",
            token(user, TokenKind::Access),
            groups.join(",")
        ));
        let (mut ws, _) = connect_async(url).await.unwrap();
        let welcome = next_event(&mut ws).await;
        assert_eq!(welcome["event"], "connected");
        ws
    }

    /// Wait until the dispatcher has `count` subscribers in `group`.
    async fn await_members(&self, group: &GroupId, count: usize) {
        timeout(TIMEOUT, async {
            loop {
                let snapshot = self.server.dispatcher().snapshot().await.unwrap();
                if snapshot.groups.get(group).copied().unwrap_or(0) == count {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }
}

fn token(user: &str, kind: TokenKind) -> String {
    let exp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
        + 3600;
    encode(
        SECRET,
        &Claims {
            user_id: UserId::from(user),
            kind,
            exp,
        },
    )
    .unwrap()
}

/// Next text frame as JSON, skipping control frames.
async fn next_event(ws: &mut WsStream) -> Value {
    timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(text.as_str()).unwrap(),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                other => panic!("expected a text frame, got {other:?}"),
            }
        }
    })
    .await
    .expect("timed out waiting for an event")
}

async fn assert_silent(ws: &mut WsStream) {
    if let Ok(Some(Ok(Message::Text(text)))) = timeout(QUIET, ws.next()).await {
        panic!("unexpected frame: {}", text.as_str());
    }
}

async fn send(ws: &mut WsStream, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

fn rejected_status(error: tungstenite::Error) -> u16 {
    match error {
        tungstenite::Error::Http(response) => response.status().as_u16(),
        other => panic!("expected an HTTP rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn welcome_frame_on_connect() {
    let t = TestServer::boot().await;
    let url = t.ws_url(&format!("token={}", token("alice", TokenKind::Access)));
    let (mut ws, _) = connect_async(url).await.unwrap();
    assert_eq!(
        next_event(&mut ws).await,
        json!({"event": "connected", "data": {"message": "Connected to Lebensmittel backend"}})
    );
}

#[tokio::test]
async fn missing_or_invalid_token_is_401() {
    let t = TestServer::boot().await;

    let error = connect_async(t.ws_url("groups=g1")).await.unwrap_err();
    assert_eq!(rejected_status(error), 401);

    let error = connect_async(t.ws_url("token=garbage")).await.unwrap_err();
    assert_eq!(rejected_status(error), 401);

    let refresh = token("alice", TokenKind::Refresh);
    let error = connect_async(t.ws_url(&format!("token={refresh}")))
        .await
        .unwrap_err();
    assert_eq!(rejected_status(error), 401);
}

#[tokio::test]
async fn authorization_header_is_accepted() {
    let t = TestServer::boot().await;
    let mut request = t.ws_url("").into_client_request().unwrap();
    let _ = request.headers_mut().insert(
        "authorization",
        format!("BEARER {}", token("alice", TokenKind::Access))
            .parse()
            .unwrap(),
    );
    let (mut ws, _) = connect_async(request).await.unwrap();
    assert_eq!(next_event(&mut ws).await["event"], "connected");
}

#[tokio::test]
async fn multi_group_emit_is_deduplicated() {
    let t = TestServer::boot().await;
    let g1 = t.group("Home", &["alice"]).await;
    let g2 = t.group("Work", &["alice"]).await;

    let mut c1 = t.connect("alice", &[&g1, &g2]).await;
    let mut c2 = t.connect("alice", &[&g2]).await;

    let dispatcher = t.server.dispatcher();
    dispatcher.emit("receipt_created", &json!({"id": "r1"}), &[g1.clone(), g2.clone()]);
    assert_eq!(
        next_event(&mut c1).await,
        json!({"event": "receipt_created", "data": {"id": "r1"}})
    );
    assert_eq!(next_event(&mut c2).await["event"], "receipt_created");

    dispatcher.emit("meal_plan_created", &json!({"id": "m1"}), &[g1.clone()]);
    assert_eq!(next_event(&mut c1).await["event"], "meal_plan_created");
    assert_silent(&mut c1).await;
    assert_silent(&mut c2).await;
}

#[tokio::test]
async fn connect_time_groups_are_filtered_by_membership() {
    let t = TestServer::boot().await;
    let mine = t.group("Mine", &["alice"]).await;
    let theirs = t.group("Theirs", &["bob"]).await;

    let mut ws = t.connect("alice", &[&mine, &theirs]).await;
    let snapshot = t.server.dispatcher().snapshot().await.unwrap();
    assert_eq!(snapshot.groups.get(&mine), Some(&1));
    assert!(!snapshot.groups.contains_key(&theirs));

    t.server
        .dispatcher()
        .emit("grocery_item_created", &json!({"id": "x"}), &[theirs]);
    assert_silent(&mut ws).await;
}

#[tokio::test]
async fn subscribe_adds_only_member_groups() {
    let t = TestServer::boot().await;
    let g1 = t.group("Home", &["alice"]).await;
    let foreign = t.group("Elsewhere", &["bob"]).await;

    let mut ws = t.connect("alice", &[]).await;
    send(
        &mut ws,
        json!({"event": "subscribe", "data": {"groups": [g1.as_str(), foreign.as_str(), 42]}}),
    )
    .await;
    t.await_members(&g1, 1).await;

    let dispatcher = t.server.dispatcher();
    dispatcher.emit("receipt_deleted", &json!({"id": "secret"}), &[foreign]);
    dispatcher.emit("receipt_deleted", &json!({"id": "r9"}), &[g1]);
    assert_eq!(next_event(&mut ws).await["data"]["id"], "r9");
}

#[tokio::test]
async fn echo_replies_to_sender_only() {
    let t = TestServer::boot().await;
    let g1 = t.group("Home", &["alice", "bob"]).await;
    let mut alice = t.connect("alice", &[&g1]).await;
    let mut bob = t.connect("bob", &[&g1]).await;

    send(&mut alice, json!({"event": "echo", "data": {"hello": [1, 2]}})).await;
    assert_eq!(
        next_event(&mut alice).await,
        json!({"event": "echo", "data": {"hello": [1, 2]}})
    );
    assert_silent(&mut bob).await;
}

#[tokio::test]
async fn junk_frames_keep_the_session_alive() {
    let t = TestServer::boot().await;
    let mut ws = t.connect("alice", &[]).await;

    ws.send(Message::Text("not json".into())).await.unwrap();
    send(&mut ws, json!({"event": "dance"})).await;
    ws.send(Message::Binary(vec![1, 2, 3].into())).await.unwrap();
    send(&mut ws, json!({"event": "echo", "data": "still here"})).await;
    assert_eq!(next_event(&mut ws).await["data"], "still here");
}

#[tokio::test]
async fn events_arrive_in_emission_order() {
    let t = TestServer::boot().await;
    let g1 = t.group("Home", &["alice"]).await;
    let mut ws = t.connect("alice", &[&g1]).await;

    for n in 0..20 {
        t.server
            .dispatcher()
            .emit("grocery_item_updated", &json!({"n": n}), &[g1.clone()]);
    }
    for n in 0..20 {
        assert_eq!(next_event(&mut ws).await["data"]["n"], n);
    }
}

#[tokio::test]
async fn rest_mutation_reaches_group_subscribers() {
    let t = TestServer::boot().await;
    let home = t.group("Home", &["alice", "bob"]).await;
    let other = t.group("Other", &["carol"]).await;
    let mut bob = t.connect("bob", &[&home]).await;
    let mut carol = t.connect("carol", &[&other]).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/grocery-items", t.addr))
        .bearer_auth(token("alice", TokenKind::Access))
        .header("x-group-id", home.as_str())
        .json(&json!({"name": "Milk", "category": "Dairy"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let item: Value = response.json().await.unwrap();

    let event = next_event(&mut bob).await;
    assert_eq!(event["event"], "grocery_item_created");
    assert_eq!(event["data"], item);
    assert_silent(&mut carol).await;
}

#[tokio::test]
async fn disconnect_removes_subscriptions() {
    let t = TestServer::boot().await;
    let g1 = t.group("Home", &["alice"]).await;
    let mut ws = t.connect("alice", &[&g1]).await;
    t.await_members(&g1, 1).await;

    ws.close(None).await.unwrap();
    t.await_members(&g1, 0).await;
    let snapshot = t.server.dispatcher().snapshot().await.unwrap();
    assert_eq!(snapshot.connections, 0);
}

#[tokio::test]
async fn shutdown_closes_live_sockets() {
    let t = TestServer::boot().await;
    let mut ws = t.connect("alice", &[]).await;

    let _ = t
        .server
        .shutdown()
        .graceful_shutdown(Some(Duration::from_secs(5)))
        .await;

    let end = timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                other => return other,
            }
        }
    })
    .await
    .unwrap();
    assert!(!matches!(end, Some(Ok(Message::Text(_)))), "{end:?}");
}

#[tokio::test]
async fn health_reports_live_connections() {
    let t = TestServer::boot().await;
    let g1 = t.group("Home", &["alice"]).await;
    let _ws = t.connect("alice", &[&g1]).await;

    let health: Value = reqwest::get(format!("http://{}/health", t.addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["connections"], 1);
    assert_eq!(health["groups"], 1);
}
