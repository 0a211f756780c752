use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use glyphmatch_server::build_app;
use glyphmatch_server::config::ServerConfig;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _server: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(config);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _server: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/api/game-connection", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Send an `invoke` envelope with the given command and positional args.
pub async fn invoke(stream: &mut WsStream, command: &str, args: Vec<Value>) {
    let mut all = vec![json!(command)];
    all.extend(args);
    let frame = json!({ "message": "invoke", "args": all }).to_string();
    stream.send(Message::Text(frame.into())).await.unwrap();
}

/// Player payload the way the browser sends it: a JSON-encoded string.
pub fn player_json(id: &str, username: &str) -> Value {
    Value::String(json!({ "id": id, "username": username }).to_string())
}

/// Rules payload the way the browser sends it: a JSON-encoded string.
pub fn rules_json(max_players: u32, card_count: u32) -> Value {
    Value::String(json!({ "maxPlayers": max_players, "cardCount": card_count }).to_string())
}

/// Read the next text frame (5s timeout).
pub async fn read_frame(stream: &mut WsStream) -> String {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(t))) => return t.to_string(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket frame")
}

/// Read frames until a `WebSocketResponse` envelope arrives; returns its
/// payload. Bare signal frames are skipped.
pub async fn read_response(stream: &mut WsStream) -> Value {
    loop {
        let frame = read_frame(stream).await;
        if !frame.starts_with('{') {
            continue;
        }
        let envelope: Value = serde_json::from_str(&frame).unwrap();
        if envelope["message"] == "WebSocketResponse" {
            return envelope["args"][0].clone();
        }
    }
}

/// Read frames until a bare signal arrives; returns it. Envelopes are
/// skipped.
pub async fn read_signal(stream: &mut WsStream) -> String {
    loop {
        let frame = read_frame(stream).await;
        if !frame.starts_with('{') {
            return frame;
        }
    }
}

/// Read until the expected signal arrives, skipping envelopes and earlier
/// signals (joins leave `Update` frames queued on every group member).
pub async fn await_signal(stream: &mut WsStream, expected: &str) {
    loop {
        if read_signal(stream).await == expected {
            return;
        }
    }
}

/// Create a room and return its id.
pub async fn create_room(
    stream: &mut WsStream,
    player_id: &str,
    username: &str,
    rules: Value,
    room_id: Option<&str>,
) -> String {
    invoke(
        stream,
        "CreateRoom",
        vec![
            player_json(player_id, username),
            rules,
            room_id.map_or(Value::Null, |id| json!(id)),
        ],
    )
    .await;
    let response = read_response(stream).await;
    response["roomId"]
        .as_str()
        .unwrap_or_else(|| panic!("Expected roomId, got: {response}"))
        .to_string()
}

/// Join a room; panics if the reply is not a room code.
pub async fn join_room(stream: &mut WsStream, player_id: &str, username: &str, room_id: &str) {
    invoke(
        stream,
        "JoinRoom",
        vec![player_json(player_id, username), json!(room_id)],
    )
    .await;
    let response = read_response(stream).await;
    assert_eq!(
        response["roomId"].as_str(),
        Some(room_id),
        "Expected join confirmation, got: {response}"
    );
}

/// Fetch the REST snapshot of a room.
pub async fn fetch_snapshot(base_url: &str, room_id: &str) -> Value {
    let response = reqwest::get(format!("{base_url}/api/room/{room_id}"))
        .await
        .unwrap();
    assert!(
        response.status().is_success(),
        "Snapshot request failed: {}",
        response.status()
    );
    response.json().await.unwrap()
}

/// Poll the REST snapshot until the predicate holds, up to 2s. Used after
/// socket closes, which the server processes asynchronously.
pub async fn wait_for_snapshot(
    base_url: &str,
    room_id: &str,
    predicate: impl Fn(&Value) -> bool,
) -> Value {
    for _ in 0..100 {
        let response = reqwest::get(format!("{base_url}/api/room/{room_id}"))
            .await
            .unwrap();
        if response.status().is_success() {
            let snapshot: Value = response.json().await.unwrap();
            if predicate(&snapshot) {
                return snapshot;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("Snapshot for {room_id} never matched predicate");
}

/// Poll until the room is gone from the registry, up to 2s.
pub async fn wait_for_room_gone(base_url: &str, room_id: &str) {
    for _ in 0..100 {
        let response = reqwest::get(format!("{base_url}/api/room/{room_id}"))
            .await
            .unwrap();
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("Room {room_id} was never removed");
}
