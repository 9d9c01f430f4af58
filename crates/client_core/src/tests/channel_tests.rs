use super::*;
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use shared::protocol::{ControlFrame, AUTH_FAILED, AUTH_OK, AUTH_REQUEST};
use tokio::{net::TcpListener, sync::Mutex, time::timeout};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct FlowServerState {
    /// Frames sent on the n-th connection. Every connection but the last is
    /// dropped after its frames are sent.
    script: Arc<Vec<Vec<String>>>,
    reject_auth: bool,
    token_fetches: Arc<Mutex<u32>>,
    tokens_seen: Arc<Mutex<Vec<String>>>,
    connections: Arc<Mutex<usize>>,
}

impl FlowServerState {
    fn new(script: Vec<Vec<String>>) -> Self {
        Self {
            script: Arc::new(script),
            reject_auth: false,
            token_fetches: Arc::new(Mutex::new(0)),
            tokens_seen: Arc::new(Mutex::new(Vec::new())),
            connections: Arc::new(Mutex::new(0)),
        }
    }
}

fn control(id: &str) -> String {
    serde_json::to_string(&ControlFrame { id: id.to_string() }).expect("control frame")
}

fn flow_frame(kind: &str, payload: serde_json::Value) -> String {
    json!({"actionType": kind, "payload": payload}).to_string()
}

async fn issue_token(State(state): State<FlowServerState>) -> Json<ApiEnvelope<TokenData>> {
    let mut fetches = state.token_fetches.lock().await;
    let token = format!("token-{}", *fetches);
    *fetches += 1;
    Json(ApiEnvelope::ok(TokenData { token }))
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<FlowServerState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_flow_socket(state, socket))
}

async fn serve_flow_socket(state: FlowServerState, mut socket: WebSocket) {
    let index = {
        let mut connections = state.connections.lock().await;
        let index = *connections;
        *connections += 1;
        index
    };

    if socket
        .send(WsMessage::Text(control(AUTH_REQUEST)))
        .await
        .is_err()
    {
        return;
    }
    let Some(Ok(WsMessage::Text(reply))) = socket.recv().await else {
        return;
    };
    let Ok(reply) = serde_json::from_str::<AuthReply>(&reply) else {
        return;
    };
    state.tokens_seen.lock().await.push(reply.auth_token);

    if state.reject_auth {
        let _ = socket.send(WsMessage::Text(control(AUTH_FAILED))).await;
        while let Some(Ok(_)) = socket.recv().await {}
        return;
    }
    if socket
        .send(WsMessage::Text(control(AUTH_OK)))
        .await
        .is_err()
    {
        return;
    }

    let frames = state.script.get(index).cloned().unwrap_or_default();
    for frame in frames {
        if socket.send(WsMessage::Text(frame)).await.is_err() {
            return;
        }
    }

    if index + 1 < state.script.len() {
        let _ = socket.close().await;
        return;
    }
    while let Some(Ok(_)) = socket.recv().await {}
}

async fn spawn_flow_server(state: FlowServerState) -> Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route("/socket_auth_token", get(issue_token))
        .route("/ws", get(upgrade))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

fn fast_config(server_url: String) -> ChannelConfig {
    let mut config = ChannelConfig::new(server_url);
    config.initial_backoff = Duration::from_millis(10);
    config.max_backoff = Duration::from_millis(50);
    config
}

fn connect(config: ChannelConfig) -> RealtimeChannel {
    let tokens = Arc::new(HttpTokenProvider::for_config(Client::new(), &config));
    RealtimeChannel::connect(config, tokens).expect("connect")
}

async fn next(channel: &mut RealtimeChannel) -> Option<ChannelMessage> {
    timeout(WAIT, channel.next_message())
        .await
        .expect("flow message in time")
}

#[test]
fn websocket_url_follows_http_scheme() {
    let config = ChannelConfig::new("http://localhost:4000");
    assert_eq!(config.websocket_url().expect("url"), "ws://localhost:4000/ws");

    let config = ChannelConfig::new("https://example.org/app/");
    assert_eq!(
        config.websocket_url().expect("url"),
        "wss://example.org/app/ws"
    );
    assert_eq!(
        config.token_url(),
        "https://example.org/app/socket_auth_token"
    );
}

#[test]
fn explicit_websocket_url_is_kept() {
    let mut config = ChannelConfig::new("http://localhost:4000");
    config.ws_url = Some("ws://localhost:64000/flow".into());
    assert_eq!(
        config.websocket_url().expect("url"),
        "ws://localhost:64000/flow"
    );
}

#[test]
fn rejects_unsupported_scheme() {
    let config = ChannelConfig::new("ftp://localhost");
    assert!(matches!(
        config.websocket_url(),
        Err(ChannelError::InvalidUrl { .. })
    ));
}

#[tokio::test]
async fn delivers_messages_in_send_order_after_auth_handshake() {
    let state = FlowServerState::new(vec![vec![
        flow_frame("progress", json!({"stage": "features", "pct": 50})),
        "not json at all".to_string(),
        flow_frame("unknown_x", json!({})),
    ]]);
    let server_url = spawn_flow_server(state.clone()).await.expect("server");
    let mut channel = connect(fast_config(server_url));

    let first = next(&mut channel).await.expect("first message");
    let second = next(&mut channel).await.expect("second message");
    assert_eq!(first.kind, "progress");
    assert_eq!(first.payload["pct"], 50);
    assert_eq!(second.kind, "unknown_x");

    assert_eq!(*state.tokens_seen.lock().await, vec!["token-0".to_string()]);
    assert_eq!(
        channel.connection_state().status,
        ConnectionStatus::Open
    );
}

#[tokio::test]
async fn reconnects_with_fresh_token_after_server_drop() {
    let state = FlowServerState::new(vec![
        vec![flow_frame("cesium/FETCH_PROJECTS", json!(null))],
        vec![flow_frame("cesium/FETCH_MODELS", json!(null))],
    ]);
    let server_url = spawn_flow_server(state.clone()).await.expect("server");
    let mut channel = connect(fast_config(server_url));

    assert_eq!(
        next(&mut channel).await.expect("first").kind,
        "cesium/FETCH_PROJECTS"
    );
    assert_eq!(
        next(&mut channel).await.expect("second").kind,
        "cesium/FETCH_MODELS"
    );
    assert_eq!(*state.token_fetches.lock().await, 2);
    assert_eq!(
        *state.tokens_seen.lock().await,
        vec!["token-0".to_string(), "token-1".to_string()]
    );
}

#[tokio::test]
async fn nothing_is_delivered_after_close() {
    let state = FlowServerState::new(vec![vec![
        flow_frame("progress", json!({"stage": "a", "pct": 1})),
        flow_frame("progress", json!({"stage": "b", "pct": 2})),
        flow_frame("progress", json!({"stage": "c", "pct": 3})),
    ]]);
    let server_url = spawn_flow_server(state).await.expect("server");
    let mut channel = connect(fast_config(server_url));

    assert!(next(&mut channel).await.is_some());
    tokio::time::sleep(Duration::from_millis(100)).await;
    channel.close();

    assert!(channel.is_closed());
    assert!(channel.next_message().await.is_none());
}

#[tokio::test]
async fn rejected_auth_retries_then_gives_up() {
    let mut state = FlowServerState::new(vec![Vec::new()]);
    state.reject_auth = true;
    let server_url = spawn_flow_server(state.clone()).await.expect("server");
    let mut config = fast_config(server_url);
    config.max_retries = Some(1);
    let mut channel = connect(config);

    assert!(next(&mut channel).await.is_none());
    assert_eq!(*state.token_fetches.lock().await, 2);
    assert_eq!(
        channel.connection_state(),
        ConnectionState {
            status: ConnectionStatus::Closed,
            retry_count: 2,
        }
    );
}

#[tokio::test]
async fn stream_view_yields_messages() {
    let state = FlowServerState::new(vec![vec![
        flow_frame("cesium/SPIN_LOGO", json!(null)),
        flow_frame("cesium/SPIN_LOGO", json!(null)),
    ]]);
    let server_url = spawn_flow_server(state).await.expect("server");
    let stream = connect(fast_config(server_url)).into_stream();

    let kinds: Vec<_> = timeout(WAIT, stream.take(2).map(|m| m.kind).collect::<Vec<_>>())
        .await
        .expect("stream in time");
    assert_eq!(kinds, vec!["cesium/SPIN_LOGO", "cesium/SPIN_LOGO"]);
}
