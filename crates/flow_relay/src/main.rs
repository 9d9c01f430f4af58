use std::{collections::BTreeMap, net::SocketAddr, sync::Arc};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use shared::{
    domain::Collection,
    error::{ApiError, ErrorCode},
    protocol::{ApiEnvelope, AuthReply, ControlFrame, ControlSignal, FlowPush, TokenData},
};
use tokio::sync::{broadcast, RwLock};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod token;

use config::load_settings;
use token::{mint_token, verify_token, TokenConfig};

const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
struct AppState {
    tokens: TokenConfig,
    default_username: String,
    pushes: broadcast::Sender<FlowPush>,
    /// Listings served on the collection routes, replaced wholesale.
    catalog: Arc<RwLock<BTreeMap<Collection, Vec<Value>>>>,
}

impl AppState {
    fn new(tokens: TokenConfig, default_username: String, push_buffer: usize) -> Self {
        let (pushes, _) = broadcast::channel(push_buffer.max(1));
        Self {
            tokens,
            default_username,
            pushes,
            catalog: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    username: Option<String>,
}

type ApiFailure = (StatusCode, Json<ApiError>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok()))
        .init();

    let settings = load_settings();
    let state = AppState::new(
        TokenConfig {
            secret: settings.jwt_secret,
            ttl_minutes: settings.token_ttl_minutes,
        },
        settings.default_username,
        settings.push_buffer,
    );
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "flow relay listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// `RUST_LOG` when set and valid, `info` otherwise.
fn log_filter(rust_log: Option<String>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/healthz", get(healthz))
        .route("/socket_auth_token", get(socket_auth_token))
        .route("/ws", get(ws_handler))
        .route("/flow", post(push_flow))
        .route("/catalog/:collection", put(replace_catalog));
    for collection in Collection::ALL {
        router = router.route(
            collection.route(),
            get(move |State(state): State<Arc<AppState>>| list_collection(state, collection)),
        );
    }
    router
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn socket_auth_token(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TokenQuery>,
) -> Result<Json<ApiEnvelope<TokenData>>, (StatusCode, Json<ApiEnvelope<TokenData>>)> {
    let username = q
        .username
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| state.default_username.clone());
    let token = mint_token(&state.tokens, &username).map_err(|error| {
        warn!(%username, %error, "failed to mint socket auth token");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiEnvelope::error("could not issue a socket auth token")),
        )
    })?;
    debug!(%username, "issued socket auth token");
    Ok(Json(ApiEnvelope::ok(TokenData { token })))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

fn control(signal: ControlSignal) -> Message {
    Message::Text(serde_json::to_string(&ControlFrame::new(signal)).unwrap_or_default())
}

async fn ws_connection(state: Arc<AppState>, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();

    if sender.send(control(ControlSignal::AuthRequest)).await.is_err() {
        return;
    }
    let reply = loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => break text,
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
            Some(Ok(_)) => continue,
        }
    };
    let claims = serde_json::from_str::<AuthReply>(&reply)
        .ok()
        .and_then(|reply| verify_token(&state.tokens, &reply.auth_token).ok());
    let Some(claims) = claims else {
        warn!("flow socket presented an invalid auth token");
        let _ = sender.send(control(ControlSignal::AuthFailed)).await;
        let _ = sender.close().await;
        return;
    };

    // Subscribe before acknowledging so pushes sent right after AUTH OK are kept.
    let mut pushes = state.pushes.subscribe();
    if sender.send(control(ControlSignal::AuthOk)).await.is_err() {
        return;
    }
    let username = claims.username;
    info!(%username, "flow socket authenticated");

    let forward_user = username.clone();
    let send_task = tokio::spawn(async move {
        loop {
            let push = match pushes.recv().await {
                Ok(push) => push,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(username = %forward_user, skipped, "flow socket lagging; pushes dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if push.username != forward_user {
                continue;
            }
            let text = match serde_json::to_string(&push.message) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
    debug!(%username, "flow socket closed");
}

async fn push_flow(
    State(state): State<Arc<AppState>>,
    Json(push): Json<FlowPush>,
) -> Result<StatusCode, ApiFailure> {
    if push.username.trim().is_empty() || push.message.kind.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(
                ErrorCode::Validation,
                "username and actionType are required",
            )),
        ));
    }
    let kind = push.message.kind.clone();
    let username = push.username.clone();
    // No subscribers just means nobody is connected; the push is dropped.
    let sockets = state.pushes.send(push).unwrap_or(0);
    debug!(%username, %kind, sockets, "relayed flow push");
    Ok(StatusCode::ACCEPTED)
}

async fn list_collection(
    state: Arc<AppState>,
    collection: Collection,
) -> Json<ApiEnvelope<Vec<Value>>> {
    let items = state
        .catalog
        .read()
        .await
        .get(&collection)
        .cloned()
        .unwrap_or_default();
    Json(ApiEnvelope::success(items))
}

async fn replace_catalog(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<Collection>,
    Json(items): Json<Vec<Value>>,
) -> StatusCode {
    debug!(collection = collection.as_str(), count = items.len(), "replacing catalog listing");
    state.catalog.write().await.insert(collection, items);
    StatusCode::NO_CONTENT
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
