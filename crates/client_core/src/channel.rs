//! Persistent flow connection: token fetch, auth handshake, reconnect.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{SinkExt, Stream, StreamExt};
use reqwest::Client;
use shared::protocol::{
    ApiEnvelope, AuthReply, ChannelMessage, ControlSignal, ServerFrame, TokenData,
};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ChannelError, TokenError};

const DEFAULT_BUFFER: usize = 256;

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub server_url: String,
    /// Explicit websocket endpoint; derived from `server_url` + `ws_path` when absent.
    pub ws_url: Option<String>,
    pub ws_path: String,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// `None` retries forever.
    pub max_retries: Option<u32>,
    pub buffer: usize,
}

impl ChannelConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ws_url: None,
            ws_path: "/ws".into(),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            max_retries: None,
            buffer: DEFAULT_BUFFER,
        }
    }

    pub fn token_url(&self) -> String {
        format!(
            "{}/socket_auth_token",
            self.server_url.trim_end_matches('/')
        )
    }

    pub fn websocket_url(&self) -> Result<String, ChannelError> {
        let raw = self.ws_url.as_deref().unwrap_or(&self.server_url);
        let invalid = |reason: String| ChannelError::InvalidUrl {
            url: raw.to_string(),
            reason,
        };
        let mut url = Url::parse(raw).map_err(|err| invalid(err.to_string()))?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(invalid(format!("unsupported scheme '{other}'"))),
        };
        url.set_scheme(scheme)
            .map_err(|_| invalid("cannot switch to websocket scheme".into()))?;
        if self.ws_url.is_none() {
            let base = url.path().trim_end_matches('/').to_string();
            url.set_path(&format!("{base}/{}", self.ws_path.trim_start_matches('/')));
        }
        Ok(url.to_string())
    }
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_token(&self) -> Result<String, TokenError>;
}

pub struct HttpTokenProvider {
    http: Client,
    url: String,
}

impl HttpTokenProvider {
    pub fn new(http: Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    pub fn for_config(http: Client, config: &ChannelConfig) -> Self {
        Self::new(http, config.token_url())
    }
}

#[async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn fetch_token(&self) -> Result<String, TokenError> {
        let envelope: ApiEnvelope<TokenData> = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        envelope
            .into_result()
            .map(|data| data.token)
            .map_err(|err| TokenError::Rejected(err.message))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Closed,
    Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub retry_count: u32,
}

// At-most-once: pushes sent while disconnected are lost.
pub struct RealtimeChannel {
    rx: mpsc::Receiver<ChannelMessage>,
    task: JoinHandle<()>,
    state: watch::Receiver<ConnectionState>,
    closed: bool,
}

impl RealtimeChannel {
    pub fn connect(
        config: ChannelConfig,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, ChannelError> {
        let ws_url = config.websocket_url()?;
        let (tx, rx) = mpsc::channel(config.buffer.max(1));
        let (state_tx, state) = watch::channel(ConnectionState {
            status: ConnectionStatus::Connecting,
            retry_count: 0,
        });
        let task = tokio::spawn(supervise(config, ws_url, tokens, tx, state_tx));
        Ok(Self {
            rx,
            task,
            state,
            closed: false,
        })
    }

    /// Next message, or `None` once the channel is closed or gave up reconnecting.
    pub async fn next_message(&mut self) -> Option<ChannelMessage> {
        if self.closed {
            return None;
        }
        self.rx.recv().await
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.task.abort();
        self.rx.close();
        let mut discarded = 0usize;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        info!(discarded, "flow channel closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn into_stream(self) -> impl Stream<Item = ChannelMessage> {
        futures::stream::unfold(self, |mut channel| async move {
            channel.next_message().await.map(|message| (message, channel))
        })
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

enum SessionEnd {
    ServerClosed,
    ConsumerGone,
}

fn publish(state_tx: &watch::Sender<ConnectionState>, status: ConnectionStatus, retry_count: u32) {
    let next = ConnectionState {
        status,
        retry_count,
    };
    if *state_tx.borrow() != next {
        info!(status = ?status, retry_count, "flow channel state changed");
        state_tx.send_replace(next);
    }
}

async fn supervise(
    config: ChannelConfig,
    ws_url: String,
    tokens: Arc<dyn TokenProvider>,
    tx: mpsc::Sender<ChannelMessage>,
    state_tx: watch::Sender<ConnectionState>,
) {
    let mut retry_count = 0u32;
    let mut backoff = config.initial_backoff;
    loop {
        publish(&state_tx, ConnectionStatus::Connecting, retry_count);
        let mut opened = false;
        match run_session(&ws_url, tokens.as_ref(), &tx, &state_tx, retry_count, &mut opened).await
        {
            Ok(SessionEnd::ConsumerGone) => {
                debug!("flow consumer dropped; stopping connection task");
                return;
            }
            Ok(SessionEnd::ServerClosed) => {
                publish(&state_tx, ConnectionStatus::Closed, retry_count);
            }
            Err(err) => {
                warn!(error = %err, retry_count, "flow connection failed");
                publish(&state_tx, ConnectionStatus::Errored, retry_count);
            }
        }
        if tx.is_closed() {
            return;
        }
        if opened {
            retry_count = 0;
            backoff = config.initial_backoff;
        }
        retry_count += 1;
        if config.max_retries.is_some_and(|max| retry_count > max) {
            warn!(retry_count, "flow channel giving up after too many reconnect attempts");
            publish(&state_tx, ConnectionStatus::Closed, retry_count);
            return;
        }
        debug!(delay_ms = backoff.as_millis() as u64, retry_count, "reconnecting flow channel");
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(config.max_backoff);
    }
}

async fn run_session(
    ws_url: &str,
    tokens: &dyn TokenProvider,
    tx: &mpsc::Sender<ChannelMessage>,
    state_tx: &watch::Sender<ConnectionState>,
    retry_count: u32,
    opened: &mut bool,
) -> Result<SessionEnd, ChannelError> {
    let token = tokens.fetch_token().await?;
    let (ws_stream, _) = connect_async(ws_url).await?;
    debug!(%ws_url, "flow websocket connected");
    let (mut writer, mut reader) = ws_stream.split();

    while let Some(frame) = reader.next().await {
        match frame? {
            Message::Text(text) => match ServerFrame::parse(&text) {
                Ok(ServerFrame::Control(control)) => match control.signal() {
                    ControlSignal::AuthRequest => {
                        let reply = serde_json::to_string(&AuthReply {
                            auth_token: token.clone(),
                        })?;
                        writer.send(Message::Text(reply)).await?;
                    }
                    ControlSignal::AuthOk => {
                        *opened = true;
                        publish(state_tx, ConnectionStatus::Open, retry_count);
                    }
                    ControlSignal::AuthFailed => return Err(ChannelError::AuthRejected),
                    ControlSignal::Unknown => {
                        debug!(id = %control.id, "ignoring unknown control frame")
                    }
                },
                Ok(ServerFrame::Message(message)) => {
                    *opened = true;
                    if tx.send(message).await.is_err() {
                        return Ok(SessionEnd::ConsumerGone);
                    }
                }
                Err(err) => warn!(error = %err, "skipping invalid flow frame"),
            },
            Message::Close(_) => return Ok(SessionEnd::ServerClosed),
            _ => {}
        }
    }
    Ok(SessionEnd::ServerClosed)
}

#[cfg(test)]
#[path = "tests/channel_tests.rs"]
mod tests;
