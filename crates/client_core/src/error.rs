use shared::error::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("socket auth token request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("socket auth token rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("invalid flow url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("websocket failure: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("flow server rejected the socket auth token")]
    AuthRejected,
    #[error("failed to encode auth reply: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("request to {route} failed: {source}")]
    Request {
        route: &'static str,
        source: reqwest::Error,
    },
    #[error("{route} answered with an error: {message}")]
    Api { route: &'static str, message: String },
}

impl ApiClientError {
    pub(crate) fn api(route: &'static str, err: ApiError) -> Self {
        Self::Api {
            route,
            message: err.message,
        }
    }
}
