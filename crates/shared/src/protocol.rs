use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, ErrorCode};

pub const AUTH_REQUEST: &str = "AUTH REQUEST";
pub const AUTH_OK: &str = "AUTH OK";
pub const AUTH_FAILED: &str = "AUTH FAILED";

/// Server-originated message pushed over the flow channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    #[serde(rename = "actionType", alias = "kind")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl ChannelMessage {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    AuthRequest,
    AuthOk,
    AuthFailed,
    Unknown,
}

impl ControlSignal {
    pub fn from_id(id: &str) -> Self {
        match id {
            AUTH_REQUEST => Self::AuthRequest,
            AUTH_OK => Self::AuthOk,
            AUTH_FAILED => Self::AuthFailed,
            _ => Self::Unknown,
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Self::AuthRequest => AUTH_REQUEST,
            Self::AuthOk => AUTH_OK,
            Self::AuthFailed => AUTH_FAILED,
            Self::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlFrame {
    pub id: String,
}

impl ControlFrame {
    pub fn new(signal: ControlSignal) -> Self {
        Self {
            id: signal.id().to_string(),
        }
    }

    pub fn signal(&self) -> ControlSignal {
        ControlSignal::from_id(&self.id)
    }
}

/// Any text frame the flow server may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Control(ControlFrame),
    Message(ChannelMessage),
}

impl ServerFrame {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Client reply to `AUTH REQUEST`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthReply {
    pub auth_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenData {
    pub token: String,
}

/// Request body for pushing a message to a user's flow sockets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowPush {
    pub username: String,
    #[serde(flatten)]
    pub message: ChannelMessage,
}

/// Response envelope used by every REST route: `{"status": ..., "data": ..., "message": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success".into(),
            data: Some(data),
            message: None,
        }
    }

    pub fn ok(data: T) -> Self {
        Self {
            status: "OK".into(),
            data: Some(data),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".into(),
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success") || self.status.eq_ignore_ascii_case("ok")
    }

    pub fn into_result(self) -> Result<T, ApiError> {
        if !self.is_success() {
            return Err(ApiError::new(
                ErrorCode::Upstream,
                self.message
                    .unwrap_or_else(|| format!("request failed with status '{}'", self.status)),
            ));
        }
        self.data
            .ok_or_else(|| ApiError::new(ErrorCode::Validation, "response envelope has no data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_flow_message_with_action_type_tag() {
        let frame = ServerFrame::parse(r#"{"actionType":"cesium/FETCH_MODELS","payload":{}}"#)
            .expect("frame");
        match frame {
            ServerFrame::Message(message) => assert_eq!(message.kind, "cesium/FETCH_MODELS"),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn parses_control_frames() {
        let frame = ServerFrame::parse(r#"{"id":"AUTH REQUEST"}"#).expect("frame");
        match frame {
            ServerFrame::Control(control) => {
                assert_eq!(control.signal(), ControlSignal::AuthRequest)
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn message_without_payload_defaults_to_null() {
        let message: ChannelMessage =
            serde_json::from_str(r#"{"kind":"FETCH_PROJECTS"}"#).expect("message");
        assert_eq!(message.payload, Value::Null);
    }

    #[test]
    fn error_envelope_surfaces_server_message() {
        let envelope: ApiEnvelope<Vec<i64>> =
            serde_json::from_value(json!({"status": "error", "message": "no such project"}))
                .expect("envelope");
        let err = envelope.into_result().expect_err("should fail");
        assert_eq!(err.code, ErrorCode::Upstream);
        assert_eq!(err.message, "no such project");
        assert_eq!(err.to_string(), "Upstream: no such project");
    }

    #[test]
    fn socket_token_envelope_decodes() {
        let envelope: ApiEnvelope<TokenData> = serde_json::from_value(
            json!({"status": "OK", "data": {"token": "eyJhbGciOiJIUzI1NiJ9.e30.sig"}}),
        )
        .expect("envelope");
        assert!(envelope.is_success());
        let data = envelope.into_result().expect("token data");
        assert_eq!(data.token, "eyJhbGciOiJIUzI1NiJ9.e30.sig");
    }

    #[test]
    fn envelope_without_data_is_a_validation_error() {
        let envelope: ApiEnvelope<TokenData> =
            serde_json::from_value(json!({"status": "success"})).expect("envelope");
        let err = envelope.into_result().expect_err("no data");
        assert_eq!(err.code, ErrorCode::Validation);
    }

    #[test]
    fn flow_push_flattens_message_fields() {
        let push: FlowPush = serde_json::from_value(json!({
            "username": "testuser@gmail.com",
            "actionType": "progress",
            "payload": {"stage": "features", "pct": 50}
        }))
        .expect("push");
        assert_eq!(push.message.kind, "progress");
        assert_eq!(push.message.payload["pct"], 50);
    }
}
