//! JSON-RPC 2.0 message types.
//!
//! See: https://www.jsonrpc.org/specification

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::EngineError;
use crate::core::transcode::TranscodeError;

pub const VERSION: &str = "2.0";

/// Standard and ditd-specific error codes.
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    pub const CARD_NOT_FOUND: i32 = -32001;
    pub const CARD_LOCKED: i32 = -32002;
    pub const CARD_BUSY: i32 = -32003;
    pub const PANEL_LOCKED: i32 = -32004;
    pub const INVALID_TIMECODE: i32 = -32005;
    pub const CLIP_NOT_FOUND: i32 = -32006;
    pub const BAD_DURATION: i32 = -32007;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Absent for notifications, which get no response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<&EngineError> for RpcError {
    fn from(err: &EngineError) -> Self {
        let (code, data) = match err {
            EngineError::CardNotFound(id) => (codes::CARD_NOT_FOUND, Some(Value::String(id.clone()))),
            EngineError::CardLocked(id) => (codes::CARD_LOCKED, Some(Value::String(id.clone()))),
            EngineError::CardBusy(id) => (codes::CARD_BUSY, Some(Value::String(id.clone()))),
            EngineError::PanelLocked => (codes::PANEL_LOCKED, None),
        };
        Self {
            code,
            message: err.to_string(),
            data,
        }
    }
}

impl From<&TranscodeError> for RpcError {
    fn from(err: &TranscodeError) -> Self {
        let (code, data) = match err {
            TranscodeError::InvalidTimecode(tc) => (codes::INVALID_TIMECODE, Some(Value::String(tc.clone()))),
            TranscodeError::ClipNotFound(name) => (codes::CLIP_NOT_FOUND, Some(Value::String(name.clone()))),
            TranscodeError::BadDuration { clip, .. } => (codes::BAD_DURATION, Some(Value::String(clip.clone()))),
        };
        Self {
            code,
            message: err.to_string(),
            data,
        }
    }
}

impl Request {
    pub fn new(method: impl Into<String>, params: Option<Value>, id: Value) -> Self {
        Self {
            jsonrpc: VERSION.to_string(),
            method: method.into(),
            params,
            id: Some(id),
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.jsonrpc != VERSION {
            return Err("jsonrpc must be \"2.0\"");
        }
        if self.method.is_empty() {
            return Err("method must not be empty");
        }
        Ok(())
    }
}

impl Response {
    pub fn success(id: Value, result: impl Serialize) -> Self {
        match serde_json::to_value(result) {
            Ok(value) => Self {
                jsonrpc: VERSION.to_string(),
                result: Some(value),
                error: None,
                id,
            },
            Err(e) => Self::internal_error(id, e.to_string()),
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self::failure(
            id,
            RpcError {
                code,
                message: message.into(),
                data: None,
            },
        )
    }

    pub fn engine_error(id: Value, err: &EngineError) -> Self {
        Self::failure(id, err.into())
    }

    pub fn transcode_error(id: Value, err: &TranscodeError) -> Self {
        Self::failure(id, err.into())
    }

    pub fn parse_error() -> Self {
        Self::error(Value::Null, codes::PARSE_ERROR, "Parse error")
    }

    pub fn invalid_request(id: Value) -> Self {
        Self::error(id, codes::INVALID_REQUEST, "Invalid request")
    }

    pub fn method_not_found(id: Value, method: &str) -> Self {
        Self::error(id, codes::METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(id: Value, details: impl Into<String>) -> Self {
        Self::error(id, codes::INVALID_PARAMS, details)
    }

    pub fn internal_error(id: Value, details: impl Into<String>) -> Self {
        Self::error(id, codes::INTERNAL_ERROR, details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_request() {
        let json = r#"{"jsonrpc":"2.0","method":"cards.start","params":{"id":"card-a"},"id":1}"#;
        let req: Request = serde_json::from_str(json).unwrap();

        assert_eq!(req.method, "cards.start");
        assert_eq!(req.params.unwrap()["id"], "card-a");
        assert_eq!(req.id, Some(Value::from(1)));
    }

    #[test]
    fn request_without_id_is_notification() {
        let req: Request = serde_json::from_str(r#"{"jsonrpc":"2.0","method":"cards.start_all"}"#).unwrap();
        assert!(req.is_notification());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn wrong_version_fails_validation() {
        let req: Request = serde_json::from_str(r#"{"jsonrpc":"1.0","method":"x","id":1}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn engine_errors_map_to_codes() {
        let resp = Response::engine_error(Value::from(3), &EngineError::CardLocked("card-b".into()));
        let json = serde_json::to_string(&resp).unwrap();

        assert!(json.contains(r#""code":-32002"#));
        assert!(json.contains(r#""data":"card-b""#));
        assert!(!json.contains("result"));

        let err = RpcError::from(&EngineError::PanelLocked);
        assert_eq!(err.code, codes::PANEL_LOCKED);
        assert_eq!(err.data, None);
    }

    #[test]
    fn transcode_errors_map_to_codes() {
        let err = RpcError::from(&TranscodeError::InvalidTimecode("25:00:00:00".into()));
        assert_eq!(err.code, codes::INVALID_TIMECODE);
        assert_eq!(err.data, Some(Value::String("25:00:00:00".into())));

        let err = RpcError::from(&TranscodeError::ClipNotFound("B009_C001".into()));
        assert_eq!(err.code, codes::CLIP_NOT_FOUND);
    }

    #[test]
    fn success_response_omits_error() {
        let json = serde_json::to_string(&Response::success(Value::from(1), "ok")).unwrap();
        assert!(json.contains(r#""result":"ok""#));
        assert!(!json.contains("error"));
    }
}
