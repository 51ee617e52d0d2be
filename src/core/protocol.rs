/// MCP Wire Types
///
/// This module contains the JSON-RPC 2.0 structures exchanged with clients,
/// the content-block envelope returned by tool calls, and the Server-Sent
/// Events framing used on each session's outbound stream.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol revision reported when the client asks for one we do not know.
pub const LATEST_PROTOCOL_VERSION: &str = "2024-11-05";

/// Protocol revisions this server can speak.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// JSON-RPC 2.0 request structure for MCP protocol.
///
/// `id` is the correlation token: the response carries it back unchanged so
/// the client can match it to its pending call. `None` marks a notification.
#[derive(Deserialize, Debug, Clone)]
pub struct MCPRequest {
    /// JSON-RPC version identifier, must be "2.0". Left empty when absent so
    /// the dispatcher can answer with an invalid-request error.
    #[serde(default)]
    pub jsonrpc: String,
    /// Request ID for correlating responses. None indicates a notification.
    #[serde(default)]
    pub id: Option<Value>,
    /// MCP method name (e.g., "initialize", "tools/list", "tools/call")
    pub method: String,
    /// Method-specific parameters as JSON value
    #[serde(default)]
    pub params: Option<Value>,
}

impl MCPRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 response structure for MCP protocol.
///
/// Responses include jsonrpc "2.0", the request id, and either a result
/// or an error.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MCPResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<MCPError>,
}

impl MCPResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(MCPError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// JSON-RPC 2.0 error structure.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MCPError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Server-initiated notification (no id, no reply expected).
#[derive(Serialize, Debug, Clone)]
pub struct MCPNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
}

impl MCPNotification {
    /// `notifications/message` log event.
    pub fn log(level: &str, logger: &str, data: impl Into<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: "notifications/message".to_string(),
            params: serde_json::json!({
                "level": level,
                "logger": logger,
                "data": data.into(),
            }),
        }
    }
}

/// A typed block of tool output. Only text is produced today; the tag keeps
/// room for other kinds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
        }
    }
}

/// Result envelope of a `tools/call`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    pub content: Vec<ContentBlock>,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: false,
        }
    }

    /// Pretty-printed JSON as a single text block.
    pub fn json(value: &Value) -> Self {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        Self::text(text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: true,
        }
    }

    /// All text blocks joined by newlines.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One event written to a session's outbound stream.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// First event of every stream: where to POST inbound messages.
    Endpoint(String),
    /// A JSON-RPC message (response or notification), already serialized.
    Message(String),
}

impl ServerEvent {
    pub fn response(response: &MCPResponse) -> Self {
        ServerEvent::Message(serde_json::to_string(response).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to serialize response");
            String::from("{}")
        }))
    }

    pub fn notification(notification: &MCPNotification) -> Self {
        ServerEvent::Message(serde_json::to_string(notification).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to serialize notification");
            String::from("{}")
        }))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Endpoint(_) => "endpoint",
            ServerEvent::Message(_) => "message",
        }
    }

    /// Render as an SSE frame: `event: <name>\ndata: <line>\n...\n\n`.
    pub fn to_sse(&self) -> Bytes {
        let data = match self {
            ServerEvent::Endpoint(d) | ServerEvent::Message(d) => d,
        };
        let mut frame = String::with_capacity(data.len() + 32);
        frame.push_str("event: ");
        frame.push_str(self.name());
        frame.push('\n');
        for line in data.split('\n') {
            frame.push_str("data: ");
            frame.push_str(line.trim_end_matches('\r'));
            frame.push('\n');
        }
        frame.push('\n');
        Bytes::from(frame)
    }
}

/// SSE comment used as a keep-alive while a session is idle.
pub fn keepalive_frame() -> Bytes {
    Bytes::from_static(b": ping\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn notification_has_no_id() {
        let req: MCPRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
                .unwrap();
        assert!(req.is_notification());
        assert!(req.params.is_none());
    }

    #[test]
    fn tool_output_serializes_type_tagged_blocks() {
        let out = ToolOutput::text("5");
        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            json!({"content": [{"type": "text", "text": "5"}], "isError": false})
        );
    }

    #[test]
    fn failure_response_omits_result() {
        let resp = MCPResponse::failure(Some(json!(7)), METHOD_NOT_FOUND, "nope");
        let value = serde_json::to_value(&resp).unwrap();
        assert!(value.get("result").is_none());
        assert_eq!(value["error"]["code"], -32601);
        assert_eq!(value["id"], 7);
    }

    #[test]
    fn endpoint_frame_format() {
        let frame = ServerEvent::Endpoint("/messages/?session_id=abc".into()).to_sse();
        assert_eq!(
            &frame[..],
            b"event: endpoint\ndata: /messages/?session_id=abc\n\n"
        );
    }

    #[test]
    fn multi_line_payload_gets_one_data_line_each() {
        let frame = ServerEvent::Message("{\n}".into()).to_sse();
        assert_eq!(&frame[..], b"event: message\ndata: {\ndata: }\n\n");
    }
}
