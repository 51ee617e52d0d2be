/// Error Taxonomy
///
/// Failures are split into two tiers:
/// - `ProtocolError`: the request cannot be admitted (bad session, unknown
///   tool, invalid arguments). Surfaced to the caller as a rejection and
///   never reaches a capability adapter.
/// - `ExecutionError`: the adapter ran and its upstream interaction failed.
///   Converted into a normal tool result whose text describes the failure.
///
/// `ChannelClosed` is reported when writing to a session whose outbound
/// stream has gone away; callers log it and move on.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

use crate::core::protocol;

/// One offending field in a tool call's arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Dotted path of the field (e.g. "latitude", "agent_config.tasks")
    pub path: String,
    /// Human-readable reason the value was rejected
    pub reason: String,
}

impl FieldViolation {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.reason)
        } else {
            write!(f, "{}: {}", self.path, self.reason)
        }
    }
}

/// Validation failure carrying every violated field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn new(violations: Vec<FieldViolation>) -> Self {
        Self { violations }
    }

    pub fn single(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(vec![FieldViolation::new(path, reason)])
    }

    /// Paths of all offending fields, in the order they were found.
    pub fn fields(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.path.as_str()).collect()
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Request-level rejections.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Could not find session {0}")]
    SessionNotFound(String),

    #[error("Invalid session ID: {0}")]
    InvalidSessionId(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for tool {tool}: {source}")]
    InvalidArguments {
        tool: String,
        #[source]
        source: ValidationError,
    },

    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Could not parse message: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ProtocolError {
    /// JSON-RPC error code used when the rejection is reported on the stream.
    pub fn rpc_code(&self) -> i32 {
        match self {
            ProtocolError::UnknownTool(_) => protocol::METHOD_NOT_FOUND,
            ProtocolError::InvalidArguments { .. } | ProtocolError::InvalidParams(_) => {
                protocol::INVALID_PARAMS
            }
            ProtocolError::Parse(_) => protocol::PARSE_ERROR,
            ProtocolError::SessionNotFound(_)
            | ProtocolError::InvalidSessionId(_)
            | ProtocolError::DuplicateTool(_) => protocol::INTERNAL_ERROR,
        }
    }
}

impl ResponseError for ProtocolError {
    fn status_code(&self) -> StatusCode {
        match self {
            ProtocolError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ProtocolError::DuplicateTool(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("text/plain; charset=utf-8")
            .body(self.to_string())
    }
}

/// Adapter-internal failures. Never crosses the adapter boundary as a
/// rejection; the dispatcher renders it as an error-flagged tool result.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("request to {service} failed: {reason}")]
    Upstream { service: String, reason: String },

    #[error("{service} returned HTTP {status}")]
    Status { service: String, status: u16 },

    #[error("{service} timed out")]
    Timeout { service: String },

    #[error("{service} response is missing field '{field}'")]
    MissingField { service: String, field: String },

    #[error("{0}")]
    Failed(String),
}

impl ExecutionError {
    pub fn failed(reason: impl Into<String>) -> Self {
        ExecutionError::Failed(reason.into())
    }
}

/// The session's outbound stream is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("outbound channel closed")]
pub struct ChannelClosed;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_joins_every_field() {
        let err = ValidationError::new(vec![
            FieldViolation::new("a", "is required"),
            FieldViolation::new("b", "expected number, got string"),
        ]);
        assert_eq!(err.to_string(), "a: is required; b: expected number, got string");
        assert_eq!(err.fields(), vec!["a", "b"]);
    }

    #[test]
    fn session_not_found_maps_to_404() {
        let err = ProtocolError::SessionNotFound("abc".into());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ProtocolError::InvalidSessionId("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn rpc_codes_follow_json_rpc() {
        assert_eq!(ProtocolError::UnknownTool("x".into()).rpc_code(), -32601);
        let invalid = ProtocolError::InvalidArguments {
            tool: "add".into(),
            source: ValidationError::single("a", "is required"),
        };
        assert_eq!(invalid.rpc_code(), -32602);
        assert!(invalid.to_string().contains("a: is required"));
    }
}
