/// Protocol Dispatcher
///
/// Routes inbound JSON-RPC messages to their handlers and writes replies to
/// the originating session's stream. Each request runs on its own task, so
/// replies on one session may arrive in any order; clients match them by id.
///
/// Request-level problems (unknown tool, bad arguments, malformed params)
/// come back as JSON-RPC errors. Tool failures come back as a normal result
/// with `isError: true` and a text explaining what went wrong.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Value, json};
use tracing::{Instrument, debug, info_span, warn};

use crate::core::error::ProtocolError;
use crate::core::protocol::{
    self, LATEST_PROTOCOL_VERSION, MCPNotification, MCPRequest, MCPResponse, ServerEvent,
    SUPPORTED_PROTOCOL_VERSIONS, ToolOutput,
};
use crate::core::registry::ToolRegistry;
use crate::core::session::{Session, SessionId, SessionRegistry};

/// Server metadata reported from `initialize`.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

pub struct Dispatcher {
    info: ServerInfo,
    tools: Arc<ToolRegistry>,
    sessions: Arc<SessionRegistry>,
    requests_total: AtomicU64,
}

impl Dispatcher {
    pub fn new(info: ServerInfo, tools: Arc<ToolRegistry>, sessions: Arc<SessionRegistry>) -> Self {
        Self {
            info,
            tools,
            sessions,
            requests_total: AtomicU64::new(0),
        }
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    /// Admit an inbound message for `session_id` and process it in the
    /// background. Fails without doing any work when the session is not
    /// open or the body is not a JSON-RPC message; in the latter case a
    /// parse error is also reported on the session's stream.
    pub fn submit(
        self: &Arc<Self>,
        session_id: &SessionId,
        body: &[u8],
    ) -> Result<(), ProtocolError> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| ProtocolError::SessionNotFound(session_id.to_string()))?;

        let request: MCPRequest = match serde_json::from_slice(body) {
            Ok(req) => req,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Could not parse inbound message");
                let id = serde_json::from_slice::<Value>(body)
                    .ok()
                    .and_then(|v| v.get("id").cloned());
                let response =
                    MCPResponse::failure(id, protocol::PARSE_ERROR, format!("Parse error: {e}"));
                deliver(&session, ServerEvent::response(&response));
                return Err(ProtocolError::Parse(e));
            }
        };

        self.requests_total.fetch_add(1, Ordering::Relaxed);
        let request_id = request
            .id
            .as_ref()
            .map(serde_json::Value::to_string)
            .unwrap_or_default();
        let span = info_span!(
            "request",
            session_id = %session_id,
            method = %request.method,
            request_id = %request_id,
        );
        let dispatcher = Arc::clone(self);
        tokio::spawn(
            async move {
                if let Some(response) = dispatcher.dispatch(&session, request).await {
                    deliver(&session, ServerEvent::response(&response));
                }
            }
            .instrument(span),
        );
        Ok(())
    }

    /// Handle one request against an admitted session. Returns the reply to
    /// send, or `None` for notifications.
    pub async fn dispatch(&self, session: &Session, request: MCPRequest) -> Option<MCPResponse> {
        if request.is_notification() {
            debug!(method = %request.method, "Notification received");
            return None;
        }
        let id = request.id.clone();

        if request.jsonrpc != "2.0" {
            return Some(MCPResponse::failure(
                id,
                protocol::INVALID_REQUEST,
                format!("Unsupported jsonrpc version: {}", request.jsonrpc),
            ));
        }

        let response = match request.method.as_str() {
            "initialize" => {
                MCPResponse::success(id, self.handle_initialize(request.params.as_ref()))
            }
            "ping" => MCPResponse::success(id, json!({})),
            "tools/list" => MCPResponse::success(id, self.handle_tools_list()),
            "tools/call" => match self.handle_tools_call(session, request.params).await {
                Ok(output) => MCPResponse::success(id, tool_output_value(&output)),
                Err(e) => {
                    warn!(error = %e, "Tool call rejected");
                    MCPResponse::failure(id, e.rpc_code(), e.to_string())
                }
            },
            other => MCPResponse::failure(
                id,
                protocol::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            ),
        };
        Some(response)
    }

    fn handle_initialize(&self, params: Option<&Value>) -> Value {
        let requested = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str);
        let version = requested
            .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(v))
            .unwrap_or(LATEST_PROTOCOL_VERSION);
        json!({
            "protocolVersion": version,
            "capabilities": {
                "tools": { "listChanged": false },
                "logging": {}
            },
            "serverInfo": {
                "name": self.info.name,
                "version": self.info.version
            }
        })
    }

    fn handle_tools_list(&self) -> Value {
        json!({ "tools": self.tools.list() })
    }

    /// Resolve, validate and execute. Execution failures are folded into an
    /// error-flagged output; only admission failures are returned as `Err`.
    async fn handle_tools_call(
        &self,
        session: &Session,
        params: Option<Value>,
    ) -> Result<ToolOutput, ProtocolError> {
        let params = params.ok_or_else(|| ProtocolError::InvalidParams("missing params".into()))?;
        let tool_name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::InvalidParams("missing tool name".into()))?;
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let adapter = self.tools.resolve(tool_name)?;
        let args = adapter
            .validate(&arguments)
            .map_err(|source| ProtocolError::InvalidArguments {
                tool: tool_name.to_string(),
                source,
            })?;

        debug!(tool = %tool_name, "Executing tool");
        match adapter.execute(args).await {
            Ok(output) => Ok(output),
            Err(e) => {
                warn!(tool = %tool_name, error = %e, "Tool execution failed");
                let log = MCPNotification::log(
                    "error",
                    "tools",
                    json!({ "tool": tool_name, "error": e.to_string() }),
                );
                deliver(session, ServerEvent::notification(&log));
                Ok(ToolOutput::error(format!("Error: {e}")))
            }
        }
    }
}

/// Best-effort write: a closed channel means the client left, which is not
/// an error for the request that produced the event.
fn deliver(session: &Session, event: ServerEvent) {
    if session.send(event).is_err() {
        debug!(session_id = %session.id(), "Dropping event for closed session");
    }
}

fn tool_output_value(output: &ToolOutput) -> Value {
    serde_json::to_value(output).unwrap_or_else(|e| {
        json!({
            "content": [{ "type": "text", "text": format!("Error: {e}") }],
            "isError": true
        })
    })
}
