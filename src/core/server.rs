/// MCP Server Implementation
///
/// This module wires the session transport into Actix Web:
/// - `GET /sse` opens a session and streams its events
/// - `POST /messages/?session_id=...` delivers a JSON-RPC message to a session
/// - `GET /tools` lists tools without opening a session
/// - `GET /health` and `GET /metrics` for monitoring

use std::sync::Arc;
use std::time::Duration;

use actix_web::{
    App, HttpResponse, HttpServer, Result,
    http::header::{self, ContentEncoding},
    middleware::{Compress, DefaultHeaders, Logger},
    web,
};
use serde::Deserialize;
use tracing::info;

use crate::core::config::Config;
use crate::core::dispatcher::{Dispatcher, ServerInfo};
use crate::core::error::ProtocolError;
use crate::core::registry::ToolRegistry;
use crate::core::session::{SessionGuard, SessionId, SessionRegistry, event_stream};
use crate::tools;

/// Path clients POST inbound messages to.
pub const MESSAGE_PATH: &str = "/messages/";

/// Application state shared across all worker threads.
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    /// Idle time after which the SSE stream emits a keep-alive comment
    pub keepalive: Duration,
}

impl AppState {
    pub fn new(info: ServerInfo, tools: Arc<ToolRegistry>, keepalive: Duration) -> Self {
        let sessions = SessionRegistry::new(MESSAGE_PATH);
        Self {
            dispatcher: Arc::new(Dispatcher::new(info, tools, sessions)),
            keepalive,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        self.dispatcher.sessions()
    }
}

#[derive(Deserialize)]
struct MessageQuery {
    session_id: Option<String>,
}

/// Health check endpoint handler.
async fn health() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "mcp-sse-server"
    })))
}

/// Request and session counters.
async fn metrics_handler(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "requests_total": state.dispatcher.requests_total(),
        "sessions_open": state.sessions().len(),
        "status": "ok"
    })))
}

/// Session-free tool discovery.
async fn tools_discovery(state: web::Data<AppState>) -> Result<HttpResponse> {
    let tools = state.dispatcher.tools().list();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "count": tools.len(),
        "tools": tools,
    })))
}

/// Open a session and stream its events.
///
/// The first frame tells the client where to POST. The session lives as
/// long as this response body: when the client goes away actix drops the
/// body, and the guard inside it removes the session.
async fn sse_connect(state: web::Data<AppState>) -> HttpResponse {
    let sessions = state.sessions().clone();
    let (session, rx) = sessions.create();
    let guard = SessionGuard::new(session.id(), sessions);

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(header::CacheControl(vec![
            header::CacheDirective::NoCache,
            header::CacheDirective::NoStore,
            header::CacheDirective::MustRevalidate,
        ]))
        // Compression would buffer the stream
        .insert_header(ContentEncoding::Identity)
        // Disable nginx buffering for real-time streaming
        .insert_header(("x-accel-buffering", "no"))
        .streaming(event_stream(rx, guard, state.keepalive))
}

/// Accept an inbound JSON-RPC message for a session.
///
/// Replies are not returned here; they arrive on the session's stream.
async fn post_message(
    state: web::Data<AppState>,
    query: web::Query<MessageQuery>,
    body: web::Bytes,
) -> Result<HttpResponse, ProtocolError> {
    let raw_id = query
        .session_id
        .as_deref()
        .ok_or_else(|| ProtocolError::InvalidSessionId("session_id is required".into()))?;
    let session_id: SessionId = raw_id.parse()?;

    state.dispatcher.submit(&session_id, &body)?;
    Ok(HttpResponse::Accepted().body("Accepted"))
}

/// Register all routes. Shared by the server and the integration tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics_handler))
        .route("/tools", web::get().to(tools_discovery))
        .route("/sse", web::get().to(sse_connect))
        .route(MESSAGE_PATH, web::post().to(post_message))
        .route("/messages", web::post().to(post_message))
        .route("/", web::get().to(health));
}

/// Run the MCP server.
///
/// Worker count, bind address and timeouts come from `Config`. Bind
/// failures are returned to the caller and end the process.
pub async fn run_server_http(config: Config) -> std::io::Result<()> {
    let bind_addr = format!("{}:{}", config.host, config.port);

    let tool_registry = Arc::new(tools::initialize_tools(&config)?);
    let app_state = web::Data::new(AppState::new(
        ServerInfo {
            name: config.server_name.clone(),
            version: config.server_version.clone(),
        },
        tool_registry.clone(),
        config.sse_keepalive,
    ));

    info!(
        name = %config.server_name,
        version = %config.server_version,
        bind = %bind_addr,
        workers = config.workers,
        tools = tool_registry.len(),
        "MCP server starting (SSE transport)"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            // Compress plain JSON responses; the SSE stream opts out
            .wrap(Compress::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY")),
            )
            .wrap(Logger::new("%r %s %Dms"))
            .configure(configure)
    })
    .workers(config.workers)
    .max_connections(10000)
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_secs(30))
    .client_disconnect_timeout(Duration::from_secs(2))
    .shutdown_timeout(10)
    .bind(&bind_addr)?
    .run()
    .await
}
