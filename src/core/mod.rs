/// Core Server Framework Module
///
/// This module contains the session transport and protocol machinery:
/// - config.rs: Environment-driven server configuration
/// - error.rs: Protocol and execution error taxonomy
/// - protocol.rs: JSON-RPC messages, content blocks, SSE framing
/// - schema.rs: Structural input schemas and argument validation
/// - tool.rs: The tool contract (typed `Tool`, object-safe `Adapter`)
/// - registry.rs: Registry of tools available for discovery and calls
/// - session.rs: Sessions, the session registry, and the SSE event stream
/// - dispatcher.rs: Routes inbound messages to handlers and writes replies
/// - server.rs: Actix Web routes and server startup

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod server;
pub mod session;
pub mod tool;
