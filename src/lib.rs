//! MCP tool server over a session-keyed Server-Sent Events transport.
//!
//! Clients open `GET /sse` to get a session and its event stream, then POST
//! JSON-RPC messages to the announced endpoint. Replies come back on the
//! stream, correlated by request id.

pub mod core;
pub mod tools;
