/// MCP Server Entry Point
///
/// Loads configuration from the environment, installs the tracing
/// subscriber, and runs the HTTP/SSE server until it is stopped.
///
/// Logging is controlled by RUST_LOG (default: "info"); set LOG_FORMAT=json
/// for JSON lines.

use mcp_sse_server::core::{config::Config, server};
use tracing_subscriber::EnvFilter;

#[actix_rt::main]
async fn main() -> std::io::Result<()> {
    init_tracing();

    let config = Config::from_env();
    if config.bolna_api_key.is_none() {
        tracing::error!("BOLNA_API_KEY is not set; voice agent tools will fail");
    }

    server::run_server_http(config).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}
