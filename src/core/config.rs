/// Server Configuration
///
/// Everything is read from environment variables once at startup. Unset
/// variables take their defaults; numeric variables that fail to parse fall
/// back to the default with a warning.
///
/// Environment Variables:
/// - SERVER_NAME: Name of the server (default: "mcp-sse-server")
/// - SERVER_VERSION: Version string (default: crate version)
/// - HOST: Bind address (default: "0.0.0.0")
/// - PORT: Port number (default: 8080)
/// - WORKER_THREADS: Actix workers (default: CPU count, capped at 16)
/// - SSE_KEEPALIVE_SECS: Idle seconds between keep-alive comments (default: 15)
/// - UPSTREAM_TIMEOUT_SECS: Per-call timeout for upstream APIs (default: 30)
/// - BOLNA_API_KEY / BOLNA_API_URL: Voice agent API credentials and base URL
/// - NWS_API_URL: National Weather Service API base URL
/// - NOMINATIM_API_URL: Geocoding API base URL
/// - USER_AGENT: User-Agent sent to upstream APIs

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_BOLNA_API_URL: &str = "https://api.bolna.ai/v2";
pub const DEFAULT_NWS_API_URL: &str = "https://api.weather.gov";
pub const DEFAULT_NOMINATIM_API_URL: &str = "https://nominatim.openstreetmap.org";

#[derive(Debug, Clone)]
pub struct Config {
    pub server_name: String,
    pub server_version: String,
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub sse_keepalive: Duration,
    pub upstream_timeout: Duration,
    pub user_agent: String,
    pub bolna_api_key: Option<String>,
    pub bolna_api_url: String,
    pub nws_api_url: String,
    pub nominatim_api_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_name: "mcp-sse-server".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: num_cpus::get().clamp(1, 16),
            sse_keepalive: Duration::from_secs(15),
            upstream_timeout: Duration::from_secs(30),
            user_agent: format!("mcp-sse-server/{}", env!("CARGO_PKG_VERSION")),
            bolna_api_key: None,
            bolna_api_url: DEFAULT_BOLNA_API_URL.to_string(),
            nws_api_url: DEFAULT_NWS_API_URL.to_string(),
            nominatim_api_url: DEFAULT_NOMINATIM_API_URL.to_string(),
        }
    }
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Load from an explicit set of variables.
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let defaults = Self::default();
        let text = |key: &str, default: String| {
            vars.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .unwrap_or(default)
        };

        Self {
            server_name: text("SERVER_NAME", defaults.server_name),
            server_version: text("SERVER_VERSION", defaults.server_version),
            host: text("HOST", defaults.host),
            port: parse_or(&vars, "PORT", defaults.port),
            workers: parse_or(&vars, "WORKER_THREADS", defaults.workers).max(1),
            sse_keepalive: Duration::from_secs(
                parse_or(&vars, "SSE_KEEPALIVE_SECS", defaults.sse_keepalive.as_secs()).max(1),
            ),
            upstream_timeout: Duration::from_secs(
                parse_or(&vars, "UPSTREAM_TIMEOUT_SECS", defaults.upstream_timeout.as_secs())
                    .max(1),
            ),
            user_agent: text("USER_AGENT", defaults.user_agent),
            bolna_api_key: vars
                .get("BOLNA_API_KEY")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            bolna_api_url: trim_slash(text("BOLNA_API_URL", defaults.bolna_api_url)),
            nws_api_url: trim_slash(text("NWS_API_URL", defaults.nws_api_url)),
            nominatim_api_url: trim_slash(text("NOMINATIM_API_URL", defaults.nominatim_api_url)),
        }
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> T {
    match vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = raw, default = %default, "Ignoring unparseable setting");
            default
        }),
    }
}

fn trim_slash(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_vars(Vec::new());
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.sse_keepalive, Duration::from_secs(15));
        assert!(config.bolna_api_key.is_none());
        assert!((1..=16).contains(&config.workers));
    }

    #[test]
    fn overrides_and_trailing_slashes() {
        let config = Config::from_vars(vars(&[
            ("PORT", "3000"),
            ("SERVER_NAME", "BolnaVoiceAI"),
            ("BOLNA_API_KEY", "secret"),
            ("NWS_API_URL", "http://localhost:9000/"),
        ]));
        assert_eq!(config.port, 3000);
        assert_eq!(config.server_name, "BolnaVoiceAI");
        assert_eq!(config.bolna_api_key.as_deref(), Some("secret"));
        assert_eq!(config.nws_api_url, "http://localhost:9000");
    }

    #[test]
    fn bad_numbers_fall_back() {
        let config = Config::from_vars(vars(&[("PORT", "eighty"), ("WORKER_THREADS", "0")]));
        assert_eq!(config.port, 8080);
        assert_eq!(config.workers, 1);
    }
}
