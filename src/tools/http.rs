/// Upstream HTTP Client
///
/// Thin wrapper over `reqwest` shared by every tool that calls an external
/// API. Each client is bound to one service (base URL, optional bearer key)
/// and enforces the configured per-call timeout. All failures come back as
/// `ExecutionError` so tools never leak transport errors.

use reqwest::{Client, Method, header};
use serde_json::Value;
use tracing::debug;

use crate::core::config::Config;
use crate::core::error::ExecutionError;

/// Build the shared `reqwest` client with timeout and User-Agent applied.
pub fn build_client(config: &Config) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(config.upstream_timeout)
        .connect_timeout(config.upstream_timeout)
        .user_agent(config.user_agent.clone())
        .build()
}

#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
    service: &'static str,
    base_url: String,
    bearer: Option<String>,
    accept: &'static str,
}

impl UpstreamClient {
    pub fn new(client: Client, service: &'static str, base_url: impl Into<String>) -> Self {
        Self {
            client,
            service,
            base_url: base_url.into(),
            bearer: None,
            accept: "application/json",
        }
    }

    pub fn with_bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }

    pub fn with_accept(mut self, accept: &'static str) -> Self {
        self.accept = accept;
        self
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub fn has_credentials(&self) -> bool {
        self.bearer.is_some()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET a path under the base URL.
    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, ExecutionError> {
        let url = self.url(path);
        self.send(Method::GET, &url, query, None).await
    }

    /// GET an absolute URL (e.g. a link returned by a previous call).
    pub async fn get_url(&self, url: &str) -> Result<Value, ExecutionError> {
        self.send(Method::GET, url, &[], None).await
    }

    /// Send a request with an optional JSON body. An empty response body is
    /// returned as `Value::Null`.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, ExecutionError> {
        debug!(service = self.service, %method, url, "Upstream request");

        let mut request = self
            .client
            .request(method, url)
            .header(header::ACCEPT, self.accept);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExecutionError::Status {
                service: self.service.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| ExecutionError::Upstream {
            service: self.service.to_string(),
            reason: format!("invalid JSON in response: {e}"),
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> ExecutionError {
        if e.is_timeout() {
            ExecutionError::Timeout {
                service: self.service.to_string(),
            }
        } else {
            ExecutionError::Upstream {
                service: self.service.to_string(),
                reason: e.to_string(),
            }
        }
    }

    pub fn missing(&self, field: &str) -> ExecutionError {
        ExecutionError::MissingField {
            service: self.service.to_string(),
            field: field.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client() -> UpstreamClient {
        let config = Config {
            upstream_timeout: Duration::from_millis(500),
            ..Config::default()
        };
        UpstreamClient::new(build_client(&config).unwrap(), "test", "http://127.0.0.1:9")
    }

    #[test]
    fn url_joins_without_double_slash() {
        let c = client();
        assert_eq!(c.url("/agent/all"), "http://127.0.0.1:9/agent/all");
        assert_eq!(c.url("agent/x"), "http://127.0.0.1:9/agent/x");
        assert!(!c.has_credentials());
        assert!(c.with_bearer(Some("k".into())).has_credentials());
    }

    #[tokio::test]
    async fn unreachable_upstream_is_an_execution_error() {
        let err = client().get("anything", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::Upstream { .. } | ExecutionError::Timeout { .. }
        ));
        let message = err.to_string();
        assert!(message.starts_with("request to test failed") || message.contains("timed out"));
    }
}
