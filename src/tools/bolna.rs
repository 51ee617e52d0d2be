/// Voice Agent Tools (Bolna API v2)
///
/// Create, inspect, update, delete and run voice AI agents, and check the
/// status of executions. Upstream JSON is returned as pretty-printed text.
/// Requests are authenticated with `BOLNA_API_KEY`; without it every tool
/// fails with an explanatory message instead of calling out.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::core::error::{ExecutionError, ProtocolError};
use crate::core::protocol::ToolOutput;
use crate::core::registry::ToolRegistry;
use crate::core::schema::{FieldSpec, InputSchema};
use crate::core::tool::{MCPTool, Tool};
use crate::tools::http::UpstreamClient;

/// Authenticated client for the voice agent API.
pub struct BolnaApi {
    http: UpstreamClient,
}

impl BolnaApi {
    pub fn new(http: UpstreamClient) -> Arc<Self> {
        Arc::new(Self { http })
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ExecutionError> {
        if !self.http.has_credentials() {
            return Err(ExecutionError::failed(
                "BOLNA_API_KEY is not configured on the server",
            ));
        }
        let url = self.http.url(path);
        self.http
            .send(method, &url, &[], body)
            .await
            .map_err(|e| {
                ExecutionError::failed(format!("Unable to reach the voice agent service: {e}"))
            })
    }
}

/// Default single-task conversational agent built from the three required
/// fields.
pub fn required_agent_config(name: &str, agent_type: &str, welcome_message: &str) -> Value {
    json!({
        "agent_config": {
            "agent_name": name,
            "agent_type": agent_type,
            "agent_welcome_message": welcome_message,
            "tasks": [
                {
                    "task_type": "conversation",
                    "tools_config": {
                        "llm_agent": {
                            "agent_type": "simple_llm_agent",
                            "agent_flow_type": "streaming",
                            "routes": {
                                "embedding_model": "snowflake/snowflake-arctic-embed-m",
                                "routes": [
                                    {
                                        "route_name": "general",
                                        "utterances": ["How are you?", "What's up?"],
                                        "response": "Hello! How can I assist you today?",
                                        "score_threshold": 0.9
                                    }
                                ]
                            }
                        }
                    },
                    "toolchain": {
                        "execution": "parallel",
                        "pipelines": [["llm_agent"]]
                    },
                    "task_config": {
                        "hangup_after_silence": 10,
                        "incremental_delay": 400,
                        "number_of_words_for_interruption": 2
                    }
                }
            ]
        }
    })
}

fn id_field(name: &str, description: &str) -> FieldSpec {
    FieldSpec::string(name, description).length(1, 128)
}

/// Reject ids that would change the request path: separators, query and
/// fragment markers, percent escapes (`%2e%2e` decodes to a dot-segment),
/// whitespace, and the dot-segments themselves.
fn path_segment<'a>(field: &str, id: &'a str) -> Result<&'a str, ExecutionError> {
    let unsafe_char = |c: char| {
        matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace() || c.is_control()
    };
    if id.is_empty() || id == "." || id == ".." || id.contains(unsafe_char) {
        return Err(ExecutionError::failed(format!("Invalid {field}: '{id}'")));
    }
    Ok(id)
}

#[derive(Debug, Deserialize)]
pub struct CreateAgentArgs {
    agent_name: String,
    agent_type: String,
    agent_welcome_message: String,
}

pub struct CreateAgent {
    tool: MCPTool,
    api: Arc<BolnaApi>,
}

impl CreateAgent {
    pub fn new(api: Arc<BolnaApi>) -> Self {
        Self {
            tool: MCPTool::new(
                "create_agent",
                "Create a new voice AI agent with only the required fields.",
                InputSchema::new()
                    .field(FieldSpec::string("agent_name", "The name of the agent").non_empty())
                    .field(
                        FieldSpec::string("agent_type", "The type of the agent (e.g. \"other\")")
                            .non_empty(),
                    )
                    .field(FieldSpec::string(
                        "agent_welcome_message",
                        "The welcome message for the agent",
                    )),
            ),
            api,
        }
    }
}

#[async_trait]
impl Tool for CreateAgent {
    type Args = CreateAgentArgs;

    fn descriptor(&self) -> &MCPTool {
        &self.tool
    }

    async fn execute(&self, args: CreateAgentArgs) -> Result<ToolOutput, ExecutionError> {
        let config = required_agent_config(
            &args.agent_name,
            &args.agent_type,
            &args.agent_welcome_message,
        );
        let created = self.api.call(Method::POST, "agent", Some(&config)).await?;
        Ok(ToolOutput::json(&created))
    }
}

pub struct GetAgents {
    tool: MCPTool,
    api: Arc<BolnaApi>,
}

impl GetAgents {
    pub fn new(api: Arc<BolnaApi>) -> Self {
        Self {
            tool: MCPTool::new("get_agents", "Retrieve all voice AI agents.", InputSchema::new()),
            api,
        }
    }
}

#[async_trait]
impl Tool for GetAgents {
    type Args = Map<String, Value>;

    fn descriptor(&self) -> &MCPTool {
        &self.tool
    }

    async fn execute(&self, _args: Map<String, Value>) -> Result<ToolOutput, ExecutionError> {
        let agents = self.api.call(Method::GET, "agent/all", None).await?;
        match agents.as_array() {
            Some(list) if list.is_empty() => Ok(ToolOutput::text("No agents found.")),
            _ => Ok(ToolOutput::json(&agents)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AgentIdArgs {
    agent_id: String,
}

pub struct GetAgent {
    tool: MCPTool,
    api: Arc<BolnaApi>,
}

impl GetAgent {
    pub fn new(api: Arc<BolnaApi>) -> Self {
        Self {
            tool: MCPTool::new(
                "get_agent",
                "Retrieve a specific voice AI agent by ID.",
                InputSchema::new().field(id_field("agent_id", "The ID of the agent to fetch")),
            ),
            api,
        }
    }
}

#[async_trait]
impl Tool for GetAgent {
    type Args = AgentIdArgs;

    fn descriptor(&self) -> &MCPTool {
        &self.tool
    }

    async fn execute(&self, args: AgentIdArgs) -> Result<ToolOutput, ExecutionError> {
        let id = path_segment("agent_id", &args.agent_id)?;
        let agent = self
            .api
            .call(Method::GET, &format!("agent/{id}"), None)
            .await?;
        Ok(ToolOutput::json(&agent))
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateAgentArgs {
    agent_id: String,
    agent_config: Map<String, Value>,
}

pub struct UpdateAgent {
    tool: MCPTool,
    api: Arc<BolnaApi>,
}

impl UpdateAgent {
    pub fn new(api: Arc<BolnaApi>) -> Self {
        Self {
            tool: MCPTool::new(
                "update_agent",
                "Update an existing voice AI agent.",
                InputSchema::new()
                    .field(id_field("agent_id", "The ID of the agent to update"))
                    .field(FieldSpec::object(
                        "agent_config",
                        "The updated configuration for the agent",
                    )),
            ),
            api,
        }
    }
}

#[async_trait]
impl Tool for UpdateAgent {
    type Args = UpdateAgentArgs;

    fn descriptor(&self) -> &MCPTool {
        &self.tool
    }

    async fn execute(&self, args: UpdateAgentArgs) -> Result<ToolOutput, ExecutionError> {
        let id = path_segment("agent_id", &args.agent_id)?;
        let body = Value::Object(args.agent_config);
        let updated = self
            .api
            .call(Method::PUT, &format!("agent/{id}"), Some(&body))
            .await?;
        Ok(ToolOutput::json(&updated))
    }
}

pub struct DeleteAgent {
    tool: MCPTool,
    api: Arc<BolnaApi>,
}

impl DeleteAgent {
    pub fn new(api: Arc<BolnaApi>) -> Self {
        Self {
            tool: MCPTool::new(
                "delete_agent",
                "Delete a voice AI agent.",
                InputSchema::new().field(id_field("agent_id", "The ID of the agent to delete")),
            ),
            api,
        }
    }
}

#[async_trait]
impl Tool for DeleteAgent {
    type Args = AgentIdArgs;

    fn descriptor(&self) -> &MCPTool {
        &self.tool
    }

    async fn execute(&self, args: AgentIdArgs) -> Result<ToolOutput, ExecutionError> {
        let id = path_segment("agent_id", &args.agent_id)?;
        let response = self
            .api
            .call(Method::DELETE, &format!("agent/{id}"), None)
            .await?;
        if response.is_null() {
            return Ok(ToolOutput::json(&json!({ "status": "deleted" })));
        }
        Ok(ToolOutput::json(&response))
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecuteAgentArgs {
    agent_id: String,
    execution_data: Map<String, Value>,
}

pub struct ExecuteAgent {
    tool: MCPTool,
    api: Arc<BolnaApi>,
}

impl ExecuteAgent {
    pub fn new(api: Arc<BolnaApi>) -> Self {
        Self {
            tool: MCPTool::new(
                "execute_agent",
                "Execute a voice AI agent.",
                InputSchema::new()
                    .field(id_field("agent_id", "The ID of the agent to execute"))
                    .field(FieldSpec::object(
                        "execution_data",
                        "The data to execute the agent with",
                    )),
            ),
            api,
        }
    }
}

#[async_trait]
impl Tool for ExecuteAgent {
    type Args = ExecuteAgentArgs;

    fn descriptor(&self) -> &MCPTool {
        &self.tool
    }

    async fn execute(&self, args: ExecuteAgentArgs) -> Result<ToolOutput, ExecutionError> {
        let id = path_segment("agent_id", &args.agent_id)?;
        let body = Value::Object(args.execution_data);
        let execution = self
            .api
            .call(Method::POST, &format!("executions/{id}"), Some(&body))
            .await?;
        Ok(ToolOutput::json(&execution))
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecutionIdArgs {
    execution_id: String,
}

pub struct GetExecutionStatus {
    tool: MCPTool,
    api: Arc<BolnaApi>,
}

impl GetExecutionStatus {
    pub fn new(api: Arc<BolnaApi>) -> Self {
        Self {
            tool: MCPTool::new(
                "get_execution_status",
                "Retrieve the status of a specific execution.",
                InputSchema::new().field(id_field(
                    "execution_id",
                    "The ID of the execution to check the status of",
                )),
            ),
            api,
        }
    }
}

#[async_trait]
impl Tool for GetExecutionStatus {
    type Args = ExecutionIdArgs;

    fn descriptor(&self) -> &MCPTool {
        &self.tool
    }

    async fn execute(&self, args: ExecutionIdArgs) -> Result<ToolOutput, ExecutionError> {
        let id = path_segment("execution_id", &args.execution_id)?;
        let status = self
            .api
            .call(Method::GET, &format!("executions/status/{id}"), None)
            .await?;
        Ok(ToolOutput::json(&status))
    }
}

/// Register every voice agent tool against a shared API client.
pub fn register(registry: &mut ToolRegistry, api: Arc<BolnaApi>) -> Result<(), ProtocolError> {
    registry.register(CreateAgent::new(api.clone()))?;
    registry.register(GetAgents::new(api.clone()))?;
    registry.register(GetAgent::new(api.clone()))?;
    registry.register(UpdateAgent::new(api.clone()))?;
    registry.register(DeleteAgent::new(api.clone()))?;
    registry.register(ExecuteAgent::new(api.clone()))?;
    registry.register(GetExecutionStatus::new(api))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::tool::Adapter;
    use crate::tools::http::build_client;

    fn api(key: Option<&str>) -> Arc<BolnaApi> {
        let config = Config::default();
        let client = build_client(&config).unwrap();
        let http = UpstreamClient::new(client, "bolna", "http://127.0.0.1:9")
            .with_bearer(key.map(str::to_string));
        BolnaApi::new(http)
    }

    #[test]
    fn agent_config_carries_required_fields() {
        let config = required_agent_config("Ava", "other", "Hi there");
        let agent = &config["agent_config"];
        assert_eq!(agent["agent_name"], "Ava");
        assert_eq!(agent["agent_type"], "other");
        assert_eq!(agent["agent_welcome_message"], "Hi there");
        assert_eq!(agent["tasks"][0]["task_type"], "conversation");
        assert_eq!(agent["tasks"][0]["task_config"]["hangup_after_silence"], 10);
    }

    #[test]
    fn path_segments_reject_traversal() {
        assert!(path_segment("agent_id", "abc-123").is_ok());
        assert!(path_segment("agent_id", "../all").is_err());
        assert!(path_segment("agent_id", "x?y=1").is_err());
        for dots in ["..", ".", "%2e%2e", ".%2E", "%2E", "a\\b", " abc", ""] {
            assert!(path_segment("agent_id", dots).is_err(), "{dots:?} accepted");
        }
        assert!(path_segment("execution_id", "3f2c.v1").is_ok());
    }

    #[tokio::test]
    async fn dot_segment_id_never_reaches_the_service() {
        let adapter: Box<dyn Adapter> = Box::new(GetAgent::new(api(Some("key"))));
        let args = adapter.validate(&json!({"agent_id": ".."})).unwrap();
        let err = adapter.execute(args).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid agent_id: '..'");
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let adapter: Box<dyn Adapter> = Box::new(GetAgents::new(api(None)));
        let args = adapter.validate(&Value::Null).unwrap();
        let err = adapter.execute(args).await.unwrap_err();
        assert!(err.to_string().contains("BOLNA_API_KEY"));
    }

    #[tokio::test]
    async fn unreachable_service_is_reported_as_text() {
        let adapter: Box<dyn Adapter> = Box::new(GetAgent::new(api(Some("key"))));
        let args = adapter.validate(&json!({"agent_id": "abc"})).unwrap();
        let err = adapter.execute(args).await.unwrap_err();
        assert!(err.to_string().contains("Unable to reach the voice agent service"));
    }

    #[test]
    fn update_requires_object_config() {
        let adapter: Box<dyn Adapter> = Box::new(UpdateAgent::new(api(Some("key"))));
        let err = adapter
            .validate(&json!({"agent_id": "abc", "agent_config": "nope"}))
            .unwrap_err();
        assert_eq!(err.fields(), vec!["agent_config"]);
    }

    #[test]
    fn registers_seven_tools() {
        let mut registry = ToolRegistry::new();
        register(&mut registry, api(None)).unwrap();
        assert_eq!(registry.len(), 7);
        assert!(registry.resolve("get_execution_status").is_ok());
    }
}
