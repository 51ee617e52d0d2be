/// Tool Contract
///
/// A tool is written against the typed `Tool` trait: it declares a
/// descriptor (name, description, input schema) and an argument struct, and
/// implements `execute`. The registry stores tools behind the object-safe
/// `Adapter` trait, which every `Tool` gets for free:
///
/// - `validate` checks the raw JSON against the schema, then deserializes it
///   into the tool's argument type.
/// - `execute` runs the tool with those typed arguments.

use std::any::Any;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::core::error::{ExecutionError, ValidationError};
use crate::core::protocol::ToolOutput;
use crate::core::schema::InputSchema;

/// MCP tool definition structure.
///
/// Each tool must have a unique name, description, and a schema for its
/// input parameters. Immutable once registered.
#[derive(Debug, Clone)]
pub struct MCPTool {
    /// Unique tool identifier (e.g., "add", "get_forecast")
    pub name: String,
    /// Human-readable description of what the tool does
    pub description: String,
    /// Structural contract over the tool's named parameters
    pub input_schema: InputSchema,
}

impl MCPTool {
    pub fn new(name: &str, description: &str, input_schema: InputSchema) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }

    /// Discovery rendering: `{name, description, inputSchema}`.
    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema.to_json_schema(),
        })
    }
}

impl Serialize for MCPTool {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// A capability with strongly-typed arguments.
#[async_trait]
pub trait Tool: Send + Sync + 'static {
    type Args: DeserializeOwned + Send + 'static;

    fn descriptor(&self) -> &MCPTool;

    /// Perform the call. Every failure must come back as an `ExecutionError`;
    /// implementations that reach the network enforce their own timeout.
    async fn execute(&self, args: Self::Args) -> Result<ToolOutput, ExecutionError>;
}

/// Arguments that passed validation, ready for `Adapter::execute`.
pub struct TypedArguments(Box<dyn Any + Send>);

impl TypedArguments {
    fn new<T: Send + 'static>(value: T) -> Self {
        Self(Box::new(value))
    }
}

impl std::fmt::Debug for TypedArguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TypedArguments(..)")
    }
}

/// Object-safe face of a tool, as held by the registry.
#[async_trait]
pub trait Adapter: Send + Sync {
    fn descriptor(&self) -> &MCPTool;

    fn validate(&self, raw: &Value) -> Result<TypedArguments, ValidationError>;

    async fn execute(&self, args: TypedArguments) -> Result<ToolOutput, ExecutionError>;
}

#[async_trait]
impl<T: Tool> Adapter for T {
    fn descriptor(&self) -> &MCPTool {
        Tool::descriptor(self)
    }

    fn validate(&self, raw: &Value) -> Result<TypedArguments, ValidationError> {
        Tool::descriptor(self).input_schema.validate(raw)?;
        let raw = if raw.is_null() { json!({}) } else { raw.clone() };
        let args: T::Args = serde_json::from_value(raw)
            .map_err(|e| ValidationError::single("", e.to_string()))?;
        Ok(TypedArguments::new(args))
    }

    async fn execute(&self, args: TypedArguments) -> Result<ToolOutput, ExecutionError> {
        let args = args.0.downcast::<T::Args>().map_err(|_| {
            ExecutionError::failed(format!(
                "arguments were not validated for tool {}",
                Tool::descriptor(self).name
            ))
        })?;
        Tool::execute(self, *args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::FieldSpec;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Greeting {
        name: String,
        #[serde(default)]
        shout: Option<bool>,
    }

    struct Greeter {
        tool: MCPTool,
    }

    impl Greeter {
        fn new() -> Self {
            Self {
                tool: MCPTool::new(
                    "greet",
                    "Say hello",
                    InputSchema::new()
                        .field(FieldSpec::string("name", "Who to greet").non_empty())
                        .field(FieldSpec::boolean("shout", "Upper-case").optional()),
                ),
            }
        }
    }

    #[async_trait]
    impl Tool for Greeter {
        type Args = Greeting;

        fn descriptor(&self) -> &MCPTool {
            &self.tool
        }

        async fn execute(&self, args: Greeting) -> Result<ToolOutput, ExecutionError> {
            let text = format!("Hello, {}!", args.name);
            Ok(ToolOutput::text(if args.shout.unwrap_or(false) {
                text.to_uppercase()
            } else {
                text
            }))
        }
    }

    #[tokio::test]
    async fn validate_then_execute_through_adapter() {
        let adapter: Box<dyn Adapter> = Box::new(Greeter::new());
        let args = adapter
            .validate(&json!({"name": "Ada", "shout": true}))
            .unwrap();
        let out = adapter.execute(args).await.unwrap();
        assert_eq!(out.joined_text(), "HELLO, ADA!");
    }

    #[test]
    fn validate_rejects_before_deserializing() {
        let adapter: Box<dyn Adapter> = Box::new(Greeter::new());
        let err = adapter.validate(&json!({"name": 42})).unwrap_err();
        assert_eq!(err.fields(), vec!["name"]);
    }

    #[test]
    fn descriptor_serializes_with_camel_case_schema_key() {
        let value = serde_json::to_value(Greeter::new().tool).unwrap();
        assert_eq!(value["name"], "greet");
        assert_eq!(value["inputSchema"]["required"], json!(["name"]));
    }
}
