/// Arithmetic Tools
///
/// `add`, `subtract`, `multiply` and `divide` over two numbers. No I/O;
/// the only failure is a result that is not a finite number (division by
/// zero, overflow), reported as an execution error.

use async_trait::async_trait;
use serde::Deserialize;

use crate::core::error::{ExecutionError, ProtocolError};
use crate::core::protocol::ToolOutput;
use crate::core::registry::ToolRegistry;
use crate::core::schema::{FieldSpec, InputSchema};
use crate::core::tool::{MCPTool, Tool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Subtract => "subtract",
            Operation::Multiply => "multiply",
            Operation::Divide => "divide",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Operation::Add => "Add two numbers.",
            Operation::Subtract => "Subtract b from a.",
            Operation::Multiply => "Multiply two numbers.",
            Operation::Divide => "Divide a by b.",
        }
    }

    fn apply(self, a: f64, b: f64) -> Result<f64, ExecutionError> {
        let value = match self {
            Operation::Add => a + b,
            Operation::Subtract => a - b,
            Operation::Multiply => a * b,
            Operation::Divide if b == 0.0 => {
                return Err(ExecutionError::failed("Cannot divide by zero"));
            }
            Operation::Divide => a / b,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ExecutionError::failed(format!(
                "Result of {} is out of range",
                self.name()
            )))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Operands {
    a: f64,
    b: f64,
}

pub struct Arithmetic {
    tool: MCPTool,
    op: Operation,
}

impl Arithmetic {
    pub fn new(op: Operation) -> Self {
        Self {
            tool: MCPTool::new(
                op.name(),
                op.description(),
                InputSchema::new()
                    .field(FieldSpec::number("a", "First operand"))
                    .field(FieldSpec::number("b", "Second operand")),
            ),
            op,
        }
    }
}

#[async_trait]
impl Tool for Arithmetic {
    type Args = Operands;

    fn descriptor(&self) -> &MCPTool {
        &self.tool
    }

    async fn execute(&self, args: Operands) -> Result<ToolOutput, ExecutionError> {
        let value = self.op.apply(args.a, args.b)?;
        Ok(ToolOutput::text(value.to_string()))
    }
}

pub fn register(registry: &mut ToolRegistry) -> Result<(), ProtocolError> {
    for op in [
        Operation::Add,
        Operation::Subtract,
        Operation::Multiply,
        Operation::Divide,
    ] {
        registry.register(Arithmetic::new(op))?;
    }
    Ok(())
}
