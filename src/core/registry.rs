/// Tool Registry
///
/// Built once at startup, then shared read-only (behind an `Arc`) by every
/// worker. Keeps tools in registration order for discovery and a name index
/// for lookup.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::core::error::ProtocolError;
use crate::core::tool::{Adapter, MCPTool};

pub struct ToolRegistry {
    /// Registered adapters, in registration order (for tools/list)
    tools: Vec<Arc<dyn Adapter>>,
    /// Tool name to position in `tools` (for tools/call)
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool. A name that is already taken is rejected and the
    /// existing entry is left untouched.
    pub fn register<A: Adapter + 'static>(&mut self, adapter: A) -> Result<(), ProtocolError> {
        self.register_arc(Arc::new(adapter))
    }

    pub fn register_arc(&mut self, adapter: Arc<dyn Adapter>) -> Result<(), ProtocolError> {
        let name = adapter.descriptor().name.clone();
        if self.index.contains_key(&name) {
            return Err(ProtocolError::DuplicateTool(name));
        }
        info!(tool = %name, "Registered tool");
        self.index.insert(name, self.tools.len());
        self.tools.push(adapter);
        Ok(())
    }

    /// Descriptors in registration order.
    pub fn list(&self) -> Vec<&MCPTool> {
        self.tools.iter().map(|t| t.descriptor()).collect()
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Adapter>, ProtocolError> {
        self.index
            .get(name)
            .and_then(|&i| self.tools.get(i))
            .cloned()
            .ok_or_else(|| ProtocolError::UnknownTool(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
