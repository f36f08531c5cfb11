//! Tool registry (C3): lookup from tool name to an async callable.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::message::ToolResult;

/// A single callable capability the LLM can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    async fn invoke(&self, arguments: &Map<String, Value>) -> ToolResult;
}

/// Lookup from tool name to its handler (C3).
///
/// Unknown names are handled by the caller (`ToolRegistry::invoke` returns a
/// `ToolResult{success: false}` rather than panicking).
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Invokes a tool by name. Unknown names produce a failed `ToolResult`
    /// instead of an error — a tool call is user-controlled input, not a bug.
    pub async fn invoke(&self, name: &str, arguments: &Map<String, Value>) -> ToolResult {
        match self.tools.get(name) {
            Some(tool) => tool.invoke(arguments).await,
            None => ToolResult::unknown_tool(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn invoke(&self, arguments: &Map<String, Value>) -> ToolResult {
            ToolResult::ok(serde_json::to_string(arguments).unwrap())
        }
    }

    #[tokio::test]
    async fn unknown_tool_yields_failed_result_not_panic() {
        let registry = ToolRegistry::new();
        let result = registry.invoke("nope", &Map::new()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("nope"));
    }

    #[tokio::test]
    async fn registered_tool_is_invoked() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));
        assert!(registry.contains("echo"));
        let result = registry.invoke("echo", &Map::new()).await;
        assert!(result.success);
    }
}
