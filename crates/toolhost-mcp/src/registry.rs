//! Tool registry: name-to-handler lookup shared by the dispatch loop.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::ToolError;
use crate::tool::{Tool, ToolDefinition};

/// Thread-safe registry of tools, cheap to clone.
///
/// Registration order is preserved so `tools/list` output is stable.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").finish_non_exhaustive()
    }
}

impl ToolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, rejecting duplicate names.
    pub async fn register<T: Tool + 'static>(&self, tool: T) -> Result<(), ToolError> {
        self.register_arc(Arc::new(tool)).await
    }

    /// Registers an already Arc-wrapped tool.
    pub async fn register_arc(&self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let mut inner = self.inner.write().await;
        let name = tool.name().to_string();
        if inner.tools.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered(name));
        }
        inner.order.push(name.clone());
        inner.tools.insert(name, tool);
        Ok(())
    }

    /// Looks up a tool by name.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.inner.read().await.tools.get(name).cloned()
    }

    /// Lists registered tools in registration order.
    pub async fn list(&self) -> Vec<ToolDefinition> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|name| inner.tools.get(name))
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().map(str::to_string),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    /// Number of registered tools.
    pub async fn len(&self) -> usize {
        self.inner.read().await.tools.len()
    }

    /// True when no tools are registered.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ToolContext, ToolResult};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct NamedTool(&'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(
            &self,
            _input: Value,
            _context: &ToolContext,
        ) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::text(self.0))
        }
    }

    #[tokio::test]
    async fn register_and_get() {
        let registry = ToolRegistry::new();
        registry.register(NamedTool("shellStart")).await.unwrap();
        assert!(registry.get("shellStart").await.is_some());
        assert!(registry.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let registry = ToolRegistry::new();
        registry.register(NamedTool("dup")).await.unwrap();
        let err = registry.register(NamedTool("dup")).await.unwrap_err();
        assert!(matches!(err, ToolError::AlreadyRegistered(name) if name == "dup"));
    }

    #[tokio::test]
    async fn list_preserves_registration_order() {
        let registry = ToolRegistry::new();
        registry.register(NamedTool("c")).await.unwrap();
        registry.register(NamedTool("a")).await.unwrap();
        registry.register(NamedTool("b")).await.unwrap();

        let names: Vec<String> = registry.list().await.into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn clones_share_storage() {
        let registry = ToolRegistry::new();
        let clone = registry.clone();
        clone.register(NamedTool("shared")).await.unwrap();
        assert_eq!(registry.len().await, 1);
    }
}
