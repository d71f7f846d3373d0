#![deny(missing_docs)]
//! Tool interface and registry for neuron.
//!
//! Defines the [`ToolDyn`] trait for object-safe tool abstraction and
//! [`ToolRegistry`] for managing collections of tools. Any tool source
//! (local function, MCP server, HTTP endpoint) implements [`ToolDyn`].

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

mod execute;

pub use execute::{validate_params, ExecutionMode, NullSink, StreamSink, ToolEntry, ToolResult};

/// Errors from tool operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool was not found in the registry.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// Tool execution failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The input provided to the tool was invalid.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The tool did not complete within its configured deadline.
    #[error("tool '{name}' exceeded deadline of {deadline:?}")]
    Deadline {
        /// Name of the tool that timed out.
        name: String,
        /// The deadline that was exceeded.
        deadline: Duration,
    },

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Object-safe trait for tool implementations.
///
/// Any tool source (local function, MCP server, HTTP endpoint) implements
/// this trait. Tools are stored as `Arc<dyn ToolDyn>` in [`ToolRegistry`].
pub trait ToolDyn: Send + Sync {
    /// The tool's unique name.
    fn name(&self) -> &str;

    /// Human-readable description of what the tool does.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's input parameters.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given input.
    fn call(
        &self,
        input: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>>;
}

/// Registry of tools available to a turn.
///
/// Holds tools as `Arc<dyn ToolDyn>` keyed by name. The turn's ReAct loop
/// uses this to look up and execute tools requested by the model.
pub struct ToolRegistry {
    tools: HashMap<String, ToolEntry>,
    default_deadline: Duration,
}

impl ToolRegistry {
    /// Create an empty registry. Tools default to a 30s execution deadline.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            default_deadline: Duration::from_secs(30),
        }
    }

    /// Create an empty registry with a custom default deadline.
    pub fn with_default_deadline(default_deadline: Duration) -> Self {
        Self {
            default_deadline,
            ..Self::new()
        }
    }

    /// Register a tool with [`ExecutionMode::Local`]. Overwrites any
    /// existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn ToolDyn>) {
        self.register_with_mode(tool, ExecutionMode::Local);
    }

    /// Register a tool with an explicit execution mode.
    pub fn register_with_mode(&mut self, tool: Arc<dyn ToolDyn>, mode: ExecutionMode) {
        let name = tool.name().to_string();
        self.tools.insert(name, ToolEntry { tool, mode });
    }

    /// Execution mode a tool was registered with, if present.
    pub fn mode_of(&self, name: &str) -> Option<ExecutionMode> {
        self.tools.get(name).map(|e| e.mode)
    }

    /// Execute a registered tool by name, scoped to `project_key`.
    ///
    /// Enforces `deadline` (falling back to the registry's default) via
    /// `tokio::time::timeout` and records `executionTimeMs`. Never panics
    /// or propagates a misbehaving tool's error beyond a [`ToolResult`].
    pub async fn execute(
        &self,
        project_key: &str,
        name: &str,
        params: serde_json::Value,
        deadline: Option<Duration>,
        sink: &dyn StreamSink,
    ) -> Result<ToolResult, ToolError> {
        let entry = self.tools.get(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        let deadline = deadline.unwrap_or(self.default_deadline);
        Ok(execute::execute(project_key, entry.tool.as_ref(), params, deadline, sink).await)
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolDyn>> {
        self.tools.get(name).map(|e| &e.tool)
    }

    /// Iterate over all registered tools.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ToolDyn>> {
        self.tools.values().map(|e| &e.tool)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn _assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn tool_dyn_is_object_safe() {
        _assert_send_sync::<Arc<dyn ToolDyn>>();
    }

    #[test]
    fn tool_error_display() {
        assert_eq!(
            ToolError::NotFound("bash".into()).to_string(),
            "tool not found: bash"
        );
        assert_eq!(
            ToolError::ExecutionFailed("timeout".into()).to_string(),
            "execution failed: timeout"
        );
        assert_eq!(
            ToolError::InvalidInput("missing field".into()).to_string(),
            "invalid input: missing field"
        );
    }

    struct EchoTool;

    impl ToolDyn for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes input back"
        }
        fn input_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        fn call(
            &self,
            input: serde_json::Value,
        ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>>
        {
            Box::pin(async move { Ok(json!({"echoed": input})) })
        }
    }

    struct FailTool;

    impl ToolDyn for FailTool {
        fn name(&self) -> &str {
            "fail"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn input_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        fn call(
            &self,
            _input: serde_json::Value,
        ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>>
        {
            Box::pin(async { Err(ToolError::ExecutionFailed("always fails".into())) })
        }
    }

    #[test]
    fn registry_add_and_get() {
        let mut reg = ToolRegistry::new();
        assert!(reg.is_empty());

        reg.register(Arc::new(EchoTool));
        assert_eq!(reg.len(), 1);
        assert!(reg.get("echo").is_some());
        assert!(reg.get("nonexistent").is_none());
    }

    #[test]
    fn registry_iter() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        reg.register(Arc::new(FailTool));

        let names: Vec<&str> = reg.iter().map(|t| t.name()).collect();
        assert!(names.contains(&"echo"));
        assert!(names.contains(&"fail"));
    }

    #[tokio::test]
    async fn registry_call_tool() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));

        let tool = reg.get("echo").unwrap();
        let result = tool.call(json!({"msg": "hello"})).await.unwrap();
        assert_eq!(result, json!({"echoed": {"msg": "hello"}}));
    }

    #[tokio::test]
    async fn registry_call_failing_tool() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(FailTool));

        let tool = reg.get("fail").unwrap();
        let result = tool.call(json!({})).await;
        assert!(result.is_err());
    }

    #[test]
    fn registry_overwrite() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        assert_eq!(reg.len(), 1);

        // Register another tool with the same name
        reg.register(Arc::new(EchoTool));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn register_with_mode_is_queryable() {
        let mut reg = ToolRegistry::new();
        reg.register_with_mode(Arc::new(EchoTool), ExecutionMode::Delegated);
        assert_eq!(reg.mode_of("echo"), Some(ExecutionMode::Delegated));
        assert_eq!(reg.mode_of("missing"), None);
    }

    #[tokio::test]
    async fn execute_scoped_runs_registered_tool() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));

        let result = reg
            .execute("proj-1", "echo", json!({"msg": "hi"}), None, &NullSink)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.data.unwrap(), json!({"echoed": {"msg": "hi"}}));
    }

    #[tokio::test]
    async fn execute_unknown_tool_is_not_found() {
        let reg = ToolRegistry::new();
        let err = reg.execute("proj-1", "nope", json!({}), None, &NullSink).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn execute_failing_tool_becomes_unsuccessful_result() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(FailTool));
        let result = reg.execute("proj-1", "fail", json!({}), None, &NullSink).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("always fails"));
    }
}
