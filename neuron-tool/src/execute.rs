//! Project-scoped execution: deadlines, streaming, and the flat wire result.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use crate::{ToolDyn, ToolError};

/// How a registered tool is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Runs in-process via [`ToolDyn::call`].
    Local,
    /// Delegated to the IDE host; the registry only validates and records
    /// timing, the actual call happens out-of-process.
    Delegated,
}

/// A tool plus its execution mode, as stored in the registry.
pub struct ToolEntry {
    pub(crate) tool: std::sync::Arc<dyn ToolDyn>,
    pub(crate) mode: ExecutionMode,
}

/// Sink for incremental tool output.
///
/// Analogous to the ReAct loop's `partSink`: a tool that wants to stream
/// takes `&dyn StreamSink` as an extra call argument instead of (or in
/// addition to) returning a single final value.
pub trait StreamSink: Send + Sync {
    /// Push one chunk of incremental output, in arrival order.
    fn push(&self, chunk: &str);
}

/// No-op sink for callers that don't care about streaming.
pub struct NullSink;

impl StreamSink for NullSink {
    fn push(&self, _chunk: &str) {}
}

/// The flat wire/storage shape of a tool's outcome.
///
/// Exactly one of `data`/`error` is meaningful; this is enforced
/// structurally by [`execute`] building it from a `Result`, never by
/// caller discipline.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolResult {
    /// Whether the tool call succeeded.
    pub success: bool,
    /// Result payload when `success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Text shown to the user in a UI panel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_title: Option<String>,
    /// Longer-form display content for a UI panel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_content: Option<String>,
    /// Error message when `!success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock duration of the call, in milliseconds.
    pub execution_time_ms: u64,
    /// File paths touched or referenced by the call, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_file_paths: Vec<String>,
    /// Project-relative path the call concerned, if single-file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
    /// Free-form metadata the tool wants to carry alongside the result.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl ToolResult {
    fn from_ok(data: serde_json::Value, elapsed: Duration) -> Self {
        Self {
            success: true,
            data: Some(data),
            display_title: None,
            display_content: None,
            error: None,
            execution_time_ms: elapsed.as_millis() as u64,
            related_file_paths: Vec::new(),
            relative_path: None,
            metadata: serde_json::Value::Null,
        }
    }

    fn from_err(message: String, elapsed: Duration) -> Self {
        Self {
            success: false,
            data: None,
            display_title: None,
            display_content: None,
            error: Some(message),
            execution_time_ms: elapsed.as_millis() as u64,
            related_file_paths: Vec::new(),
            relative_path: None,
            metadata: serde_json::Value::Null,
        }
    }
}

/// Validate `params` against a tool's declared JSON Schema.
///
/// Only checks a minimal subset: an object schema's top-level `required`
/// array must be present as keys in `params`.
/// Extraneous keys are left alone — the tool itself drops or ignores them.
pub fn validate_params(schema: &serde_json::Value, params: &serde_json::Value) -> Result<(), ToolError> {
    let Some(required) = schema.get("required").and_then(|r| r.as_array()) else {
        return Ok(());
    };
    let obj = params.as_object();
    for key in required {
        let Some(key) = key.as_str() else { continue };
        let present = obj.map(|o| o.contains_key(key)).unwrap_or(false);
        if !present {
            return Err(ToolError::InvalidInput(format!("missing required field: {key}")));
        }
    }
    Ok(())
}

/// Run `tool` to completion, enforcing `deadline` and recording duration.
///
/// `project_key` scopes the call for callers that log or meter per
/// project; the executor itself does not cache or branch on it — any
/// caching lives inside the tool, per the registry's idempotence
/// contract.
pub fn execute<'a>(
    project_key: &'a str,
    tool: &'a dyn ToolDyn,
    params: serde_json::Value,
    deadline: Duration,
    sink: &'a dyn StreamSink,
) -> Pin<Box<dyn Future<Output = ToolResult> + Send + 'a>> {
    Box::pin(async move {
        tracing::debug!(project_key, tool = tool.name(), "executing tool");

        if let Err(e) = validate_params(&tool.input_schema(), &params) {
            return ToolResult::from_err(e.to_string(), Duration::ZERO);
        }

        let start = Instant::now();
        sink.push("");
        let outcome = tokio::time::timeout(deadline, tool.call(params)).await;
        let elapsed = start.elapsed();

        match outcome {
            Ok(Ok(data)) => ToolResult::from_ok(data, elapsed),
            Ok(Err(e)) => ToolResult::from_err(e.to_string(), elapsed),
            Err(_) => {
                tracing::warn!(project_key, tool = tool.name(), ?deadline, "tool deadline exceeded");
                let err = ToolError::Deadline {
                    name: tool.name().to_string(),
                    deadline,
                };
                ToolResult::from_err(err.to_string(), elapsed)
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolDyn;
    use serde_json::json;
    use std::sync::Arc;

    struct SlowTool;

    impl ToolDyn for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "sleeps then echoes"
        }
        fn input_schema(&self) -> serde_json::Value {
            json!({"type": "object", "required": ["ms"]})
        }
        fn call(
            &self,
            input: serde_json::Value,
        ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>> {
            Box::pin(async move {
                let ms = input["ms"].as_u64().unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(json!({"slept_ms": ms}))
            })
        }
    }

    #[tokio::test]
    async fn deadline_exceeded_becomes_failure() {
        let result = execute(
            "proj-1",
            &SlowTool,
            json!({"ms": 50}),
            Duration::from_millis(5),
            &NullSink,
        )
        .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("deadline"));
    }

    #[tokio::test]
    async fn within_deadline_succeeds() {
        let result = execute("proj-1", &SlowTool, json!({"ms": 1}), Duration::from_secs(1), &NullSink).await;
        assert!(result.success);
        assert_eq!(result.data.unwrap(), json!({"slept_ms": 1}));
    }

    #[tokio::test]
    async fn missing_required_field_fails_fast() {
        let result = execute("proj-1", &SlowTool, json!({}), Duration::from_secs(1), &NullSink).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("ms"));
    }

    #[test]
    fn validate_params_allows_extra_keys() {
        let schema = json!({"type": "object", "required": ["a"]});
        assert!(validate_params(&schema, &json!({"a": 1, "b": 2})).is_ok());
    }

    #[test]
    fn validate_params_rejects_missing_required() {
        let schema = json!({"type": "object", "required": ["a"]});
        assert!(validate_params(&schema, &json!({"b": 2})).is_err());
    }

    fn _assert_send_sync<T: Send + Sync>() {}
    #[test]
    fn null_sink_is_send_sync() {
        _assert_send_sync::<NullSink>();
    }
}
