// libs/agent-cell/src/services/registry.rs
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::timeout;
use tracing::debug;

use crate::models::ToolError;

const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 15;

/// A capability the model may call. `parameters` is a JSON-schema object
/// describing the arguments; the registry validates against it before the
/// handler runs.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> Value;

    async fn execute(&self, args: Value) -> Result<Value, ToolError>;

    /// Deadline for a single execution, enforced by the registry.
    fn timeout_secs(&self) -> u64 {
        DEFAULT_TOOL_TIMEOUT_SECS
    }
}

/// Name-keyed tool lookup. The registry validates, times out, and reports;
/// it never retries. Retry policy belongs to the planning loop.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Function declarations in the shape the model API expects.
    pub fn declarations(&self) -> Vec<Value> {
        let mut decls: Vec<Value> = self
            .tools
            .values()
            .map(|t| {
                json!({
                    "name": t.name(),
                    "description": t.description(),
                    "parameters": t.parameters(),
                })
            })
            .collect();
        decls.sort_by(|a, b| {
            a.get("name")
                .and_then(Value::as_str)
                .cmp(&b.get("name").and_then(Value::as_str))
        });
        decls
    }

    /// Validates `args` against the tool's schema and executes it under a
    /// timeout. An unknown tool name is a validation error, not a crash,
    /// so the model gets a chance to self-correct.
    pub async fn invoke(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| {
            ToolError::Validation(format!("Unknown tool '{}'", name))
        })?;

        validate_args(&tool.parameters(), &args)?;

        debug!("Invoking tool {} with args {}", name, args);

        let deadline = Duration::from_secs(tool.timeout_secs());
        match timeout(deadline, tool.execute(args)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout(tool.timeout_secs())),
        }
    }
}

/// Checks required fields are present and provided fields match the
/// declared primitive type. Offending fields are listed in the error so
/// the model can repair the call.
fn validate_args(schema: &Value, args: &Value) -> Result<(), ToolError> {
    let args_obj = args.as_object().ok_or_else(|| {
        ToolError::Validation("arguments must be a JSON object".to_string())
    })?;

    let mut offending: Vec<String> = Vec::new();

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            let missing = match args_obj.get(field) {
                None | Some(Value::Null) => true,
                Some(v) => v.as_str().is_some_and(|s| s.trim().is_empty()),
            };
            if missing {
                offending.push(format!("{} (missing)", field));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (field, value) in args_obj {
            let Some(field_schema) = properties.get(field) else {
                offending.push(format!("{} (unexpected)", field));
                continue;
            };
            if value.is_null() {
                continue;
            }
            let matches = match field_schema.get("type").and_then(Value::as_str) {
                Some("string") => value.is_string(),
                Some("number") => value.is_number(),
                Some("integer") => value.is_i64() || value.is_u64(),
                Some("boolean") => value.is_boolean(),
                Some("object") => value.is_object(),
                Some("array") => value.is_array(),
                _ => true,
            };
            if !matches {
                offending.push(format!("{} (wrong type)", field));
            }
        }
    }

    if offending.is_empty() {
        Ok(())
    } else {
        Err(ToolError::Validation(format!(
            "Invalid tool arguments: {}",
            offending.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the message back"
        }

        fn parameters(&self) -> Value {
            json!({
                "type": "object",
                "properties": {
                    "message": {"type": "string"},
                    "times": {"type": "integer"},
                },
                "required": ["message"],
            })
        }

        async fn execute(&self, args: Value) -> Result<Value, ToolError> {
            Ok(json!({"echoed": args["message"]}))
        }
    }

    struct StuckTool;

    #[async_trait]
    impl Tool for StuckTool {
        fn name(&self) -> &str {
            "stuck"
        }

        fn description(&self) -> &str {
            "Never returns"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}, "required": []})
        }

        async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
            std::future::pending().await
        }

        fn timeout_secs(&self) -> u64 {
            1
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry
    }

    #[tokio::test]
    async fn invokes_registered_tool() {
        let result = registry()
            .invoke("echo", json!({"message": "hi"}))
            .await
            .unwrap();
        assert_eq!(result["echoed"], "hi");
    }

    #[tokio::test]
    async fn unknown_tool_is_a_validation_error() {
        let err = registry().invoke("nope", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
        assert!(err.to_string().contains("nope"));
    }

    #[tokio::test]
    async fn missing_required_field_lists_the_field() {
        let err = registry().invoke("echo", json!({})).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("message (missing)"), "{}", message);
    }

    #[tokio::test]
    async fn wrong_type_lists_the_field() {
        let err = registry()
            .invoke("echo", json!({"message": "hi", "times": "three"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("times (wrong type)"));
    }

    #[tokio::test]
    async fn empty_required_string_is_missing() {
        let err = registry()
            .invoke("echo", json!({"message": "   "}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("message (missing)"));
    }

    #[tokio::test]
    async fn slow_tool_times_out() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StuckTool));
        let err = registry.invoke("stuck", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::Timeout(1)));
    }

    #[test]
    fn declarations_are_sorted_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StuckTool));
        registry.register(Arc::new(EchoTool));
        let names: Vec<_> = registry
            .declarations()
            .iter()
            .map(|d| d["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["echo", "stuck"]);
    }
}
