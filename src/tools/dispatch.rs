//! Tool dispatch: name lookup, authorization gate, invocation, and uniform
//! error wrapping. Nothing raised by a tool escapes this layer; both the
//! model-driven flow and the fallback parser rely on always getting a JSON
//! result back.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::warn;

use super::ToolRegistry;
use crate::traits::CallerContext;

/// Parse a raw argument payload from the model. Anything that is not a JSON
/// object degrades to an empty argument set rather than aborting the turn.
pub fn parse_args(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => value,
        _ => json!({}),
    }
}

fn error_result(message: String) -> Value {
    json!({ "ok": false, "error": message })
}

impl ToolRegistry {
    /// Resolve and invoke a tool on behalf of a caller. Returns a JSON object
    /// that always carries a consistent `ok` flag:
    /// - unknown name: structured unknown-tool error
    /// - role check failure: structured forbidden error (the operation is
    ///   never invoked)
    /// - tool failure or timeout: structured error carrying the message
    pub async fn dispatch(
        &self,
        name: &str,
        args: &Value,
        caller: &CallerContext,
        timeout: Duration,
    ) -> Value {
        let Some(tool) = self.get(name) else {
            return error_result(format!("Unknown tool '{}'", name));
        };

        let requirement = tool.required_role();
        if !requirement.allows(caller.role) {
            warn!(
                tool = name,
                caller_role = %caller.role,
                required = %requirement.label(),
                "Tool dispatch forbidden"
            );
            return error_result(format!(
                "Tool '{}' requires role '{}'",
                name,
                requirement.label()
            ));
        }

        match tokio::time::timeout(timeout, tool.call(args)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(tool = name, "Tool call failed: {}", e);
                error_result(e.to_string())
            }
            Err(_) => {
                warn!(
                    tool = name,
                    timeout_secs = timeout.as_secs(),
                    "Tool call timed out"
                );
                error_result(format!(
                    "Tool '{}' timed out after {}s",
                    name,
                    timeout.as_secs()
                ))
            }
        }
    }
}
