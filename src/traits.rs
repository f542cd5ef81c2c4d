use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A single turn in a session's conversation window.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

/// A single tool call as returned by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String, // JSON string
}

/// The LLM's response: either content text, tool calls, or both.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

/// Model provider — sends messages + tool defs to an LLM, gets back a response.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn chat(
        &self,
        model: &str,
        messages: &[Value],
        tools: &[Value],
    ) -> anyhow::Result<ProviderResponse>;
}

/// Role attached to an inbound request by the authentication layer upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallerRole {
    Patient,
    Doctor,
    #[default]
    Unauthenticated,
}

impl fmt::Display for CallerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallerRole::Patient => write!(f, "patient"),
            CallerRole::Doctor => write!(f, "doctor"),
            CallerRole::Unauthenticated => write!(f, "unauthenticated"),
        }
    }
}

/// Caller identity, supplied per request. The orchestrator never mutates it.
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    pub role: CallerRole,
    /// For doctor callers: the doctor they act as. Used when a request
    /// names no doctor explicitly.
    pub doctor_name: Option<String>,
}

/// Role a tool requires from its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleRequirement {
    /// Any caller, including unauthenticated ones.
    Any,
    /// Exact role match. No hierarchy: a doctor is not "more than" a patient.
    Role(CallerRole),
}

impl RoleRequirement {
    pub fn allows(&self, role: CallerRole) -> bool {
        match self {
            RoleRequirement::Any => true,
            RoleRequirement::Role(required) => *required == role,
        }
    }

    pub fn label(&self) -> String {
        match self {
            RoleRequirement::Any => "any".to_string(),
            RoleRequirement::Role(r) => r.to_string(),
        }
    }
}

/// Tool trait — schedule-facing operations the model (or the fallback
/// parser) can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// Returns the OpenAI-format function schema as a JSON Value.
    fn schema(&self) -> Value;
    /// Role required to invoke this tool. Enforced before dispatch and when
    /// advertising schemas to the model.
    fn required_role(&self) -> RoleRequirement {
        RoleRequirement::Any
    }
    /// Execute with parsed JSON arguments. Returns a JSON object carrying
    /// `ok`; domain failures (unknown doctor, taken slot) come back as
    /// `Ok` values with `ok: false`, reserving `Err` for infrastructure.
    async fn call(&self, args: &Value) -> anyhow::Result<Value>;
}

/// One entry of the per-turn tool-call trace returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ToolTrace {
    pub tool: String,
    pub args: Value,
    pub result: Value,
}
