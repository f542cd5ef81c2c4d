mod availability;
mod booking;
mod dispatch;
mod report;

pub use availability::GetAvailabilityTool;
pub use booking::BookAppointmentTool;
pub use dispatch::parse_args;
pub use report::DoctorReportTool;

use std::sync::Arc;

use serde_json::{json, Value};

use crate::traits::{CallerRole, Tool};

/// Static catalogue of invocable tools, built once at startup.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// OpenAI-format tool definitions, filtered by caller role. A tool the
    /// caller may not invoke is never advertised to the model; the dispatch
    /// gate re-checks anyway.
    pub fn schemas_for_role(&self, role: CallerRole) -> Vec<Value> {
        self.tools
            .iter()
            .filter(|t| t.required_role().allows(role))
            .map(|t| {
                json!({
                    "type": "function",
                    "function": t.schema(),
                })
            })
            .collect()
    }

    /// Discovery catalogue for the HTTP schema endpoint.
    pub fn catalogue(&self) -> Value {
        let tools: Vec<Value> = self
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name(),
                    "description": t.description(),
                    "required_role": t.required_role().label(),
                    "parameters": t.schema()["parameters"],
                })
            })
            .collect();
        json!({ "tools": tools })
    }
}
