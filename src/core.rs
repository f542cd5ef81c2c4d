use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::agent::Agent;
use crate::config::AppConfig;
use crate::notify::Notifier;
use crate::providers::OpenAiCompatibleProvider;
use crate::server::{self, AppState};
use crate::session::SessionStore;
use crate::store::SchedulingStore;
use crate::tools::{BookAppointmentTool, DoctorReportTool, GetAvailabilityTool, ToolRegistry};
use crate::traits::{ModelProvider, Tool};

const SYSTEM_PROMPT: &str = "You are an assistant for a medical appointment system. \
    You may call tools to check availability, book appointments, or fetch doctor reports. \
    When a tool is needed, call it through the tools API; after tool output is provided, \
    produce a short, human-friendly summary for the user. \
    Use ISO datetimes for start_iso/end_iso.";

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    // 1. Scheduling store
    let store = Arc::new(SchedulingStore::new(&config.scheduling.db_path).await?);
    let seeded = store.seed_doctors(&config.scheduling.seed_doctors).await?;
    info!(
        seeded,
        "Scheduling store initialized ({})", config.scheduling.db_path
    );

    // 2. Notifications
    let notifier = Arc::new(Notifier::new(config.notifications.clone()));
    if notifier.has_webhook() {
        info!("Chat webhook notifications enabled");
    }

    // 3. Tools
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(GetAvailabilityTool::new(
            Arc::clone(&store),
            config.scheduling.open_hour,
            config.scheduling.close_hour,
            config.scheduling.slot_minutes,
        )),
        Arc::new(BookAppointmentTool::new(
            Arc::clone(&store),
            Arc::clone(&notifier),
        )),
        Arc::new(DoctorReportTool::new(
            Arc::clone(&store),
            Arc::clone(&notifier),
        )),
    ];
    for tool in &tools {
        info!(
            name = tool.name(),
            required_role = %tool.required_role().label(),
            "Registered tool"
        );
    }
    let registry = Arc::new(ToolRegistry::new(tools));

    // 4. Provider — optional. Without one the daemon runs every turn in
    // deterministic fallback mode.
    let provider: Option<Arc<dyn ModelProvider>> = if config.provider.api_key.is_empty() {
        info!("No provider API key configured; running in fallback mode");
        None
    } else {
        info!(model = %config.provider.model, "Model provider configured");
        Some(Arc::new(OpenAiCompatibleProvider::new(
            &config.provider.base_url,
            &config.provider.api_key,
            Duration::from_secs(config.provider.request_timeout_secs),
        )?))
    };

    // 5. Sessions + agent
    let sessions = Arc::new(SessionStore::new(config.session.history_cap));
    let agent = Arc::new(Agent::new(
        provider,
        config.provider.model.clone(),
        SYSTEM_PROMPT.to_string(),
        Arc::clone(&registry),
        Arc::clone(&sessions),
        Duration::from_secs(config.agent.tool_timeout_secs),
    ));

    // 6. API server (blocks)
    server::serve(
        AppState {
            agent,
            sessions,
            registry,
            store,
            tool_timeout: Duration::from_secs(config.agent.tool_timeout_secs),
        },
        config.server.port,
    )
    .await
}
