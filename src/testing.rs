//! Test infrastructure: MockProvider and a fully wired Agent harness.
//!
//! The harness exercises the real dialogue driver, registry, and scheduling
//! store; only the LLM is scripted.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::agent::Agent;
use crate::config::NotificationsConfig;
use crate::notify::Notifier;
use crate::session::SessionStore;
use crate::store::SchedulingStore;
use crate::tools::{BookAppointmentTool, DoctorReportTool, GetAvailabilityTool, ToolRegistry};
use crate::traits::{ModelProvider, ProviderResponse, Tool, ToolCall};

/// A recorded call to `MockProvider::chat()`.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct MockChatCall {
    pub model: String,
    pub messages: Vec<Value>,
    pub tools: Vec<Value>,
}

/// Mock LLM provider that returns scripted responses in FIFO order. An
/// exhausted queue yields a plain text response.
pub struct MockProvider {
    responses: Mutex<Vec<anyhow::Result<ProviderResponse>>>,
    pub call_log: Mutex<Vec<MockChatCall>>,
}

impl MockProvider {
    pub fn with_responses(responses: Vec<anyhow::Result<ProviderResponse>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_log: Mutex::new(Vec::new()),
        }
    }

    /// Helper: build a text-only ProviderResponse.
    pub fn text_response(text: &str) -> anyhow::Result<ProviderResponse> {
        Ok(ProviderResponse {
            content: Some(text.to_string()),
            tool_calls: vec![],
        })
    }

    /// Helper: build a tool-call ProviderResponse.
    pub fn tool_call_response(tool_name: &str, args: &str) -> anyhow::Result<ProviderResponse> {
        Ok(ProviderResponse {
            content: None,
            tool_calls: vec![ToolCall {
                id: format!("call_{}", uuid::Uuid::new_v4()),
                name: tool_name.to_string(),
                arguments: args.to_string(),
            }],
        })
    }

    pub fn failure(message: &str) -> anyhow::Result<ProviderResponse> {
        Err(anyhow::anyhow!("{}", message))
    }

    /// How many times `chat()` was called.
    pub async fn call_count(&self) -> usize {
        self.call_log.lock().await.len()
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    async fn chat(
        &self,
        model: &str,
        messages: &[Value],
        tools: &[Value],
    ) -> anyhow::Result<ProviderResponse> {
        self.call_log.lock().await.push(MockChatCall {
            model: model.to_string(),
            messages: messages.to_vec(),
            tools: tools.to_vec(),
        });

        let mut responses = self.responses.lock().await;
        if responses.is_empty() {
            MockProvider::text_response("Mock response")
        } else {
            responses.remove(0)
        }
    }
}

/// A wired agent plus the handles tests poke at directly.
pub struct TestHarness {
    pub agent: Agent,
    pub store: Arc<SchedulingStore>,
    pub sessions: Arc<SessionStore>,
    _db_file: tempfile::NamedTempFile,
}

pub async fn harness(provider: Option<Arc<MockProvider>>) -> TestHarness {
    let db_file = tempfile::NamedTempFile::new().unwrap();
    let store = Arc::new(
        SchedulingStore::new(db_file.path().to_str().unwrap())
            .await
            .unwrap(),
    );
    store
        .seed_doctors(&["Dr. Ahuja".to_string(), "Dr. Mehta".to_string()])
        .await
        .unwrap();

    let notifier = Arc::new(Notifier::new(NotificationsConfig::default()));
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(GetAvailabilityTool::new(Arc::clone(&store), 9, 17, 60)),
        Arc::new(BookAppointmentTool::new(
            Arc::clone(&store),
            Arc::clone(&notifier),
        )),
        Arc::new(DoctorReportTool::new(
            Arc::clone(&store),
            Arc::clone(&notifier),
        )),
    ];
    let registry = Arc::new(ToolRegistry::new(tools));
    let sessions = Arc::new(SessionStore::new(20));

    let provider = provider.map(|p| p as Arc<dyn ModelProvider>);
    let agent = Agent::new(
        provider,
        "mock-model".to_string(),
        "You are a test assistant.".to_string(),
        Arc::clone(&registry),
        Arc::clone(&sessions),
        Duration::from_secs(5),
    );

    TestHarness {
        agent,
        store,
        sessions,
        _db_file: db_file,
    }
}
