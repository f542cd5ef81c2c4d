//! Dialogue driver: one cycle per inbound message.
//!
//! Loads session history, picks model or fallback mode, obtains a direct
//! reply or a set of tool requests, dispatches them through the role gate,
//! and synthesizes a final reply. No failure mode escapes this layer; the
//! worst outcome for a turn is a generic help reply.

pub mod intent;
pub mod summarize;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::session::SessionStore;
use crate::tools::{parse_args, ToolRegistry};
use crate::traits::{CallerContext, CallerRole, ModelProvider, ToolTrace, TurnRole};

use intent::{IntentKind, ParsedIntent};

pub const HELP_REPLY: &str = "I didn't understand. Try: 'check Dr. Ahuja availability', \
     'book 2025-12-02T09:00 with Dr. Ahuja for John', or 'how many patients yesterday'.";

const REPORT_REFUSAL: &str =
    "Summary reports are only available to doctors. I can check availability or book an appointment for you.";

const SUGGESTED_SLOT_LIMIT: usize = 5;

/// Which path produced the turn's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyMode {
    Model,
    Fallback,
}

/// Caller-facing result of one turn.
#[derive(Debug, Serialize)]
pub struct TurnOutcome {
    pub session_id: String,
    pub reply: String,
    pub tool_calls: Vec<ToolTrace>,
    pub mode: ReplyMode,
}

pub struct Agent {
    provider: Option<Arc<dyn ModelProvider>>,
    model: String,
    system_prompt: String,
    registry: Arc<ToolRegistry>,
    sessions: Arc<SessionStore>,
    tool_timeout: Duration,
    /// Serializes turns within one session. Distinct sessions run in
    /// parallel; overlapping requests on the same session queue up so their
    /// user/assistant turns never interleave.
    turn_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Agent {
    pub fn new(
        provider: Option<Arc<dyn ModelProvider>>,
        model: String,
        system_prompt: String,
        registry: Arc<ToolRegistry>,
        sessions: Arc<SessionStore>,
        tool_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            model,
            system_prompt,
            registry,
            sessions,
            tool_timeout,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn turn_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.turn_locks.lock().await;
        Arc::clone(locks.entry(session_id.to_string()).or_default())
    }

    /// Handle one inbound message. Mode selection is re-evaluated per
    /// message: a transient provider outage degrades exactly one turn.
    pub async fn handle_message(
        &self,
        session_id: Option<&str>,
        text: &str,
        caller: &CallerContext,
    ) -> TurnOutcome {
        let session_id = match session_id {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => self.sessions.create().await,
        };
        let turn_lock = self.turn_lock(&session_id).await;
        let _turn = turn_lock.lock().await;

        self.sessions
            .append(&session_id, TurnRole::User, text)
            .await;

        let (reply, trace, mode) = match &self.provider {
            Some(provider) => match self
                .model_exchange(provider.as_ref(), &session_id, caller)
                .await
            {
                Ok((reply, trace)) => (reply, trace, ReplyMode::Model),
                Err(e) => {
                    warn!(%session_id, "Model exchange failed, degrading to fallback: {}", e);
                    let (reply, trace) = self.fallback_exchange(text, caller).await;
                    (reply, trace, ReplyMode::Fallback)
                }
            },
            None => {
                let (reply, trace) = self.fallback_exchange(text, caller).await;
                (reply, trace, ReplyMode::Fallback)
            }
        };

        self.sessions
            .append(&session_id, TurnRole::Assistant, &reply)
            .await;
        info!(
            %session_id,
            mode = ?mode,
            tool_calls = trace.len(),
            "Turn completed"
        );

        TurnOutcome {
            session_id,
            reply,
            tool_calls: trace,
            mode,
        }
    }

    /// Model-driven path: first exchange with role-filtered tool schemas,
    /// dispatch of every requested tool in order, then a second exchange for
    /// the narrative. An unusable second reply falls back to the
    /// deterministic summarizer; a failed *first* exchange propagates so the
    /// caller can degrade the whole turn.
    async fn model_exchange(
        &self,
        provider: &dyn ModelProvider,
        session_id: &str,
        caller: &CallerContext,
    ) -> anyhow::Result<(String, Vec<ToolTrace>)> {
        let mut messages = vec![json!({
            "role": "system",
            "content": self.system_prompt,
        })];
        // The window already contains the just-appended user turn.
        for turn in self.sessions.history(session_id).await {
            messages.push(json!({
                "role": turn.role.as_str(),
                "content": turn.content,
            }));
        }

        let tool_defs = self.registry.schemas_for_role(caller.role);
        let resp = provider.chat(&self.model, &messages, &tool_defs).await?;

        if resp.tool_calls.is_empty() {
            let reply = resp.content.unwrap_or_default().trim().to_string();
            if reply.is_empty() {
                return Ok((HELP_REPLY.to_string(), Vec::new()));
            }
            return Ok((reply, Vec::new()));
        }

        // Dispatch every requested call, in order, independently: one
        // failure cancels nothing.
        messages.push(json!({
            "role": "assistant",
            "content": resp.content,
            "tool_calls": resp.tool_calls.iter().map(|tc| json!({
                "id": tc.id,
                "type": "function",
                "function": { "name": tc.name, "arguments": tc.arguments },
            })).collect::<Vec<_>>(),
        }));

        let mut trace = Vec::new();
        for call in &resp.tool_calls {
            let args = parse_args(&call.arguments);
            let result = self
                .registry
                .dispatch(&call.name, &args, caller, self.tool_timeout)
                .await;
            messages.push(json!({
                "role": "tool",
                "tool_call_id": call.id,
                "content": result.to_string(),
            }));
            trace.push(ToolTrace {
                tool: call.name.clone(),
                args,
                result,
            });
        }

        let reply = match provider.chat(&self.model, &messages, &[]).await {
            Ok(second) => {
                let text = second.content.unwrap_or_default();
                if summarize::looks_like_tool_echo(&text) {
                    summarize::render_trace(&trace)
                } else {
                    text.trim().to_string()
                }
            }
            Err(e) => {
                warn!(session_id, "Second exchange failed, using summarizer: {}", e);
                summarize::render_trace(&trace)
            }
        };

        Ok((reply, trace))
    }

    /// Fallback path: deterministic intent parsing plus direct dispatch. The
    /// parser itself is pure; everything stateful happens here.
    async fn fallback_exchange(
        &self,
        text: &str,
        caller: &CallerContext,
    ) -> (String, Vec<ToolTrace>) {
        let parsed = intent::parse(text, Utc::now().date_naive());
        let mut trace = Vec::new();

        match parsed.kind {
            IntentKind::Unrecognized => (HELP_REPLY.to_string(), trace),

            IntentKind::Availability => {
                let Some(doctor) = resolve_doctor(&parsed, caller) else {
                    return (
                        "Which doctor would you like to check? Try 'check Dr. Ahuja availability'."
                            .to_string(),
                        trace,
                    );
                };
                let mut args = json!({
                    "doctor_name": doctor,
                    "start_date": parsed.date.to_string(),
                });
                if let Some(tod) = &parsed.time_of_day {
                    args["time_of_day"] = json!(tod);
                }
                let result = self
                    .registry
                    .dispatch("get_doctor_availability", &args, caller, self.tool_timeout)
                    .await;
                trace.push(ToolTrace {
                    tool: "get_doctor_availability".to_string(),
                    args,
                    result,
                });
                (summarize::render_trace(&trace), trace)
            }

            IntentKind::Report => {
                // Cheap pre-check: refuse before any dispatch. The gate in
                // the dispatcher would catch this too.
                if caller.role != CallerRole::Doctor {
                    return (REPORT_REFUSAL.to_string(), trace);
                }
                let Some(doctor) = resolve_doctor(&parsed, caller) else {
                    return (
                        "Which doctor should the report cover? Try 'how many patients yesterday, Dr. Ahuja'."
                            .to_string(),
                        trace,
                    );
                };
                let args = json!({
                    "doctor_name": doctor,
                    "ref_date": parsed.date.to_string(),
                    "send_notification": true,
                });
                let result = self
                    .registry
                    .dispatch("doctor_report", &args, caller, self.tool_timeout)
                    .await;
                trace.push(ToolTrace {
                    tool: "doctor_report".to_string(),
                    args,
                    result,
                });
                (summarize::render_trace(&trace), trace)
            }

            IntentKind::Booking => {
                let Some(doctor) = resolve_doctor(&parsed, caller) else {
                    return (
                        "Which doctor would you like to book? Try 'book 2025-12-02T09:00 with Dr. Ahuja for John'."
                            .to_string(),
                        trace,
                    );
                };
                match booking_window(&parsed) {
                    Some((start_iso, end_iso)) => {
                        let args = json!({
                            "doctor_name": doctor,
                            "patient_name": parsed.patient.clone().unwrap_or_else(|| "Patient".to_string()),
                            "start_iso": start_iso,
                            "end_iso": end_iso,
                            "reason": "Booked via assistant",
                        });
                        let result = self
                            .registry
                            .dispatch("book_appointment", &args, caller, self.tool_timeout)
                            .await;
                        trace.push(ToolTrace {
                            tool: "book_appointment".to_string(),
                            args,
                            result,
                        });
                        (summarize::render_trace(&trace), trace)
                    }
                    // No usable timestamp: never guess a time. Show the next
                    // open slots and ask the user to confirm one.
                    None => {
                        let args = json!({
                            "doctor_name": doctor,
                            "start_date": parsed.date.to_string(),
                        });
                        let result = self
                            .registry
                            .dispatch("get_doctor_availability", &args, caller, self.tool_timeout)
                            .await;
                        let reply = suggest_slots(&doctor, &result);
                        trace.push(ToolTrace {
                            tool: "get_doctor_availability".to_string(),
                            args,
                            result,
                        });
                        (reply, trace)
                    }
                }
            }
        }
    }
}

/// Doctor resolution order: named in the text, then the caller's bound
/// identity. No silent default: the caller gets a clarification instead.
fn resolve_doctor(parsed: &ParsedIntent, caller: &CallerContext) -> Option<String> {
    parsed
        .doctor
        .clone()
        .or_else(|| caller.doctor_name.clone())
}

/// Start/end ISO strings for a booking, from the literal timestamp token.
/// A 1-hour duration is assumed.
fn booking_window(parsed: &ParsedIntent) -> Option<(String, String)> {
    let token = parsed.start.as_deref()?;
    let start = NaiveDateTime::parse_from_str(token, "%Y-%m-%dT%H:%M").ok()?;
    let end = start + ChronoDuration::hours(1);
    Some((
        start.format("%Y-%m-%dT%H:%M:%S").to_string(),
        end.format("%Y-%m-%dT%H:%M:%S").to_string(),
    ))
}

fn suggest_slots(doctor: &str, availability: &Value) -> String {
    if availability["ok"] != true {
        return format!(
            "Error: {}",
            availability["error"].as_str().unwrap_or("unknown error")
        );
    }
    let slots: Vec<&str> = availability["available_slots"]
        .as_array()
        .map(|slots| {
            slots
                .iter()
                .take(SUGGESTED_SLOT_LIMIT)
                .filter_map(|s| s["start_iso"].as_str())
                .collect()
        })
        .unwrap_or_default();
    if slots.is_empty() {
        return format!("No available slots found to book for {}.", doctor);
    }
    format!(
        "I don't see a date and time in your request. Here are the next available slots for {}:\n{}\nReply 'book <YYYY-MM-DDTHH:MM>' to confirm one.",
        doctor,
        slots.join("\n")
    )
}
