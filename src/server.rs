//! HTTP surface. Token issuance and header parsing live upstream: requests
//! arrive with an already-resolved role and optional doctor identity.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::agent::{Agent, TurnOutcome};
use crate::session::SessionStore;
use crate::store::SchedulingStore;
use crate::tools::ToolRegistry;
use crate::traits::{CallerContext, CallerRole};

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub sessions: Arc<SessionStore>,
    pub registry: Arc<ToolRegistry>,
    pub store: Arc<SchedulingStore>,
    pub tool_timeout: std::time::Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/assist", post(assist))
        .route("/api/tool", post(invoke_tool))
        .route("/api/doctors", get(doctors))
        .route("/api/session/:id", get(session_dump))
        .route("/api/schema", get(schema))
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

#[derive(Debug, Deserialize)]
struct AssistRequest {
    session_id: Option<String>,
    message: String,
    #[serde(default)]
    role: CallerRole,
    doctor_name: Option<String>,
}

async fn assist(
    State(state): State<AppState>,
    Json(req): Json<AssistRequest>,
) -> Result<Json<TurnOutcome>, (StatusCode, Json<Value>)> {
    if req.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "message required"})),
        ));
    }

    let caller = CallerContext {
        role: req.role,
        doctor_name: req.doctor_name,
    };
    let outcome = state
        .agent
        .handle_message(req.session_id.as_deref(), &req.message, &caller)
        .await;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct ToolRequest {
    tool: String,
    #[serde(default)]
    args: Value,
    #[serde(default)]
    role: CallerRole,
    doctor_name: Option<String>,
}

/// Direct tool invocation, bypassing the dialogue driver. Goes through the
/// same registry dispatch as every other path, so the role gate and the
/// uniform error wrapping still apply.
async fn invoke_tool(
    State(state): State<AppState>,
    Json(req): Json<ToolRequest>,
) -> Json<Value> {
    let caller = CallerContext {
        role: req.role,
        doctor_name: req.doctor_name,
    };
    let args = if req.args.is_object() {
        req.args
    } else {
        json!({})
    };
    let result = state
        .registry
        .dispatch(&req.tool, &args, &caller, state.tool_timeout)
        .await;
    Json(result)
}

async fn doctors(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let docs = state.store.list_doctors().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
    })?;
    let doctors: Vec<Value> = docs
        .iter()
        .map(|d| {
            json!({
                "id": d.id,
                "name": d.name,
                "specialization": d.specialization,
            })
        })
        .collect();
    Ok(Json(json!({ "doctors": doctors })))
}

async fn session_dump(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<Value> {
    let history = state.sessions.history(&id).await;
    Json(json!({
        "session_id": id,
        "history": history,
    }))
}

async fn schema(State(state): State<AppState>) -> Json<Value> {
    Json(state.registry.catalogue())
}
