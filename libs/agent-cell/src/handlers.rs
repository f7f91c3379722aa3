// libs/agent-cell/src/handlers.rs
use std::sync::Arc;

use axum::{extract::State, Json};
use tracing::debug;

use shared_models::error::AppError;

use crate::models::{ChatRequest, ChatResponse, DoctorReportRequest};
use crate::services::orchestrator::AgentOrchestrator;

/// Patient or doctor natural-language prompt; returns the agent reply.
/// Multi-turn via session_id. Agent failures surface as an apologetic
/// reply in a 200 response; only a malformed request gets an error status.
pub async fn chat(
    State(orchestrator): State<Arc<AgentOrchestrator>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if request.prompt.trim().is_empty() {
        return Err(AppError::ValidationError(
            "prompt must not be empty".to_string(),
        ));
    }

    debug!(
        "chat request: role={:?} session={:?}",
        request.role, request.session_id
    );
    Ok(Json(orchestrator.chat(request).await))
}

/// Doctor asks for a summary (e.g. how many patients yesterday); the agent
/// gathers stats with tools and pushes the report through the notification
/// chain.
pub async fn doctor_report(
    State(orchestrator): State<Arc<AgentOrchestrator>>,
    Json(request): Json<DoctorReportRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if request.prompt.trim().is_empty() {
        return Err(AppError::ValidationError(
            "prompt must not be empty".to_string(),
        ));
    }

    debug!("doctor report request: session={:?}", request.session_id);
    Ok(Json(orchestrator.doctor_report(request).await))
}
