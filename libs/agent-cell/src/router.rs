// libs/agent-cell/src/router.rs
use std::sync::Arc;

use axum::{routing::post, Router};

use crate::handlers;
use crate::services::orchestrator::AgentOrchestrator;

pub fn agent_routes(orchestrator: Arc<AgentOrchestrator>) -> Router {
    Router::new()
        .route("/api/chat", post(handlers::chat))
        .route("/api/doctor-report", post(handlers::doctor_report))
        .with_state(orchestrator)
}
