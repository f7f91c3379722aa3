use std::sync::Arc;

use axum::{
    routing::get,
    Json, Router,
};
use serde_json::json;

use agent_cell::router::agent_routes;
use agent_cell::AgentOrchestrator;

pub fn create_router(orchestrator: Arc<AgentOrchestrator>) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "ok"})) }))
        .merge(agent_routes(orchestrator))
}
