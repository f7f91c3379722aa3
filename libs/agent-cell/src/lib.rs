pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use services::orchestrator::AgentOrchestrator;
pub use services::planner::{GeminiPlanner, Planner, PlannerDecision, ToolCall};
pub use services::registry::{Tool, ToolRegistry};
pub use services::session::SessionStore;
