// libs/agent-cell/src/models.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;

use scheduling_cell::SchedulingError;

// ==============================================================================
// CHAT API MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    Patient,
    Doctor,
}

impl Default for ChatRole {
    fn default() -> Self {
        ChatRole::Patient
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    pub session_id: Option<String>,
    #[serde(default)]
    pub role: ChatRole,
    pub patient_name: Option<String>,
    pub patient_email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorReportRequest {
    pub prompt: String,
    pub session_id: Option<String>,
    pub doctor_name: Option<String>,
    pub doctor_email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub session_id: String,
}

// ==============================================================================
// CONVERSATION TURNS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
    /// A tool observation fed back into the planning loop.
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Tool,
            content: content.into(),
        }
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

/// Failures a tool invocation can produce. Every variant is recoverable:
/// the orchestrator feeds it back to the model as an observation and the
/// loop continues until the step bound.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Tool timed out after {0}s")]
    Timeout(u64),
}

impl ToolError {
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::Validation(_) => "validation_error",
            ToolError::NotFound(_) => "not_found",
            ToolError::Conflict(_) => "conflict",
            ToolError::ExternalService(_) => "external_service_error",
            ToolError::Timeout(_) => "timeout",
        }
    }
}

impl From<SchedulingError> for ToolError {
    fn from(e: SchedulingError) -> Self {
        match e {
            SchedulingError::DoctorNotFound(_)
            | SchedulingError::PatientNotFound
            | SchedulingError::AppointmentNotFound(_) => ToolError::NotFound(e.to_string()),
            SchedulingError::SlotUnavailable { .. } | SchedulingError::SlotTaken => {
                ToolError::Conflict(e.to_string())
            }
            SchedulingError::InvalidDateTime(_) | SchedulingError::TerminalStatus(_) => {
                ToolError::Validation(e.to_string())
            }
            SchedulingError::Database(_) | SchedulingError::ExternalService(_) => {
                ToolError::ExternalService(e.to_string())
            }
        }
    }
}
