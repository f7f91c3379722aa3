// libs/agent-cell/src/services/orchestrator.rs
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use notification_cell::services::dispatcher::NotificationDispatcher;
use notification_cell::services::email::EmailService;
use scheduling_cell::parse::parse_date_str;
use scheduling_cell::BookingService;
use shared_config::AppConfig;

use crate::models::{ChatRequest, ChatResponse, ChatRole, DoctorReportRequest, Turn};
use crate::services::planner::{GeminiPlanner, Planner, PlannerDecision, PlannerError, ToolCall};
use crate::services::registry::ToolRegistry;
use crate::services::session::SessionStore;
use crate::services::tools::{build_registry, SEND_DOCTOR_REPORT};

/// Deterministic reply when the planning loop exhausts its step bound or
/// the model call fails mid-turn.
const FALLBACK_REPLY: &str =
    "I wasn't able to complete that request. Please rephrase or try again.";

const NOT_CONFIGURED_REPLY: &str =
    "The assistant is not configured yet. Set GEMINI_API_KEY and restart the server.";

const SYSTEM_PATIENT_BASE: &str = r#"You are an appointment booking assistant. The user is a patient.
- Use list_doctors() when the user asks what doctors are available, who can I book with, or similar. Then you can name them and suggest checking availability.
- Use list_my_appointments(patient_email) to see the patient's upcoming appointments. You MUST have the signed-in patient's email to call this; if you were not given the patient's email at the start, say: "I need you to be signed in to see your appointments. Please refresh the page and try again."
- Use get_doctor_availability(doctor_name, date_str) to check slots. For date_str use YYYY-MM-DD, or the word "tomorrow" or "today" if the user says that.
- Use book_appointment(doctor_name, slot_time, date_str, patient_name, patient_email, notes, condition) to book. When the user confirms a slot (e.g. "Book the 10:00 slot" or "Yes"), call book_appointment immediately. Do NOT require condition or notes to book. slot_time: "2pm", "14:00", "2:00 PM" all work. Do not call book_appointment again for the same doctor/date/slot.
- If a tool reports an error, tell the user the exact message from the result. Do not say "there was an error" without quoting the message; do not ask for condition or notes again.
- After a successful booking, confirm to the user. Always reply with a short, friendly message after calling tools."#;

const SYSTEM_DOCTOR_BASE: &str = r#"You are a doctor's schedule and stats assistant.
- Use get_doctor_stats(doctor_name, query_type, condition_filter) to get: visits_yesterday, appointments_today, appointments_tomorrow, or patients_with_condition (use condition_filter e.g. fever).
- Use get_doctor_availability(doctor_name, date_str) to see the doctor's free slots on a date (e.g. "tomorrow" or YYYY-MM-DD).
- Use send_doctor_report(channel, report_text, recipient_email) to send the summary. Always use channel "slack"; the delivery chain falls back to email and the in-app log on its own. Do NOT ask the user which channel they prefer.
- Summarize the stats in a human-readable report, then send it via send_doctor_report.
- Reply with the report summary and confirm that the report was sent."#;

/// The control loop: receives a prompt, asks the planner for the next
/// action, executes tool calls through the registry, feeds observations
/// back, and stops at a final reply or the step bound. Nothing in here is
/// fatal; every failure resolves to a user-visible reply.
pub struct AgentOrchestrator {
    planner: Arc<dyn Planner>,
    registry: Arc<ToolRegistry>,
    sessions: Arc<SessionStore>,
    max_steps: u32,
}

impl AgentOrchestrator {
    pub fn new(
        planner: Arc<dyn Planner>,
        registry: Arc<ToolRegistry>,
        sessions: Arc<SessionStore>,
        max_steps: u32,
    ) -> Self {
        Self {
            planner,
            registry,
            sessions,
            max_steps: max_steps.max(1),
        }
    }

    /// Wires the full production stack from configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        let booking = Arc::new(BookingService::new(config));
        let email = EmailService::new(config);
        let dispatcher = Arc::new(NotificationDispatcher::new(config, email.clone()));
        let registry = Arc::new(build_registry(booking, dispatcher, email));

        Self::new(
            Arc::new(GeminiPlanner::new(config)),
            registry,
            Arc::new(SessionStore::new(config.session_idle_minutes)),
            config.agent_max_steps,
        )
    }

    pub fn sessions(&self) -> Arc<SessionStore> {
        self.sessions.clone()
    }

    /// Patient or doctor prompt through the planning loop. Multi-turn via
    /// session_id; an absent or unknown id starts a fresh session.
    pub async fn chat(&self, request: ChatRequest) -> ChatResponse {
        let system = match request.role {
            ChatRole::Patient => {
                patient_system(request.patient_name.as_deref(), request.patient_email.as_deref())
            }
            ChatRole::Doctor => doctor_system(None, None),
        };

        self.run_turn(request.session_id, &request.prompt, system, None)
            .await
    }

    /// Doctor-facing entry point: stats, availability and report delivery.
    /// The signed-in doctor's email rides along so the report chain's email
    /// hop has an address even when the model omits it.
    pub async fn doctor_report(&self, request: DoctorReportRequest) -> ChatResponse {
        let system = doctor_system(
            request.doctor_name.as_deref(),
            request.doctor_email.as_deref(),
        );
        let recipient = request
            .doctor_email
            .filter(|email| !email.trim().is_empty());

        self.run_turn(request.session_id, &request.prompt, system, recipient)
            .await
    }

    async fn run_turn(
        &self,
        session_id: Option<String>,
        prompt: &str,
        mut system: String,
        report_recipient: Option<String>,
    ) -> ChatResponse {
        let (id, turns, context) = self.sessions.begin_turn(session_id, prompt).await;

        if let Some(summary) = context.summary() {
            system.push_str(&format!(
                "\n- Already resolved earlier in this conversation: {}. Reuse these values when the user does not restate them.",
                summary
            ));
        }

        let reply = self
            .run_loop(&id, &system, turns, report_recipient.as_deref())
            .await;
        self.sessions.complete_turn(&id, &reply).await;

        ChatResponse {
            reply,
            session_id: id,
        }
    }

    async fn run_loop(
        &self,
        session_id: &str,
        system: &str,
        mut turns: Vec<Turn>,
        report_recipient: Option<&str>,
    ) -> String {
        let declarations = self.registry.declarations();

        for step in 1..=self.max_steps {
            debug!("Planning step {}/{} for session {}", step, self.max_steps, session_id);

            let decision = match self.planner.plan(system, &turns, &declarations).await {
                Ok(decision) => decision,
                Err(PlannerError::NotConfigured) => return NOT_CONFIGURED_REPLY.to_string(),
                Err(e) => {
                    // Model timeout or transport failure aborts the step and
                    // ends the loop deterministically.
                    warn!("Planner failed on step {}: {}", step, e);
                    return FALLBACK_REPLY.to_string();
                }
            };

            match decision {
                PlannerDecision::Reply(text) => {
                    info!("Session {} replied after {} step(s)", session_id, step);
                    return text;
                }
                PlannerDecision::ToolCalls(calls) => {
                    // Sequential, in the order given; one call failing does
                    // not stop the rest.
                    for call in calls {
                        let observation =
                            self.execute_call(session_id, &call, report_recipient).await;
                        let turn = Turn::tool(observation.to_string());
                        self.sessions.append(session_id, turn.clone()).await;
                        turns.push(turn);
                    }
                }
            }
        }

        warn!(
            "Session {} hit the {}-step bound without a reply",
            session_id, self.max_steps
        );
        FALLBACK_REPLY.to_string()
    }

    async fn execute_call(
        &self,
        session_id: &str,
        call: &ToolCall,
        report_recipient: Option<&str>,
    ) -> Value {
        let mut args = call.args.clone();

        // The model rarely passes recipient_email itself; the signed-in
        // doctor's address backfills it so the email hop can deliver.
        if call.name == SEND_DOCTOR_REPORT {
            if let Some(recipient) = report_recipient {
                let missing = args
                    .get("recipient_email")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .is_none();
                if missing {
                    if let Some(map) = args.as_object_mut() {
                        map.insert("recipient_email".to_string(), json!(recipient));
                    }
                }
            }
        }

        match self.registry.invoke(&call.name, args).await {
            Ok(result) => {
                self.remember_entities(session_id, call).await;
                json!({"tool": call.name, "result": result})
            }
            Err(e) => {
                warn!("Tool {} failed: {}", call.name, e);
                json!({
                    "tool": call.name,
                    "error": {"kind": e.kind(), "message": e.to_string()},
                })
            }
        }
    }

    /// Carries doctor/date/slot from successful tool calls into the session
    /// context so later elliptical turns resolve against them. Date words
    /// are pinned to the calendar day they resolved to; "tomorrow" stored
    /// literally would shift meaning in a session resumed the next day.
    async fn remember_entities(&self, session_id: &str, call: &ToolCall) {
        let arg = |field: &str| {
            call.args
                .get(field)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        let doctor_name = arg("doctor_name");
        let date = arg("date_str")
            .map(|raw| parse_date_str(&raw).map(|d| d.to_string()).unwrap_or(raw));
        let slot_time = arg("slot_time");

        if doctor_name.is_some() || date.is_some() || slot_time.is_some() {
            self.sessions
                .update_context(session_id, doctor_name, date, slot_time)
                .await;
        }
    }
}

fn patient_system(patient_name: Option<&str>, patient_email: Option<&str>) -> String {
    match (patient_name, patient_email) {
        (Some(name), Some(email)) => format!(
            "{}\n- The current signed-in patient is: name=\"{name}\", email=\"{email}\". When the user asks for their appointments, call list_my_appointments with this EXACT email: \"{email}\". When calling book_appointment, ALWAYS use this patient_name and patient_email; do NOT ask the user for their name or email. Only ask for notes and/or condition (reason for visit) if you need them for the booking.",
            SYSTEM_PATIENT_BASE
        ),
        _ => SYSTEM_PATIENT_BASE.to_string(),
    }
}

fn doctor_system(doctor_name: Option<&str>, doctor_email: Option<&str>) -> String {
    match doctor_name {
        Some(name) => format!(
            "{}\n- The current signed-in doctor is: name=\"{name}\", email=\"{email}\". When calling get_doctor_stats, get_doctor_availability, or send_doctor_report, ALWAYS use this doctor_name; do NOT ask the user for their name or email.",
            SYSTEM_DOCTOR_BASE,
            email = doctor_email.unwrap_or_default()
        ),
        None => SYSTEM_DOCTOR_BASE.to_string(),
    }
}
