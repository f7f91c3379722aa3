// libs/scheduling-cell/tests/common/mod.rs
#![allow(dead_code)]

use serde_json::{json, Value};

use shared_config::AppConfig;

/// Config pointing the store at a mock server, with every optional
/// integration left unconfigured.
pub fn store_config(store_url: &str) -> AppConfig {
    AppConfig {
        store_url: store_url.to_string(),
        store_api_key: "test-key".to_string(),
        gemini_api_key: String::new(),
        gemini_model: "gemini-2.0-flash".to_string(),
        gemini_base_url: String::new(),
        sendgrid_api_key: String::new(),
        sendgrid_from_email: "noreply@clinic.test".to_string(),
        sendgrid_base_url: String::new(),
        slack_bot_token: String::new(),
        slack_channel_id: String::new(),
        slack_base_url: String::new(),
        google_calendar_token: String::new(),
        google_calendar_id: "primary".to_string(),
        google_calendar_base_url: String::new(),
        frontend_origin: "http://localhost:3000".to_string(),
        session_idle_minutes: 30,
        agent_max_steps: 6,
        slot_duration_minutes: 60,
    }
}

pub fn doctor_row() -> Value {
    json!({
        "id": 1,
        "name": "Dr. Ahuja",
        "email": "ahuja@clinic.test",
        "specialization": "General Medicine",
    })
}

pub fn patient_row() -> Value {
    json!({
        "id": 7,
        "name": "Asha Rao",
        "email": "asha@clinic.test",
    })
}

pub fn appointment_row(id: &str, scheduled_at: &str, status: &str) -> Value {
    json!({
        "id": id,
        "doctor_id": 1,
        "patient_id": 7,
        "scheduled_at": scheduled_at,
        "status": status,
        "notes": null,
        "condition": null,
        "calendar_event_id": null,
    })
}
