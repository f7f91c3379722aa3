// libs/agent-cell/src/services/tools.rs
//
// The seven capabilities exposed to the model. Each tool is a thin adapter:
// argument plumbing on the way in, JSON shaping on the way out. All domain
// logic lives in the scheduling and notification cells.
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use notification_cell::models::NotificationRequest;
use notification_cell::services::dispatcher::NotificationDispatcher;
use notification_cell::services::email::EmailService;
use scheduling_cell::parse::parse_date_str;
use scheduling_cell::{BookAppointmentRequest, BookingService, StatsQuery};

use crate::models::ToolError;
use crate::services::registry::{Tool, ToolRegistry};

/// Name of the report tool; the orchestrator backfills its recipient from
/// the signed-in doctor.
pub const SEND_DOCTOR_REPORT: &str = "send_doctor_report";

/// Builds the full registry backed by the given services.
pub fn build_registry(
    booking: Arc<BookingService>,
    dispatcher: Arc<NotificationDispatcher>,
    email: EmailService,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ListDoctorsTool {
        booking: booking.clone(),
    }));
    registry.register(Arc::new(GetDoctorAvailabilityTool {
        booking: booking.clone(),
    }));
    registry.register(Arc::new(BookAppointmentTool {
        booking: booking.clone(),
    }));
    registry.register(Arc::new(ListMyAppointmentsTool {
        booking: booking.clone(),
    }));
    registry.register(Arc::new(SendEmailConfirmationTool { email }));
    registry.register(Arc::new(GetDoctorStatsTool { booking }));
    registry.register(Arc::new(SendDoctorReportTool { dispatcher }));
    registry
}

fn str_arg<'a>(args: &'a Value, field: &str) -> &'a str {
    args.get(field).and_then(Value::as_str).unwrap_or_default()
}

fn optional_str_arg(args: &Value, field: &str) -> Option<String> {
    args.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

pub struct ListDoctorsTool {
    booking: Arc<BookingService>,
}

#[async_trait]
impl Tool for ListDoctorsTool {
    fn name(&self) -> &str {
        "list_doctors"
    }

    fn description(&self) -> &str {
        "List all doctors with name, email and specialization"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}, "required": []})
    }

    async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
        let doctors = self.booking.directory().list_doctors().await?;
        let out: Vec<Value> = doctors
            .into_iter()
            .map(|d| {
                json!({
                    "name": d.name,
                    "email": d.email,
                    "specialization": d.specialization.unwrap_or_default(),
                })
            })
            .collect();
        Ok(json!(out))
    }
}

pub struct GetDoctorAvailabilityTool {
    booking: Arc<BookingService>,
}

#[async_trait]
impl Tool for GetDoctorAvailabilityTool {
    fn name(&self) -> &str {
        "get_doctor_availability"
    }

    fn description(&self) -> &str {
        "Free slot start times (HH:MM) for a doctor on a date. date_str accepts today, tomorrow, or YYYY-MM-DD"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "doctor_name": {"type": "string", "description": "Doctor name, partial match allowed"},
                "date_str": {"type": "string", "description": "today, tomorrow, or YYYY-MM-DD"},
            },
            "required": ["doctor_name", "date_str"],
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let date_str = str_arg(&args, "date_str");
        let date = parse_date_str(date_str).ok_or_else(|| {
            ToolError::Validation(format!(
                "Invalid date '{}'. Use today, tomorrow, or YYYY-MM-DD.",
                date_str
            ))
        })?;

        let doctor = self
            .booking
            .directory()
            .find_doctor_by_name(str_arg(&args, "doctor_name"))
            .await?;
        let slots = self
            .booking
            .availability()
            .available_start_times(&doctor, date)
            .await?;

        Ok(json!({"doctor": doctor.name, "date": date.to_string(), "slots": slots}))
    }
}

pub struct BookAppointmentTool {
    booking: Arc<BookingService>,
}

#[async_trait]
impl Tool for BookAppointmentTool {
    fn name(&self) -> &str {
        "book_appointment"
    }

    fn description(&self) -> &str {
        "Book an appointment for a signed-in patient. Fails if the slot is taken"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "doctor_name": {"type": "string"},
                "slot_time": {"type": "string", "description": "HH:MM, 2pm, or 2:00 PM"},
                "date_str": {"type": "string", "description": "today, tomorrow, or YYYY-MM-DD"},
                "patient_name": {"type": "string"},
                "patient_email": {"type": "string"},
                "notes": {"type": "string"},
                "condition": {"type": "string"},
            },
            "required": ["doctor_name", "slot_time", "date_str", "patient_name", "patient_email"],
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let request = BookAppointmentRequest {
            doctor_name: str_arg(&args, "doctor_name").to_string(),
            slot_time: str_arg(&args, "slot_time").to_string(),
            date_str: str_arg(&args, "date_str").to_string(),
            patient_name: str_arg(&args, "patient_name").to_string(),
            patient_email: str_arg(&args, "patient_email").to_string(),
            notes: optional_str_arg(&args, "notes"),
            condition: optional_str_arg(&args, "condition"),
        };

        let outcome = self.booking.book_appointment(request).await?;

        Ok(json!({
            "success": true,
            "message": format!(
                "Booked {} with {}.",
                outcome.appointment.scheduled_at.to_rfc3339(),
                outcome.doctor_name
            ),
            "appointment_id": outcome.appointment.id,
            "calendar_synced": outcome.calendar_synced,
            "email_sent": outcome.email_sent,
            "detail": outcome.detail,
        }))
    }
}

pub struct ListMyAppointmentsTool {
    booking: Arc<BookingService>,
}

#[async_trait]
impl Tool for ListMyAppointmentsTool {
    fn name(&self) -> &str {
        "list_my_appointments"
    }

    fn description(&self) -> &str {
        "Upcoming scheduled appointments for a patient, soonest first"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "patient_email": {"type": "string"},
            },
            "required": ["patient_email"],
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let summaries = self
            .booking
            .list_appointments(str_arg(&args, "patient_email"), None)
            .await?;
        let out: Vec<Value> = summaries
            .into_iter()
            .map(|s| {
                json!({
                    "doctor": s.doctor,
                    "date": s.date.to_string(),
                    "time": s.time,
                    "notes": s.notes,
                    "condition": s.condition,
                })
            })
            .collect();
        Ok(json!(out))
    }
}

pub struct SendEmailConfirmationTool {
    email: EmailService,
}

#[async_trait]
impl Tool for SendEmailConfirmationTool {
    fn name(&self) -> &str {
        "send_email_confirmation"
    }

    fn description(&self) -> &str {
        "Send a confirmation email to a patient"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "to": {"type": "string"},
                "subject": {"type": "string"},
                "body": {"type": "string"},
            },
            "required": ["to", "subject", "body"],
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let sent = self
            .email
            .send_confirmation_email(
                str_arg(&args, "to"),
                str_arg(&args, "subject"),
                str_arg(&args, "body"),
            )
            .await
            .map_err(|e| ToolError::ExternalService(e.to_string()))?;

        Ok(json!({
            "success": sent,
            "message": if sent { "Email sent." } else { "Email stubbed (provider not configured)." },
        }))
    }
}

pub struct GetDoctorStatsTool {
    booking: Arc<BookingService>,
}

#[async_trait]
impl Tool for GetDoctorStatsTool {
    fn name(&self) -> &str {
        "get_doctor_stats"
    }

    fn description(&self) -> &str {
        "Aggregate counts for a doctor: visits_yesterday, appointments_today, appointments_tomorrow, or patients_with_condition"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "doctor_name": {"type": "string"},
                "query_type": {"type": "string", "description": "visits_yesterday | appointments_today | appointments_tomorrow | patients_with_condition"},
                "condition_filter": {"type": "string", "description": "Required for patients_with_condition, e.g. fever"},
            },
            "required": ["doctor_name", "query_type"],
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let query_type = str_arg(&args, "query_type");
        let query = StatsQuery::parse(query_type).ok_or_else(|| {
            ToolError::Validation(format!("Unknown query_type '{}'", query_type))
        })?;
        let condition_filter = optional_str_arg(&args, "condition_filter");

        let stats = self
            .booking
            .doctor_stats(
                str_arg(&args, "doctor_name"),
                query,
                condition_filter.as_deref(),
            )
            .await?;

        let mut out = serde_json::Map::new();
        out.insert("doctor".to_string(), json!(stats.doctor));
        out.insert(stats.query, json!(stats.count));
        if let Some(condition) = stats.condition {
            out.insert("condition".to_string(), json!(condition));
        }
        Ok(Value::Object(out))
    }
}

pub struct SendDoctorReportTool {
    dispatcher: Arc<NotificationDispatcher>,
}

#[async_trait]
impl Tool for SendDoctorReportTool {
    fn name(&self) -> &str {
        SEND_DOCTOR_REPORT
    }

    fn description(&self) -> &str {
        "Deliver a report to the doctor's channels, falling back from chat to email to the in-app log"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel": {"type": "string", "description": "Preferred channel, e.g. slack"},
                "report_text": {"type": "string"},
                "recipient_email": {"type": "string", "description": "Doctor's email for the email fallback"},
            },
            "required": ["channel", "report_text"],
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let mut request =
            NotificationRequest::new("Doctor report", str_arg(&args, "report_text"));
        if let Some(recipient) = optional_str_arg(&args, "recipient_email") {
            request = request.with_recipient(recipient);
        }
        let report = self.dispatcher.send(&request).await;

        Ok(json!({
            "success": report.delivered,
            "channel": report.delivered_via(),
            "message": if report.delivered { "Report sent." } else { "Failed." },
            "attempts": report.attempts,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notification_cell::models::NotificationError;
    use notification_cell::services::channels::NotificationChannel;
    use tokio::sync::Mutex;

    struct RecordingChannel {
        seen: Mutex<Vec<NotificationRequest>>,
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        fn name(&self) -> &str {
            "recorder"
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn deliver(
            &self,
            request: &NotificationRequest,
        ) -> Result<(), NotificationError> {
            self.seen.lock().await.push(request.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn report_recipient_reaches_the_channel_chain() {
        let recorder = Arc::new(RecordingChannel {
            seen: Mutex::new(Vec::new()),
        });
        let dispatcher = Arc::new(NotificationDispatcher::with_channels(vec![
            recorder.clone() as Arc<dyn NotificationChannel>,
        ]));
        let tool = SendDoctorReportTool { dispatcher };

        let result = tool
            .execute(json!({
                "channel": "slack",
                "report_text": "3 visits yesterday",
                "recipient_email": "ahuja@clinic.test",
            }))
            .await
            .unwrap();

        assert_eq!(result["success"], true);
        let seen = recorder.seen.lock().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].recipient.as_deref(), Some("ahuja@clinic.test"));
    }

    #[tokio::test]
    async fn report_without_recipient_still_dispatches() {
        let recorder = Arc::new(RecordingChannel {
            seen: Mutex::new(Vec::new()),
        });
        let dispatcher = Arc::new(NotificationDispatcher::with_channels(vec![
            recorder.clone() as Arc<dyn NotificationChannel>,
        ]));
        let tool = SendDoctorReportTool { dispatcher };

        let result = tool
            .execute(json!({"channel": "slack", "report_text": "all clear"}))
            .await
            .unwrap();

        assert_eq!(result["success"], true);
        assert_eq!(recorder.seen.lock().await[0].recipient, None);
    }
}
