// libs/scheduling-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// ==============================================================================
// CORE SCHEDULING MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub specialization: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: i64,
    pub patient_id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub calendar_event_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "SCHEDULED"),
            AppointmentStatus::Completed => write!(f, "COMPLETED"),
            AppointmentStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl AppointmentStatus {
    /// Terminal states reject further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled
        )
    }
}

/// Weekly recurring availability row. `day_of_week` is Monday-based (0-6).
/// Times are stored as "HH:MM" strings in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyAvailability {
    pub doctor_id: i64,
    pub day_of_week: i32,
    pub start_time: String,
    pub end_time: String,
    pub is_available: bool,
}

/// A bookable window, derived on demand and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailableSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i64,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_name: String,
    pub slot_time: String,
    pub date_str: String,
    pub patient_name: String,
    pub patient_email: String,
    pub notes: Option<String>,
    pub condition: Option<String>,
}

/// Booking result with independent flags per best-effort side effect.
/// A committed booking is never rolled back because calendar sync or the
/// confirmation email degraded.
#[derive(Debug, Clone, Serialize)]
pub struct BookingOutcome {
    pub appointment: Appointment,
    pub doctor_name: String,
    pub booking_created: bool,
    pub calendar_synced: bool,
    pub email_sent: bool,
    pub detail: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentSummary {
    pub doctor: String,
    pub date: NaiveDate,
    pub time: String,
    pub notes: String,
    pub condition: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsQuery {
    VisitsYesterday,
    AppointmentsToday,
    AppointmentsTomorrow,
    PatientsWithCondition,
}

impl StatsQuery {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "visits_yesterday" => Some(StatsQuery::VisitsYesterday),
            "appointments_today" => Some(StatsQuery::AppointmentsToday),
            "appointments_tomorrow" => Some(StatsQuery::AppointmentsTomorrow),
            "patients_with_condition" => Some(StatsQuery::PatientsWithCondition),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatsQuery::VisitsYesterday => "visits_yesterday",
            StatsQuery::AppointmentsToday => "appointments_today",
            StatsQuery::AppointmentsTomorrow => "appointments_tomorrow",
            StatsQuery::PatientsWithCondition => "patients_with_condition",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorStats {
    pub doctor: String,
    pub query: String,
    pub count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("Doctor '{0}' not found")]
    DoctorNotFound(String),

    #[error("No account found with that email. Please sign up or log in first.")]
    PatientNotFound,

    #[error("Appointment {0} not found")]
    AppointmentNotFound(Uuid),

    #[error("Slot {slot} is not available. Available: {available:?}")]
    SlotUnavailable { slot: String, available: Vec<String> },

    #[error("Slot already taken, please pick another time")]
    SlotTaken,

    #[error("Appointment is already {0} and cannot change")]
    TerminalStatus(AppointmentStatus),

    #[error("Invalid date or time: {0}")]
    InvalidDateTime(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl From<shared_database::StoreError> for SchedulingError {
    fn from(e: shared_database::StoreError) -> Self {
        match e {
            shared_database::StoreError::Conflict(_) => SchedulingError::SlotTaken,
            other => SchedulingError::Database(other.to_string()),
        }
    }
}
