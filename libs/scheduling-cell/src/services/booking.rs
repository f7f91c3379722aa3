// libs/scheduling-cell/src/services/booking.rs
use chrono::{DateTime, Duration, NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use notification_cell::services::email::EmailService;
use shared_config::AppConfig;
use shared_database::StoreClient;

use crate::models::{
    Appointment, AppointmentSummary, BookAppointmentRequest, BookingOutcome, Doctor, DoctorStats,
    SchedulingError, StatsQuery,
};
use crate::parse::{parse_date_str, parse_slot_time};
use crate::services::availability::AvailabilityService;
use crate::services::calendar::CalendarService;
use crate::services::directory::DirectoryService;

pub struct BookingService {
    store: Arc<StoreClient>,
    directory: DirectoryService,
    availability: AvailabilityService,
    calendar: Arc<CalendarService>,
    email: EmailService,
    slot_duration_minutes: i64,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        let store = Arc::new(StoreClient::new(config));
        let calendar = Arc::new(CalendarService::new(config));

        Self {
            directory: DirectoryService::new(Arc::clone(&store)),
            availability: AvailabilityService::new(
                Arc::clone(&store),
                Arc::clone(&calendar),
                config.slot_duration_minutes,
            ),
            calendar,
            email: EmailService::new(config),
            store,
            slot_duration_minutes: config.slot_duration_minutes,
        }
    }

    pub fn directory(&self) -> &DirectoryService {
        &self.directory
    }

    pub fn availability(&self) -> &AvailabilityService {
        &self.availability
    }

    /// Conflict-checked booking. The availability re-check is advisory; the
    /// store's conditional insert is the only gate that serializes concurrent
    /// attempts for the same (doctor, instant) pair. Calendar and email run
    /// after the committed write and only annotate the outcome.
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<BookingOutcome, SchedulingError> {
        info!(
            "Booking appointment: doctor={:?} slot={:?} date={:?} patient={:?}",
            request.doctor_name, request.slot_time, request.date_str, request.patient_email
        );

        let date = parse_date_str(&request.date_str).ok_or_else(|| {
            SchedulingError::InvalidDateTime(format!(
                "Invalid date '{}'. Use today, tomorrow, or YYYY-MM-DD.",
                request.date_str
            ))
        })?;
        let time = parse_slot_time(&request.slot_time).ok_or_else(|| {
            SchedulingError::InvalidDateTime(
                "Invalid time format. Use HH:MM (e.g. 14:00), 2pm, or 2:00 PM.".to_string(),
            )
        })?;
        let scheduled_at = date.and_time(time).and_utc();

        let doctor = self.directory.find_doctor_by_name(&request.doctor_name).await?;

        // Advisory pre-check so the user gets the current alternatives in the
        // conflict message; the insert below remains authoritative.
        let available = self.availability.available_start_times(&doctor, date).await?;
        let slot_hhmm = time.format("%H:%M").to_string();
        if !available.contains(&slot_hhmm) {
            return Err(SchedulingError::SlotUnavailable {
                slot: slot_hhmm,
                available,
            });
        }

        let patient = self
            .directory
            .find_patient_by_email(&request.patient_email)
            .await?;

        let appointment = self
            .conditional_insert(&doctor, patient.id, scheduled_at, &request)
            .await?;

        info!(
            "Appointment {} created for doctor {} at {}",
            appointment.id, doctor.id, scheduled_at
        );

        Ok(self
            .run_side_effects(appointment, &doctor, &request, scheduled_at)
            .await)
    }

    /// Upcoming SCHEDULED appointments for a patient, ascending, capped at 20.
    /// The default cutoff reaches one hour back so same-day slots are not
    /// dropped by clock skew.
    pub async fn list_appointments(
        &self,
        patient_email: &str,
        from: Option<DateTime<Utc>>,
    ) -> Result<Vec<AppointmentSummary>, SchedulingError> {
        let patient = self.directory.find_patient_by_email(patient_email).await?;
        let cutoff = from.unwrap_or_else(|| Utc::now() - Duration::hours(1));

        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&status=eq.SCHEDULED&scheduled_at=gte.{}&order=scheduled_at.asc&limit=20",
            patient.id,
            urlencoding::encode(&cutoff.to_rfc3339())
        );
        let result: Vec<Value> = self.store.request(Method::GET, &path, None).await?;

        let appointments = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| SchedulingError::Database(format!("Failed to parse appointments: {}", e)))?;

        let mut doctor_names: HashMap<i64, String> = HashMap::new();
        let mut summaries = Vec::with_capacity(appointments.len());

        for apt in appointments {
            let doctor_name = match doctor_names.get(&apt.doctor_id) {
                Some(name) => name.clone(),
                None => {
                    let name = self
                        .directory
                        .find_doctor_by_id(apt.doctor_id)
                        .await
                        .map(|d| d.name)
                        .unwrap_or_else(|_| "Unknown".to_string());
                    doctor_names.insert(apt.doctor_id, name.clone());
                    name
                }
            };

            summaries.push(AppointmentSummary {
                doctor: doctor_name,
                date: apt.scheduled_at.date_naive(),
                time: apt.scheduled_at.format("%H:%M").to_string(),
                notes: apt.notes.unwrap_or_default(),
                condition: apt.condition.unwrap_or_default(),
            });
        }

        Ok(summaries)
    }

    /// SCHEDULED -> CANCELLED. Terminal states are immutable; the freed
    /// (doctor, instant) becomes bookable again.
    pub async fn cancel_appointment(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&limit=1", id);
        let result: Vec<Value> = self.store.request(Method::GET, &path, None).await?;

        let appointment: Appointment = result
            .into_iter()
            .next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| SchedulingError::Database(format!("Failed to parse appointment: {}", e)))?
            .ok_or(SchedulingError::AppointmentNotFound(id))?;

        if appointment.status.is_terminal() {
            return Err(SchedulingError::TerminalStatus(appointment.status));
        }

        let patch_path = format!("/rest/v1/appointments?id=eq.{}", id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let updated: Vec<Value> = self
            .store
            .request_with_headers(
                Method::PATCH,
                &patch_path,
                Some(json!({ "status": "CANCELLED" })),
                Some(headers),
            )
            .await?;

        updated
            .into_iter()
            .next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| SchedulingError::Database(format!("Failed to parse appointment: {}", e)))?
            .ok_or(SchedulingError::AppointmentNotFound(id))
    }

    /// Aggregate counts for a doctor. Zero matches is a zero count, never an
    /// error.
    pub async fn doctor_stats(
        &self,
        doctor_name: &str,
        query: StatsQuery,
        condition_filter: Option<&str>,
    ) -> Result<DoctorStats, SchedulingError> {
        let doctor = self.directory.find_doctor_by_name(doctor_name).await?;
        let today = Utc::now().date_naive();

        let (count, condition) = match query {
            StatsQuery::VisitsYesterday => {
                let yesterday = today - Duration::days(1);
                (
                    self.count_for_day(&doctor, yesterday, "COMPLETED").await?,
                    None,
                )
            }
            StatsQuery::AppointmentsToday => {
                (self.count_for_day(&doctor, today, "SCHEDULED").await?, None)
            }
            StatsQuery::AppointmentsTomorrow => {
                let tomorrow = today + Duration::days(1);
                (
                    self.count_for_day(&doctor, tomorrow, "SCHEDULED").await?,
                    None,
                )
            }
            StatsQuery::PatientsWithCondition => {
                let filter = condition_filter
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        SchedulingError::InvalidDateTime(
                            "condition_filter is required for patients_with_condition".to_string(),
                        )
                    })?;
                let pattern = urlencoding::encode(&format!("*{}*", filter)).into_owned();
                let path = format!(
                    "/rest/v1/appointments?doctor_id=eq.{}&condition=ilike.{}&select=id",
                    doctor.id, pattern
                );
                let rows: Vec<Value> = self.store.request(Method::GET, &path, None).await?;
                (rows.len() as i64, Some(filter.to_string()))
            }
        };

        Ok(DoctorStats {
            doctor: doctor.name,
            query: query.as_str().to_string(),
            count,
            condition,
        })
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn conditional_insert(
        &self,
        doctor: &Doctor,
        patient_id: i64,
        scheduled_at: DateTime<Utc>,
        request: &BookAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        let row = json!({
            "id": Uuid::new_v4(),
            "doctor_id": doctor.id,
            "patient_id": patient_id,
            "scheduled_at": scheduled_at.to_rfc3339(),
            "status": "SCHEDULED",
            "notes": request.notes,
            "condition": request.condition,
        });

        // Single conditional write: the store's unique constraint on
        // (doctor_id, scheduled_at) among SCHEDULED rows rejects the loser of
        // a concurrent race with a 409, mapped to SlotTaken.
        let created: Vec<Value> = self
            .store
            .insert_returning("/rest/v1/appointments", row)
            .await?;

        created
            .into_iter()
            .next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| SchedulingError::Database(format!("Failed to parse appointment: {}", e)))?
            .ok_or_else(|| SchedulingError::Database("Insert returned no row".to_string()))
    }

    async fn run_side_effects(
        &self,
        appointment: Appointment,
        doctor: &Doctor,
        request: &BookAppointmentRequest,
        scheduled_at: DateTime<Utc>,
    ) -> BookingOutcome {
        let mut detail = Vec::new();
        let end_at = scheduled_at + Duration::minutes(self.slot_duration_minutes);

        let event_id = self
            .calendar
            .create_event(
                &doctor.name,
                &request.patient_name,
                &request.patient_email,
                scheduled_at,
                end_at,
            )
            .await;

        let calendar_synced = self.calendar.is_configured() && event_id.is_some();
        if !self.calendar.is_configured() {
            detail.push("calendar not configured; event stubbed".to_string());
        } else if event_id.is_none() {
            detail.push("calendar sync failed; booking unaffected".to_string());
        }

        if let Some(ref id) = event_id {
            // Best-effort annotation; a failed patch never surfaces.
            let patch_path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
            let patch: Result<Vec<Value>, _> = self
                .store
                .request(
                    Method::PATCH,
                    &patch_path,
                    Some(json!({ "calendar_event_id": id })),
                )
                .await;
            if let Err(e) = patch {
                debug!("Failed to record calendar event id: {}", e);
            }
        }

        let subject = format!("Appointment confirmed with {}", doctor.name);
        let body = format!(
            "Your appointment with {} is confirmed for {}.",
            doctor.name,
            scheduled_at.to_rfc3339()
        );
        let email_sent = match self
            .email
            .send_confirmation_email(&request.patient_email, &subject, &body)
            .await
        {
            Ok(true) => true,
            Ok(false) => {
                detail.push("email not configured; confirmation stubbed".to_string());
                false
            }
            Err(e) => {
                warn!("Confirmation email failed: {}", e);
                detail.push(format!("confirmation email failed: {}", e));
                false
            }
        };

        BookingOutcome {
            doctor_name: doctor.name.clone(),
            appointment,
            booking_created: true,
            calendar_synced,
            email_sent,
            detail,
        }
    }

    async fn count_for_day(
        &self,
        doctor: &Doctor,
        day: NaiveDate,
        status: &str,
    ) -> Result<i64, SchedulingError> {
        let start = day
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| SchedulingError::InvalidDateTime(day.to_string()))?
            .and_utc();
        let end = day
            .and_hms_opt(23, 59, 59)
            .ok_or_else(|| SchedulingError::InvalidDateTime(day.to_string()))?
            .and_utc();

        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&scheduled_at=gte.{}&scheduled_at=lte.{}&status=eq.{}&select=id",
            doctor.id,
            urlencoding::encode(&start.to_rfc3339()),
            urlencoding::encode(&end.to_rfc3339()),
            status
        );

        let rows: Vec<Value> = self.store.request(Method::GET, &path, None).await?;
        Ok(rows.len() as i64)
    }
}
