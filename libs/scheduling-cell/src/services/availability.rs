// libs/scheduling-cell/src/services/availability.rs
use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use shared_database::StoreClient;

use crate::models::{Appointment, AvailableSlot, Doctor, SchedulingError, WeeklyAvailability};
use crate::parse::parse_stored_time;
use crate::services::calendar::CalendarService;

/// Default business-hours slate applied when a doctor has no weekly
/// availability rows (start hours, UTC).
const DEFAULT_SLOT_HOURS: [u32; 6] = [9, 10, 11, 14, 15, 16];

/// Computes free slots for a doctor and date. Pure read; results are
/// advisory and never reserve anything.
pub struct AvailabilityService {
    store: Arc<StoreClient>,
    calendar: Arc<CalendarService>,
    slot_duration_minutes: i64,
}

impl AvailabilityService {
    pub fn new(
        store: Arc<StoreClient>,
        calendar: Arc<CalendarService>,
        slot_duration_minutes: i64,
    ) -> Self {
        Self {
            store,
            calendar,
            slot_duration_minutes: slot_duration_minutes.max(1),
        }
    }

    /// Ordered free slots for the doctor on the given date: weekly schedule
    /// (or the default slate) minus SCHEDULED appointments minus external
    /// calendar busy ranges.
    pub async fn get_available_slots(
        &self,
        doctor: &Doctor,
        date: NaiveDate,
    ) -> Result<Vec<AvailableSlot>, SchedulingError> {
        debug!(
            "Calculating available slots for doctor {} on {}",
            doctor.id, date
        );

        let mut candidate_starts = self.candidate_start_times(doctor.id, date).await?;

        let booked = self.booked_start_times(doctor.id, date).await?;
        candidate_starts.retain(|t| !booked.contains(t));

        // Calendar outage degrades to "no busy data"; the read never fails.
        let busy = self.calendar.get_busy_slots(date).await;
        if !busy.is_empty() {
            candidate_starts.retain(|start| {
                let slot_start = date.and_time(*start).and_utc();
                let slot_end = slot_start + Duration::minutes(self.slot_duration_minutes);
                !busy
                    .iter()
                    .any(|(busy_start, busy_end)| slot_start < *busy_end && *busy_start < slot_end)
            });
        }

        let slots = candidate_starts
            .into_iter()
            .map(|start| {
                let start_time = date.and_time(start).and_utc();
                AvailableSlot {
                    start_time,
                    end_time: start_time + Duration::minutes(self.slot_duration_minutes),
                    duration_minutes: self.slot_duration_minutes,
                }
            })
            .collect::<Vec<_>>();

        debug!("Found {} available slots", slots.len());
        Ok(slots)
    }

    /// Free slot start times formatted "HH:MM", the shape the agent's tools
    /// expose to the model.
    pub async fn available_start_times(
        &self,
        doctor: &Doctor,
        date: NaiveDate,
    ) -> Result<Vec<String>, SchedulingError> {
        let slots = self.get_available_slots(doctor, date).await?;
        Ok(slots
            .iter()
            .map(|s| s.start_time.format("%H:%M").to_string())
            .collect())
    }

    pub fn slot_duration_minutes(&self) -> i64 {
        self.slot_duration_minutes
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn candidate_start_times(
        &self,
        doctor_id: i64,
        date: NaiveDate,
    ) -> Result<BTreeSet<NaiveTime>, SchedulingError> {
        // Monday-based day of week, matching the stored schedule rows
        let day_of_week = date.weekday().num_days_from_monday() as i32;

        let path = format!(
            "/rest/v1/availability_slots?doctor_id=eq.{}&day_of_week=eq.{}&is_available=eq.true&order=start_time.asc",
            doctor_id, day_of_week
        );
        let result: Vec<Value> = self.store.request(Method::GET, &path, None).await?;

        let schedules = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<WeeklyAvailability>, _>>()
            .map_err(|e| {
                SchedulingError::Database(format!("Failed to parse availability rows: {}", e))
            })?;

        let mut starts = BTreeSet::new();

        if schedules.is_empty() {
            for hour in DEFAULT_SLOT_HOURS {
                if let Some(t) = NaiveTime::from_hms_opt(hour, 0, 0) {
                    starts.insert(t);
                }
            }
            return Ok(starts);
        }

        for schedule in schedules {
            let (start, end) = match (
                parse_stored_time(&schedule.start_time),
                parse_stored_time(&schedule.end_time),
            ) {
                (Some(s), Some(e)) if s < e => (s, e),
                _ => continue,
            };

            let mut current = date.and_time(start);
            let end_dt = date.and_time(end);
            while current + Duration::minutes(self.slot_duration_minutes) <= end_dt {
                starts.insert(current.time());
                current += Duration::minutes(self.slot_duration_minutes);
            }
        }

        Ok(starts)
    }

    async fn booked_start_times(
        &self,
        doctor_id: i64,
        date: NaiveDate,
    ) -> Result<BTreeSet<NaiveTime>, SchedulingError> {
        let appointments = self.appointments_for_date(doctor_id, date).await?;
        Ok(appointments
            .iter()
            .map(|apt| apt.scheduled_at.time())
            .collect())
    }

    async fn appointments_for_date(
        &self,
        doctor_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let start_of_day = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| SchedulingError::InvalidDateTime(date.to_string()))?
            .and_utc();
        let end_of_day = date
            .and_hms_opt(23, 59, 59)
            .ok_or_else(|| SchedulingError::InvalidDateTime(date.to_string()))?
            .and_utc();

        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&scheduled_at=gte.{}&scheduled_at=lte.{}&status=eq.SCHEDULED&order=scheduled_at.asc",
            doctor_id,
            urlencoding::encode(&start_of_day.to_rfc3339()),
            urlencoding::encode(&end_of_day.to_rfc3339())
        );

        let result: Vec<Value> = self.store.request(Method::GET, &path, None).await?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| SchedulingError::Database(format!("Failed to parse appointments: {}", e)))
    }
}
