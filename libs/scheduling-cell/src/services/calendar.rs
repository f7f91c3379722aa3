// libs/scheduling-cell/src/services/calendar.rs
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use shared_config::AppConfig;

const CALENDAR_REQUEST_TIMEOUT_SECS: u64 = 8;

/// Google Calendar integration. Creates events and reports busy ranges when a
/// token is configured; otherwise every call degrades to a logged stub so the
/// booking flow never depends on it.
pub struct CalendarService {
    client: Client,
    base_url: String,
    token: String,
    calendar_id: String,
}

impl CalendarService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(CALENDAR_REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: config.google_calendar_base_url.clone(),
            token: config.google_calendar_token.clone(),
            calendar_id: config.google_calendar_id.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.token.is_empty()
    }

    /// Create a calendar event for a booked appointment. Returns the event id,
    /// or a stub id when the calendar is not configured, or None on transport
    /// failure. Never fails the booking.
    pub async fn create_event(
        &self,
        doctor_name: &str,
        patient_name: &str,
        patient_email: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Option<String> {
        if !self.is_configured() {
            info!(
                "[CALENDAR STUB] Google Calendar not configured; event for {} with {} at {}",
                patient_name, doctor_name, start
            );
            return Some(format!("stub_{}_{}", doctor_name, start.to_rfc3339()));
        }

        let body = json!({
            "summary": format!("Appointment: {} with {}", patient_name, doctor_name),
            "description": format!("Patient: {} ({})", patient_name, patient_email),
            "start": { "dateTime": start.to_rfc3339(), "timeZone": "UTC" },
            "end": { "dateTime": end.to_rfc3339(), "timeZone": "UTC" },
            "attendees": [{ "email": patient_email, "displayName": patient_name }],
        });

        let url = format!(
            "{}/calendar/v3/calendars/{}/events",
            self.base_url,
            urlencoding::encode(&self.calendar_id)
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                let event: Value = resp.json().await.ok()?;
                let event_id = event["id"].as_str().map(|s| s.to_string());
                debug!("Calendar event created: {:?}", event_id);
                event_id
            }
            Ok(resp) => {
                warn!("Calendar event insert failed with status {}", resp.status());
                None
            }
            Err(e) => {
                warn!("Calendar event insert failed: {}", e);
                None
            }
        }
    }

    /// Busy time ranges for the configured calendar on the given date (UTC).
    /// Empty when the calendar is unconfigured or unreachable.
    pub async fn get_busy_slots(&self, date: NaiveDate) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        if !self.is_configured() {
            return vec![];
        }

        let start_of_day = match date.and_hms_opt(0, 0, 0) {
            Some(t) => t.and_utc(),
            None => return vec![],
        };
        let end_of_day = match date.and_hms_opt(23, 59, 59) {
            Some(t) => t.and_utc(),
            None => return vec![],
        };

        let body = json!({
            "timeMin": start_of_day.to_rfc3339(),
            "timeMax": end_of_day.to_rfc3339(),
            "items": [{ "id": self.calendar_id }],
        });

        let url = format!("{}/calendar/v3/freeBusy", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await;

        let resp = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!("Calendar freeBusy query failed with status {}", r.status());
                return vec![];
            }
            Err(e) => {
                warn!("Calendar freeBusy query failed: {}", e);
                return vec![];
            }
        };

        let data: Value = match resp.json().await {
            Ok(v) => v,
            Err(_) => return vec![],
        };

        let busy = data["calendars"][self.calendar_id.as_str()]["busy"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        busy.iter()
            .filter_map(|b| {
                let start = b["start"].as_str()?.parse::<DateTime<Utc>>().ok()?;
                let end = b["end"].as_str()?.parse::<DateTime<Utc>>().ok()?;
                Some((start, end))
            })
            .collect()
    }
}
