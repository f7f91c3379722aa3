// libs/scheduling-cell/tests/availability_test.rs
mod common;

use chrono::NaiveDate;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{appointment_row, store_config};
use scheduling_cell::{BookingService, Doctor};

fn doctor() -> Doctor {
    Doctor {
        id: 1,
        name: "Dr. Ahuja".to_string(),
        email: "ahuja@clinic.test".to_string(),
        specialization: Some("General Medicine".to_string()),
    }
}

#[tokio::test]
async fn default_slate_excludes_booked_slots() {
    let server = MockServer::start().await;

    // No weekly schedule rows: the default business-hours slate applies.
    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    // One SCHEDULED appointment at 10:00 on the requested day.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_row(
            "7e6f9c3a-4f4e-4a39-9f30-0c2e5a35e111",
            "2030-06-03T10:00:00+00:00",
            "SCHEDULED",
        )])))
        .mount(&server)
        .await;

    let service = BookingService::new(&store_config(&server.uri()));
    let date = NaiveDate::from_ymd_opt(2030, 6, 3).unwrap();

    let starts = service
        .availability()
        .available_start_times(&doctor(), date)
        .await
        .unwrap();

    assert_eq!(starts, vec!["09:00", "11:00", "14:00", "15:00", "16:00"]);
}

#[tokio::test]
async fn weekly_schedule_is_enumerated_by_slot_duration() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "doctor_id": 1,
            "day_of_week": 0,
            "start_time": "09:00",
            "end_time": "12:00",
            "is_available": true,
        }])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let service = BookingService::new(&store_config(&server.uri()));
    // 2030-06-03 is a Monday, matching day_of_week 0.
    let date = NaiveDate::from_ymd_opt(2030, 6, 3).unwrap();

    let slots = service
        .availability()
        .get_available_slots(&doctor(), date)
        .await
        .unwrap();

    let starts: Vec<String> = slots
        .iter()
        .map(|s| s.start_time.format("%H:%M").to_string())
        .collect();
    assert_eq!(starts, vec!["09:00", "10:00", "11:00"]);
    assert!(slots.iter().all(|s| s.duration_minutes == 60));
}

#[tokio::test]
async fn queries_the_monday_based_weekday() {
    let server = MockServer::start().await;

    // 2030-06-06 is a Thursday: day_of_week 3.
    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_slots"))
        .and(query_param("day_of_week", "eq.3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let service = BookingService::new(&store_config(&server.uri()));
    let date = NaiveDate::from_ymd_opt(2030, 6, 6).unwrap();

    let starts = service
        .availability()
        .available_start_times(&doctor(), date)
        .await
        .unwrap();
    assert_eq!(starts.len(), 6);
}
