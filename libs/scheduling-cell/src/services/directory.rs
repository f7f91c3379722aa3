// libs/scheduling-cell/src/services/directory.rs
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use shared_database::StoreClient;

use crate::models::{Doctor, Patient, SchedulingError};

/// Read-only lookups against the doctors and patients tables.
pub struct DirectoryService {
    store: Arc<StoreClient>,
}

impl DirectoryService {
    pub fn new(store: Arc<StoreClient>) -> Self {
        Self { store }
    }

    /// All doctors, ordered by name.
    pub async fn list_doctors(&self) -> Result<Vec<Doctor>, SchedulingError> {
        let result: Vec<Value> = self
            .store
            .request(Method::GET, "/rest/v1/doctors?order=name.asc&limit=100", None)
            .await?;

        let doctors = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Doctor>, _>>()
            .map_err(|e| SchedulingError::Database(format!("Failed to parse doctors: {}", e)))?;

        Ok(doctors)
    }

    /// Case-insensitive substring match on the doctor name, first hit wins.
    pub async fn find_doctor_by_name(&self, name: &str) -> Result<Doctor, SchedulingError> {
        let pattern = urlencoding::encode(&format!("*{}*", name.trim())).into_owned();
        let path = format!("/rest/v1/doctors?name=ilike.{}&limit=1", pattern);
        debug!("Looking up doctor matching {:?}", name);

        let result: Vec<Value> = self.store.request(Method::GET, &path, None).await?;

        let doctor = result
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::DoctorNotFound(name.to_string()))?;

        serde_json::from_value(doctor)
            .map_err(|e| SchedulingError::Database(format!("Failed to parse doctor: {}", e)))
    }

    pub async fn find_patient_by_email(&self, email: &str) -> Result<Patient, SchedulingError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(SchedulingError::PatientNotFound);
        }
        let path = format!(
            "/rest/v1/patients?email=eq.{}&limit=1",
            urlencoding::encode(email)
        );

        let result: Vec<Value> = self.store.request(Method::GET, &path, None).await?;

        let patient = result
            .into_iter()
            .next()
            .ok_or(SchedulingError::PatientNotFound)?;

        serde_json::from_value(patient)
            .map_err(|e| SchedulingError::Database(format!("Failed to parse patient: {}", e)))
    }

    pub async fn find_doctor_by_id(&self, id: i64) -> Result<Doctor, SchedulingError> {
        let path = format!("/rest/v1/doctors?id=eq.{}&limit=1", id);

        let result: Vec<Value> = self.store.request(Method::GET, &path, None).await?;

        let doctor = result
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::DoctorNotFound(id.to_string()))?;

        serde_json::from_value(doctor)
            .map_err(|e| SchedulingError::Database(format!("Failed to parse doctor: {}", e)))
    }
}
