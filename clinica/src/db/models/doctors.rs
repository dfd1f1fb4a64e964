//! Database models for doctors.

use crate::api::models::doctors::{DoctorCreate, DoctorReplace};
use crate::types::{DoctorId, PersonId, SpecialtyId, Version};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct DoctorCreateDBRequest {
    pub person_id: PersonId,
    pub specialty_id: SpecialtyId,
    pub license_number: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub active: bool,
}

impl From<DoctorCreate> for DoctorCreateDBRequest {
    fn from(api: DoctorCreate) -> Self {
        Self {
            person_id: api.person_id,
            specialty_id: api.specialty_id,
            license_number: api.license_number,
            phone: api.phone,
            email: api.email,
            active: api.active.unwrap_or(true),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DoctorUpdateDBRequest {
    pub expected_version: Version,
    pub person_id: PersonId,
    pub specialty_id: SpecialtyId,
    pub license_number: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub active: bool,
}

impl From<DoctorReplace> for DoctorUpdateDBRequest {
    fn from(api: DoctorReplace) -> Self {
        Self {
            expected_version: api.version,
            person_id: api.person_id,
            specialty_id: api.specialty_id,
            license_number: api.license_number,
            phone: api.phone,
            email: api.email,
            active: api.active,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DoctorDBResponse {
    pub id: DoctorId,
    pub person_id: PersonId,
    pub specialty_id: SpecialtyId,
    pub license_number: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: Version,
}
