//! API request/response models for doctors.

use super::pagination::Pagination;
use super::persons::PersonResponse;
use super::require;
use super::specialties::SpecialtyResponse;
use crate::db::models::doctors::DoctorDBResponse;
use crate::errors::Result;
use crate::types::{DoctorId, PersonId, SpecialtyId, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DoctorCreate {
    pub person_id: PersonId,
    pub specialty_id: SpecialtyId,
    pub license_number: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub active: Option<bool>,
}

impl DoctorCreate {
    pub fn validate(&self) -> Result<()> {
        require(&self.license_number, "license_number")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DoctorReplace {
    pub id: DoctorId,
    pub version: Version,
    pub person_id: PersonId,
    pub specialty_id: SpecialtyId,
    pub license_number: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub active: bool,
}

impl DoctorReplace {
    pub fn validate(&self) -> Result<()> {
        require(&self.license_number, "license_number")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DoctorResponse {
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
    /// Included only when requested with `include=person`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person: Option<PersonResponse>,
    /// Included only when requested with `include=specialty`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialty: Option<SpecialtyResponse>,
}

impl From<DoctorDBResponse> for DoctorResponse {
    fn from(db: DoctorDBResponse) -> Self {
        Self {
            id: db.id,
            person_id: db.person_id,
            specialty_id: db.specialty_id,
            license_number: db.license_number,
            phone: db.phone,
            email: db.email,
            active: db.active,
            created_at: db.created_at,
            updated_at: db.updated_at,
            version: db.version,
            person: None,
            specialty: None,
        }
    }
}

impl DoctorResponse {
    pub fn with_relationships(mut self, person: Option<PersonResponse>, specialty: Option<SpecialtyResponse>) -> Self {
        self.person = person;
        self.specialty = specialty;
        self
    }
}

/// Query parameters for listing doctors
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListDoctorsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Related data to embed (comma-separated: "person", "specialty")
    pub include: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct GetDoctorQuery {
    /// Related data to embed (comma-separated: "person", "specialty")
    pub include: Option<String>,
}
