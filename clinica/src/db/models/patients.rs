//! Database models for patients.

use crate::api::models::patients::{PatientCreate, PatientReplace};
use crate::types::{InsurerId, PatientId, PersonId, Version};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct PatientCreateDBRequest {
    pub person_id: PersonId,
    pub insurer_id: InsurerId,
    pub active: bool,
}

impl From<PatientCreate> for PatientCreateDBRequest {
    fn from(api: PatientCreate) -> Self {
        Self {
            person_id: api.person_id,
            insurer_id: api.insurer_id,
            active: api.active.unwrap_or(true),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PatientUpdateDBRequest {
    pub expected_version: Version,
    pub person_id: PersonId,
    pub insurer_id: InsurerId,
    pub active: bool,
}

impl From<PatientReplace> for PatientUpdateDBRequest {
    fn from(api: PatientReplace) -> Self {
        Self {
            expected_version: api.version,
            person_id: api.person_id,
            insurer_id: api.insurer_id,
            active: api.active,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PatientDBResponse {
    pub id: PatientId,
    pub person_id: PersonId,
    pub insurer_id: InsurerId,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: Version,
}
