//! API request/response models for patients.

use super::insurers::InsurerResponse;
use super::pagination::Pagination;
use super::persons::PersonResponse;
use crate::db::models::patients::PatientDBResponse;
use crate::types::{InsurerId, PatientId, PersonId, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PatientCreate {
    pub person_id: PersonId,
    pub insurer_id: InsurerId,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PatientReplace {
    pub id: PatientId,
    pub version: Version,
    pub person_id: PersonId,
    pub insurer_id: InsurerId,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PatientResponse {
    pub id: PatientId,
    pub person_id: PersonId,
    pub insurer_id: InsurerId,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: Version,
    /// Included only when requested with `include=person`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person: Option<PersonResponse>,
    /// Included only when requested with `include=insurer`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insurer: Option<InsurerResponse>,
}

impl From<PatientDBResponse> for PatientResponse {
    fn from(db: PatientDBResponse) -> Self {
        Self {
            id: db.id,
            person_id: db.person_id,
            insurer_id: db.insurer_id,
            active: db.active,
            created_at: db.created_at,
            updated_at: db.updated_at,
            version: db.version,
            person: None,
            insurer: None,
        }
    }
}

impl PatientResponse {
    pub fn with_relationships(mut self, person: Option<PersonResponse>, insurer: Option<InsurerResponse>) -> Self {
        self.person = person;
        self.insurer = insurer;
        self
    }
}

/// Query parameters for listing patients
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListPatientsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Related data to embed (comma-separated: "person", "insurer")
    pub include: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct GetPatientQuery {
    /// Related data to embed (comma-separated: "person", "insurer")
    pub include: Option<String>,
}
