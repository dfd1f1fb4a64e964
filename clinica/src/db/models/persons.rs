//! Database models for persons.

use crate::api::models::persons::{PersonCreate, PersonReplace};
use crate::types::{PersonId, Version};
use chrono::NaiveDate;
use sqlx::FromRow;

/// Database request for creating a new person
#[derive(Debug, Clone)]
pub struct PersonCreateDBRequest {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub gender: String,
    pub national_id: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl From<PersonCreate> for PersonCreateDBRequest {
    fn from(api: PersonCreate) -> Self {
        Self {
            first_name: api.first_name,
            last_name: api.last_name,
            birth_date: api.birth_date,
            gender: api.gender,
            national_id: api.national_id,
            address: api.address,
            phone: api.phone,
            email: api.email,
        }
    }
}

/// Database request for replacing a person, guarded by the version token
#[derive(Debug, Clone)]
pub struct PersonUpdateDBRequest {
    pub expected_version: Version,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub gender: String,
    pub national_id: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl From<PersonReplace> for PersonUpdateDBRequest {
    fn from(api: PersonReplace) -> Self {
        Self {
            expected_version: api.version,
            first_name: api.first_name,
            last_name: api.last_name,
            birth_date: api.birth_date,
            gender: api.gender,
            national_id: api.national_id,
            address: api.address,
            phone: api.phone,
            email: api.email,
        }
    }
}

/// Database row for a person
#[derive(Debug, Clone, FromRow)]
pub struct PersonDBResponse {
    pub id: PersonId,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub gender: String,
    pub national_id: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub version: Version,
}
