//! API request/response models for persons.

use super::pagination::Pagination;
use super::require;
use crate::db::models::persons::PersonDBResponse;
use crate::errors::Result;
use crate::types::{PersonId, Version};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PersonCreate {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub gender: String,
    pub national_id: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl PersonCreate {
    pub fn validate(&self) -> Result<()> {
        require(&self.first_name, "first_name")?;
        require(&self.last_name, "last_name")?;
        require(&self.gender, "gender")?;
        require(&self.national_id, "national_id")?;
        Ok(())
    }
}

/// Full-replace body; `id` must match the path and `version` is the
/// optimistic-concurrency token read earlier.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PersonReplace {
    pub id: PersonId,
    pub version: Version,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub gender: String,
    pub national_id: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl PersonReplace {
    pub fn validate(&self) -> Result<()> {
        require(&self.first_name, "first_name")?;
        require(&self.last_name, "last_name")?;
        require(&self.gender, "gender")?;
        require(&self.national_id, "national_id")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PersonResponse {
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

impl From<PersonDBResponse> for PersonResponse {
    fn from(db: PersonDBResponse) -> Self {
        Self {
            id: db.id,
            first_name: db.first_name,
            last_name: db.last_name,
            birth_date: db.birth_date,
            gender: db.gender,
            national_id: db.national_id,
            address: db.address,
            phone: db.phone,
            email: db.email,
            version: db.version,
        }
    }
}

/// Query parameters for listing persons
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListPersonsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}
