//! Database models for specialties.

use crate::api::models::specialties::{SpecialtyCreate, SpecialtyReplace};
use crate::types::{SpecialtyId, Version};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct SpecialtyCreateDBRequest {
    pub name: String,
}

impl From<SpecialtyCreate> for SpecialtyCreateDBRequest {
    fn from(api: SpecialtyCreate) -> Self {
        Self { name: api.name }
    }
}

#[derive(Debug, Clone)]
pub struct SpecialtyUpdateDBRequest {
    pub expected_version: Version,
    pub name: String,
}

impl From<SpecialtyReplace> for SpecialtyUpdateDBRequest {
    fn from(api: SpecialtyReplace) -> Self {
        Self {
            expected_version: api.version,
            name: api.name,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SpecialtyDBResponse {
    pub id: SpecialtyId,
    pub name: String,
    pub version: Version,
}
