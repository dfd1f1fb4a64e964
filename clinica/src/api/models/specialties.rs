//! API request/response models for specialties.

use super::pagination::Pagination;
use super::require;
use crate::db::models::specialties::SpecialtyDBResponse;
use crate::errors::Result;
use crate::types::{SpecialtyId, Version};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SpecialtyCreate {
    pub name: String,
}

impl SpecialtyCreate {
    pub fn validate(&self) -> Result<()> {
        require(&self.name, "name")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SpecialtyReplace {
    pub id: SpecialtyId,
    pub version: Version,
    pub name: String,
}

impl SpecialtyReplace {
    pub fn validate(&self) -> Result<()> {
        require(&self.name, "name")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SpecialtyResponse {
    pub id: SpecialtyId,
    pub name: String,
    pub version: Version,
}

impl From<SpecialtyDBResponse> for SpecialtyResponse {
    fn from(db: SpecialtyDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            version: db.version,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListSpecialtiesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}
