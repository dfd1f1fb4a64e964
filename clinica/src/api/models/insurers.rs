//! API request/response models for health insurers.

use super::pagination::Pagination;
use super::require;
use crate::db::models::insurers::InsurerDBResponse;
use crate::errors::Result;
use crate::types::{InsurerId, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InsurerCreate {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub active: Option<bool>,
}

impl InsurerCreate {
    pub fn validate(&self) -> Result<()> {
        require(&self.name, "name")?;
        require(&self.code, "code")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InsurerReplace {
    pub id: InsurerId,
    pub version: Version,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub active: bool,
}

impl InsurerReplace {
    pub fn validate(&self) -> Result<()> {
        require(&self.name, "name")?;
        require(&self.code, "code")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InsurerResponse {
    pub id: InsurerId,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: Version,
}

impl From<InsurerDBResponse> for InsurerResponse {
    fn from(db: InsurerDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            code: db.code,
            description: db.description,
            active: db.active,
            created_at: db.created_at,
            updated_at: db.updated_at,
            version: db.version,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListInsurersQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}
