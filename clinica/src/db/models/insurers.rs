//! Database models for health insurers.

use crate::api::models::insurers::{InsurerCreate, InsurerReplace};
use crate::types::{InsurerId, Version};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct InsurerCreateDBRequest {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub active: bool,
}

impl From<InsurerCreate> for InsurerCreateDBRequest {
    fn from(api: InsurerCreate) -> Self {
        Self {
            name: api.name,
            code: api.code,
            description: api.description,
            active: api.active.unwrap_or(true),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InsurerUpdateDBRequest {
    pub expected_version: Version,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub active: bool,
}

impl From<InsurerReplace> for InsurerUpdateDBRequest {
    fn from(api: InsurerReplace) -> Self {
        Self {
            expected_version: api.version,
            name: api.name,
            code: api.code,
            description: api.description,
            active: api.active,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct InsurerDBResponse {
    pub id: InsurerId,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: Version,
}
