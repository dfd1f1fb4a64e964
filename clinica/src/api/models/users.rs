//! API request/response models for users.

use super::pagination::Pagination;
use super::require;
use crate::db::models::users::UserDBResponse;
use crate::errors::{Error, Result};
use crate::types::{PersonId, UserId, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Minimum accepted password length for native accounts.
pub const MIN_PASSWORD_LENGTH: usize = 8;

// Role enum for the clinic's job functions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Doctor,
    Reception,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserCreate {
    pub username: String,
    /// Plain-text password, hashed before it reaches storage. Absent for
    /// accounts that only log in through the external provider.
    pub password: Option<String>,
    pub email: Option<String>,
    pub role: Role,
    pub person_id: Option<PersonId>,
}

impl UserCreate {
    pub fn validate(&self) -> Result<()> {
        require(&self.username, "username")?;
        if let Some(password) = &self.password {
            validate_password(password)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserReplace {
    pub id: UserId,
    pub version: Version,
    pub username: String,
    /// When present, the stored password is replaced; when absent it is kept.
    pub password: Option<String>,
    pub email: Option<String>,
    pub role: Role,
    pub person_id: Option<PersonId>,
    pub active: bool,
}

impl UserReplace {
    pub fn validate(&self) -> Result<()> {
        require(&self.username, "username")?;
        if let Some(password) = &self.password {
            validate_password(password)?;
        }
        Ok(())
    }
}

fn validate_password(password: &str) -> Result<()> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(Error::BadRequest {
            message: format!("password must be at least {MIN_PASSWORD_LENGTH} characters"),
        });
    }
    Ok(())
}

/// User as returned by the API. The password hash never leaves storage; the
/// external identity link is exposed only as a boolean.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    pub person_id: Option<PersonId>,
    pub has_external_link: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: Version,
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            email: db.email,
            role: db.role,
            person_id: db.person_id,
            has_external_link: db.external_subject.is_some(),
            active: db.active,
            created_at: db.created_at,
            updated_at: db.updated_at,
            version: db.version,
        }
    }
}

/// The authenticated caller, as carried by the session artifact.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
    pub role: Role,
}

impl From<UserDBResponse> for CurrentUser {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            role: db.role,
        }
    }
}

/// Query parameters for listing users
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListUsersQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}
