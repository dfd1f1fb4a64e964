//! Database models for users.

use crate::api::models::users::Role;
use crate::types::{PersonId, UserId, Version};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a new user.
///
/// Password hashing happens at the API layer; the repository only ever sees
/// the finished hash.
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub username: String,
    pub password_hash: Option<String>,
    pub email: Option<String>,
    pub role: Role,
    pub person_id: Option<PersonId>,
    pub external_subject: Option<String>,
    pub active: bool,
}

/// Database request for replacing a user, guarded by the version token.
///
/// `password_hash` is `None` to keep the stored hash (a replace request
/// without a new password must not lock the account out).
#[derive(Debug, Clone)]
pub struct UserUpdateDBRequest {
    pub expected_version: Version,
    pub username: String,
    pub password_hash: Option<String>,
    pub email: Option<String>,
    pub role: Role,
    pub person_id: Option<PersonId>,
    pub active: bool,
}

/// Database row for a user
#[derive(Debug, Clone, FromRow)]
pub struct UserDBResponse {
    pub id: UserId,
    pub username: String,
    pub password_hash: Option<String>,
    pub email: Option<String>,
    pub role: Role,
    pub person_id: Option<PersonId>,
    pub external_subject: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: Version,
}
