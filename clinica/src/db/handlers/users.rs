//! Database repository for users.

use std::collections::HashMap;

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
    types::UserId,
};
use sqlx::PgConnection;
use tracing::instrument;

/// Filter for listing users
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub skip: i64,
    pub limit: i64,
}

impl UserFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, username), err)]
    pub async fn get_by_username(&mut self, username: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self, email), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    /// Look up the user linked to an external identity provider subject.
    #[instrument(skip(self, subject), err)]
    pub async fn get_by_external_subject(&mut self, subject: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE external_subject = $1")
            .bind(subject)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    /// Attach an external identity provider subject to an existing user.
    #[instrument(skip(self, subject), err)]
    pub async fn link_external_subject(&mut self, id: UserId, subject: &str) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            "UPDATE users SET external_subject = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(subject)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(user)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            INSERT INTO users (username, password_hash, email, role, person_id, external_subject, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&request.username)
        .bind(&request.password_hash)
        .bind(&request.email)
        .bind(request.role)
        .bind(request.person_id)
        .bind(&request.external_subject)
        .bind(request.active)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let users = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let users = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users ORDER BY id LIMIT $1 OFFSET $2")
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(users)
    }

    #[instrument(skip(self), err)]
    async fn exists(&mut self, id: Self::Id) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(exists)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        // COALESCE keeps the stored hash when the replace carries no new password
        let updated = sqlx::query_as::<_, UserDBResponse>(
            r#"
            UPDATE users SET
                username = $3,
                password_hash = COALESCE($4, password_hash),
                email = $5,
                role = $6,
                person_id = $7,
                active = $8,
                updated_at = NOW(),
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.expected_version)
        .bind(&request.username)
        .bind(&request.password_hash)
        .bind(&request.email)
        .bind(request.role)
        .bind(request.person_id)
        .bind(request.active)
        .fetch_optional(&mut *self.db)
        .await?;

        match updated {
            Some(user) => Ok(user),
            None => {
                // Zero rows: either the row is gone or its version moved.
                if self.exists(id).await? {
                    Err(DbError::VersionConflict)
                } else {
                    Err(DbError::NotFound)
                }
            }
        }
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use sqlx::PgPool;

    fn user_create(username: &str) -> UserCreateDBRequest {
        UserCreateDBRequest {
            username: username.to_string(),
            password_hash: None,
            email: Some(format!("{username}@clinic.example")),
            role: Role::Reception,
            person_id: None,
            external_subject: None,
            active: true,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_user(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let user = repo.create(&user_create("mgarcia")).await.unwrap();
        assert_eq!(user.username, "mgarcia");
        assert_eq!(user.role, Role::Reception);
        assert!(user.active);
        assert_eq!(user.version, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_username_is_unique_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        repo.create(&user_create("dupe")).await.unwrap();
        let err = repo.create(&user_create("dupe")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_by_username(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let created = repo.create(&user_create("lookup")).await.unwrap();
        let found = repo.get_by_username("lookup").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(repo.get_by_username("nobody").await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_replace_without_password_keeps_hash(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let mut request = user_create("keephash");
        request.password_hash = Some("$argon2id$fakehash".to_string());
        let created = repo.create(&request).await.unwrap();

        let update = UserUpdateDBRequest {
            expected_version: created.version,
            username: "keephash".to_string(),
            password_hash: None,
            email: created.email.clone(),
            role: Role::Doctor,
            person_id: None,
            active: true,
        };

        let updated = repo.update(created.id, &update).await.unwrap();
        assert_eq!(updated.role, Role::Doctor);
        assert_eq!(updated.password_hash.as_deref(), Some("$argon2id$fakehash"));
        assert_eq!(updated.version, created.version + 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_link_external_subject(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let created = repo.create(&user_create("oauth")).await.unwrap();
        assert!(repo.get_by_external_subject("google-sub-1").await.unwrap().is_none());

        let linked = repo.link_external_subject(created.id, "google-sub-1").await.unwrap();
        assert_eq!(linked.external_subject.as_deref(), Some("google-sub-1"));

        let found = repo.get_by_external_subject("google-sub-1").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
    }
}
