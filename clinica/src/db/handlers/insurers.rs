//! Database repository for health insurers.

use std::collections::HashMap;

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::insurers::{InsurerCreateDBRequest, InsurerDBResponse, InsurerUpdateDBRequest},
    },
    types::InsurerId,
};
use sqlx::PgConnection;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct InsurerFilter {
    pub skip: i64,
    pub limit: i64,
}

impl InsurerFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

pub struct Insurers<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Insurers<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Insurers<'c> {
    type CreateRequest = InsurerCreateDBRequest;
    type UpdateRequest = InsurerUpdateDBRequest;
    type Response = InsurerDBResponse;
    type Id = InsurerId;
    type Filter = InsurerFilter;

    #[instrument(skip(self, request), fields(code = %request.code), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let insurer = sqlx::query_as::<_, InsurerDBResponse>(
            r#"
            INSERT INTO insurers (name, code, description, active)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&request.name)
        .bind(&request.code)
        .bind(&request.description)
        .bind(request.active)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(insurer)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let insurer = sqlx::query_as::<_, InsurerDBResponse>("SELECT * FROM insurers WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(insurer)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let insurers = sqlx::query_as::<_, InsurerDBResponse>("SELECT * FROM insurers WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(insurers.into_iter().map(|i| (i.id, i)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let insurers = sqlx::query_as::<_, InsurerDBResponse>("SELECT * FROM insurers ORDER BY id LIMIT $1 OFFSET $2")
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(insurers)
    }

    #[instrument(skip(self), err)]
    async fn exists(&mut self, id: Self::Id) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM insurers WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(exists)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let updated = sqlx::query_as::<_, InsurerDBResponse>(
            r#"
            UPDATE insurers SET
                name = $3,
                code = $4,
                description = $5,
                active = $6,
                updated_at = NOW(),
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.expected_version)
        .bind(&request.name)
        .bind(&request.code)
        .bind(&request.description)
        .bind(request.active)
        .fetch_optional(&mut *self.db)
        .await?;

        match updated {
            Some(insurer) => Ok(insurer),
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
        let result = sqlx::query("DELETE FROM insurers WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::insurer_create_request;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_code_is_unique_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Insurers::new(&mut conn);

        repo.create(&insurer_create_request("OSDE", "410")).await.unwrap();

        // Same code, different name
        let err = repo.create(&insurer_create_request("OSDE Binario", "410")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        // Same name, different code
        let err = repo.create(&insurer_create_request("OSDE", "510")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }
}
