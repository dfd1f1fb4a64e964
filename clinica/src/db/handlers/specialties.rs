//! Database repository for specialties.

use std::collections::HashMap;

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::specialties::{SpecialtyCreateDBRequest, SpecialtyDBResponse, SpecialtyUpdateDBRequest},
    },
    types::SpecialtyId,
};
use sqlx::PgConnection;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct SpecialtyFilter {
    pub skip: i64,
    pub limit: i64,
}

impl SpecialtyFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

pub struct Specialties<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Specialties<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Specialties<'c> {
    type CreateRequest = SpecialtyCreateDBRequest;
    type UpdateRequest = SpecialtyUpdateDBRequest;
    type Response = SpecialtyDBResponse;
    type Id = SpecialtyId;
    type Filter = SpecialtyFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let specialty = sqlx::query_as::<_, SpecialtyDBResponse>("INSERT INTO specialties (name) VALUES ($1) RETURNING *")
            .bind(&request.name)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(specialty)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let specialty = sqlx::query_as::<_, SpecialtyDBResponse>("SELECT * FROM specialties WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(specialty)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let specialties = sqlx::query_as::<_, SpecialtyDBResponse>("SELECT * FROM specialties WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(specialties.into_iter().map(|s| (s.id, s)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let specialties = sqlx::query_as::<_, SpecialtyDBResponse>("SELECT * FROM specialties ORDER BY id LIMIT $1 OFFSET $2")
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(specialties)
    }

    #[instrument(skip(self), err)]
    async fn exists(&mut self, id: Self::Id) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM specialties WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(exists)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let updated = sqlx::query_as::<_, SpecialtyDBResponse>(
            "UPDATE specialties SET name = $3, version = version + 1 WHERE id = $1 AND version = $2 RETURNING *",
        )
        .bind(id)
        .bind(request.expected_version)
        .bind(&request.name)
        .fetch_optional(&mut *self.db)
        .await?;

        match updated {
            Some(specialty) => Ok(specialty),
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
        let result = sqlx::query("DELETE FROM specialties WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
