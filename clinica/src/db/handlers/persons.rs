//! Database repository for persons.

use std::collections::HashMap;

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::persons::{PersonCreateDBRequest, PersonDBResponse, PersonUpdateDBRequest},
    },
    types::PersonId,
};
use sqlx::PgConnection;
use tracing::instrument;

/// Filter for listing persons
#[derive(Debug, Clone)]
pub struct PersonFilter {
    pub skip: i64,
    pub limit: i64,
}

impl PersonFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

pub struct Persons<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Persons<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Persons<'c> {
    type CreateRequest = PersonCreateDBRequest;
    type UpdateRequest = PersonUpdateDBRequest;
    type Response = PersonDBResponse;
    type Id = PersonId;
    type Filter = PersonFilter;

    #[instrument(skip(self, request), fields(national_id = %request.national_id), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let person = sqlx::query_as::<_, PersonDBResponse>(
            r#"
            INSERT INTO persons (first_name, last_name, birth_date, gender, national_id, address, phone, email)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(request.birth_date)
        .bind(&request.gender)
        .bind(&request.national_id)
        .bind(&request.address)
        .bind(&request.phone)
        .bind(&request.email)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(person)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let person = sqlx::query_as::<_, PersonDBResponse>("SELECT * FROM persons WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(person)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let persons = sqlx::query_as::<_, PersonDBResponse>("SELECT * FROM persons WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(persons.into_iter().map(|p| (p.id, p)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let persons = sqlx::query_as::<_, PersonDBResponse>("SELECT * FROM persons ORDER BY id LIMIT $1 OFFSET $2")
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(persons)
    }

    #[instrument(skip(self), err)]
    async fn exists(&mut self, id: Self::Id) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM persons WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(exists)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let updated = sqlx::query_as::<_, PersonDBResponse>(
            r#"
            UPDATE persons SET
                first_name = $3,
                last_name = $4,
                birth_date = $5,
                gender = $6,
                national_id = $7,
                address = $8,
                phone = $9,
                email = $10,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.expected_version)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(request.birth_date)
        .bind(&request.gender)
        .bind(&request.national_id)
        .bind(&request.address)
        .bind(&request.phone)
        .bind(&request.email)
        .fetch_optional(&mut *self.db)
        .await?;

        match updated {
            Some(person) => Ok(person),
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
        let result = sqlx::query("DELETE FROM persons WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
