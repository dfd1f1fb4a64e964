//! Database repository for doctors.

use std::collections::HashMap;

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::doctors::{DoctorCreateDBRequest, DoctorDBResponse, DoctorUpdateDBRequest},
    },
    types::DoctorId,
};
use sqlx::PgConnection;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct DoctorFilter {
    pub skip: i64,
    pub limit: i64,
}

impl DoctorFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

pub struct Doctors<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Doctors<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Doctors<'c> {
    type CreateRequest = DoctorCreateDBRequest;
    type UpdateRequest = DoctorUpdateDBRequest;
    type Response = DoctorDBResponse;
    type Id = DoctorId;
    type Filter = DoctorFilter;

    #[instrument(skip(self, request), fields(license_number = %request.license_number), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let doctor = sqlx::query_as::<_, DoctorDBResponse>(
            r#"
            INSERT INTO doctors (person_id, specialty_id, license_number, phone, email, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(request.person_id)
        .bind(request.specialty_id)
        .bind(&request.license_number)
        .bind(&request.phone)
        .bind(&request.email)
        .bind(request.active)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(doctor)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let doctor = sqlx::query_as::<_, DoctorDBResponse>("SELECT * FROM doctors WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(doctor)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let doctors = sqlx::query_as::<_, DoctorDBResponse>("SELECT * FROM doctors WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(doctors.into_iter().map(|d| (d.id, d)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let doctors = sqlx::query_as::<_, DoctorDBResponse>("SELECT * FROM doctors ORDER BY id LIMIT $1 OFFSET $2")
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(doctors)
    }

    #[instrument(skip(self), err)]
    async fn exists(&mut self, id: Self::Id) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM doctors WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(exists)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let updated = sqlx::query_as::<_, DoctorDBResponse>(
            r#"
            UPDATE doctors SET
                person_id = $3,
                specialty_id = $4,
                license_number = $5,
                phone = $6,
                email = $7,
                active = $8,
                updated_at = NOW(),
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.expected_version)
        .bind(request.person_id)
        .bind(request.specialty_id)
        .bind(&request.license_number)
        .bind(&request.phone)
        .bind(&request.email)
        .bind(request.active)
        .fetch_optional(&mut *self.db)
        .await?;

        match updated {
            Some(doctor) => Ok(doctor),
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
        let result = sqlx::query("DELETE FROM doctors WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
