//! Database repository for patients.

use std::collections::HashMap;

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::patients::{PatientCreateDBRequest, PatientDBResponse, PatientUpdateDBRequest},
    },
    types::PatientId,
};
use sqlx::PgConnection;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct PatientFilter {
    pub skip: i64,
    pub limit: i64,
}

impl PatientFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

pub struct Patients<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Patients<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Patients<'c> {
    type CreateRequest = PatientCreateDBRequest;
    type UpdateRequest = PatientUpdateDBRequest;
    type Response = PatientDBResponse;
    type Id = PatientId;
    type Filter = PatientFilter;

    #[instrument(skip(self, request), fields(person_id = request.person_id), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let patient = sqlx::query_as::<_, PatientDBResponse>(
            r#"
            INSERT INTO patients (person_id, insurer_id, active)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(request.person_id)
        .bind(request.insurer_id)
        .bind(request.active)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(patient)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let patient = sqlx::query_as::<_, PatientDBResponse>("SELECT * FROM patients WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(patient)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let patients = sqlx::query_as::<_, PatientDBResponse>("SELECT * FROM patients WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(patients.into_iter().map(|p| (p.id, p)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let patients = sqlx::query_as::<_, PatientDBResponse>("SELECT * FROM patients ORDER BY id LIMIT $1 OFFSET $2")
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(patients)
    }

    #[instrument(skip(self), err)]
    async fn exists(&mut self, id: Self::Id) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM patients WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(exists)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let updated = sqlx::query_as::<_, PatientDBResponse>(
            r#"
            UPDATE patients SET
                person_id = $3,
                insurer_id = $4,
                active = $5,
                updated_at = NOW(),
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.expected_version)
        .bind(request.person_id)
        .bind(request.insurer_id)
        .bind(request.active)
        .fetch_optional(&mut *self.db)
        .await?;

        match updated {
            Some(patient) => Ok(patient),
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
        let result = sqlx::query("DELETE FROM patients WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::patients::PatientCreateDBRequest;
    use crate::test_utils::{create_test_insurer, create_test_person};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_patient_requires_existing_references(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Patients::new(&mut conn);

        let request = PatientCreateDBRequest {
            person_id: 999999,
            insurer_id: 999999,
            active: true,
        };
        let err = repo.create(&request).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_patient_linked_to_person_and_insurer(pool: PgPool) {
        let person = create_test_person(&pool, "20111222").await;
        let insurer = create_test_insurer(&pool, "Swiss Medical", "SM01").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Patients::new(&mut conn);
        let patient = repo
            .create(&PatientCreateDBRequest {
                person_id: person.id,
                insurer_id: insurer.id,
                active: true,
            })
            .await
            .unwrap();

        assert_eq!(patient.person_id, person.id);
        assert_eq!(patient.insurer_id, insurer.id);
        assert!(patient.active);
    }
}
