//! Database repositories for medical orders and their owned lines.
//!
//! An order exclusively owns its lines: lines are inserted in the same
//! transaction as their order, and deleting an order removes its lines
//! atomically before the order row itself.

use std::collections::HashMap;

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::orders::{
            OrderCreateDBRequest, OrderDBResponse, OrderLineCreateDBRequest, OrderLineDBResponse, OrderLineUpdateDBRequest,
            OrderUpdateDBRequest,
        },
    },
    types::{OrderId, OrderLineId},
};
use sqlx::{Connection, PgConnection};
use tracing::instrument;

/// Filter for listing orders
#[derive(Debug, Clone)]
pub struct OrderFilter {
    pub skip: i64,
    pub limit: i64,
}

impl OrderFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

pub struct Orders<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Orders<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Orders<'c> {
    type CreateRequest = OrderCreateDBRequest;
    type UpdateRequest = OrderUpdateDBRequest;
    type Response = OrderDBResponse;
    type Id = OrderId;
    type Filter = OrderFilter;

    #[instrument(skip(self, request), fields(patient_id = request.patient_id, lines = request.lines.len()), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        // Order and its lines land atomically
        let mut tx = self.db.begin().await?;

        let order = sqlx::query_as::<_, OrderDBResponse>(
            r#"
            INSERT INTO medical_orders (doctor_id, patient_id, insurer_id, diagnosis, observations, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(request.doctor_id)
        .bind(request.patient_id)
        .bind(request.insurer_id)
        .bind(&request.diagnosis)
        .bind(&request.observations)
        .bind(request.status)
        .fetch_one(&mut *tx)
        .await?;

        for line in &request.lines {
            insert_line(&mut tx, order.id, line).await?;
        }

        tx.commit().await?;

        Ok(order)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let order = sqlx::query_as::<_, OrderDBResponse>("SELECT * FROM medical_orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(order)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let orders = sqlx::query_as::<_, OrderDBResponse>("SELECT * FROM medical_orders WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(orders.into_iter().map(|o| (o.id, o)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let orders = sqlx::query_as::<_, OrderDBResponse>("SELECT * FROM medical_orders ORDER BY id LIMIT $1 OFFSET $2")
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(orders)
    }

    #[instrument(skip(self), err)]
    async fn exists(&mut self, id: Self::Id) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM medical_orders WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(exists)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let updated = sqlx::query_as::<_, OrderDBResponse>(
            r#"
            UPDATE medical_orders SET
                doctor_id = $3,
                patient_id = $4,
                insurer_id = $5,
                diagnosis = $6,
                observations = $7,
                status = $8,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.expected_version)
        .bind(request.doctor_id)
        .bind(request.patient_id)
        .bind(request.insurer_id)
        .bind(&request.diagnosis)
        .bind(&request.observations)
        .bind(request.status)
        .fetch_optional(&mut *self.db)
        .await?;

        match updated {
            Some(order) => Ok(order),
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

    /// Cascade delete: the order's lines go with it, nothing else does.
    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM order_lines WHERE order_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM medical_orders WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}

async fn insert_line(conn: &mut PgConnection, order_id: OrderId, line: &OrderLineCreateDBRequest) -> Result<OrderLineDBResponse> {
    let line = sqlx::query_as::<_, OrderLineDBResponse>(
        r#"
        INSERT INTO order_lines
            (order_id, medication, quantity, dosage, frequency_hours, single_application, treatment_started, duration_days)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(order_id)
    .bind(&line.medication)
    .bind(line.quantity)
    .bind(&line.dosage)
    .bind(line.frequency_hours)
    .bind(line.single_application)
    .bind(line.treatment_started)
    .bind(line.duration_days)
    .fetch_one(conn)
    .await?;

    Ok(line)
}

/// Data access for an order's lines. Every operation is scoped to the owning
/// order so a line can never be addressed through the wrong parent.
pub struct OrderLines<'c> {
    db: &'c mut PgConnection,
}

impl<'c> OrderLines<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(order_id = order_id), err)]
    pub async fn create(&mut self, order_id: OrderId, request: &OrderLineCreateDBRequest) -> Result<OrderLineDBResponse> {
        insert_line(self.db, order_id, request).await
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, order_id: OrderId, id: OrderLineId) -> Result<Option<OrderLineDBResponse>> {
        let line = sqlx::query_as::<_, OrderLineDBResponse>("SELECT * FROM order_lines WHERE id = $1 AND order_id = $2")
            .bind(id)
            .bind(order_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(line)
    }

    #[instrument(skip(self), err)]
    pub async fn list_for_order(&mut self, order_id: OrderId) -> Result<Vec<OrderLineDBResponse>> {
        let lines = sqlx::query_as::<_, OrderLineDBResponse>("SELECT * FROM order_lines WHERE order_id = $1 ORDER BY id")
            .bind(order_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(lines)
    }

    /// Fetch the lines of many orders at once, keyed by order id.
    #[instrument(skip(self, order_ids), fields(count = order_ids.len()), err)]
    pub async fn list_for_orders(&mut self, order_ids: &[OrderId]) -> Result<HashMap<OrderId, Vec<OrderLineDBResponse>>> {
        if order_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let lines = sqlx::query_as::<_, OrderLineDBResponse>("SELECT * FROM order_lines WHERE order_id = ANY($1) ORDER BY id")
            .bind(order_ids)
            .fetch_all(&mut *self.db)
            .await?;

        let mut map: HashMap<OrderId, Vec<OrderLineDBResponse>> = HashMap::new();
        for line in lines {
            map.entry(line.order_id).or_default().push(line);
        }
        Ok(map)
    }

    #[instrument(skip(self, request), err)]
    pub async fn update(&mut self, order_id: OrderId, id: OrderLineId, request: &OrderLineUpdateDBRequest) -> Result<OrderLineDBResponse> {
        let updated = sqlx::query_as::<_, OrderLineDBResponse>(
            r#"
            UPDATE order_lines SET
                medication = $4,
                quantity = $5,
                dosage = $6,
                frequency_hours = $7,
                single_application = $8,
                treatment_started = $9,
                duration_days = $10,
                version = version + 1
            WHERE id = $1 AND order_id = $2 AND version = $3
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(order_id)
        .bind(request.expected_version)
        .bind(&request.medication)
        .bind(request.quantity)
        .bind(&request.dosage)
        .bind(request.frequency_hours)
        .bind(request.single_application)
        .bind(request.treatment_started)
        .bind(request.duration_days)
        .fetch_optional(&mut *self.db)
        .await?;

        match updated {
            Some(line) => Ok(line),
            None => {
                // Line missing, owned by another order, or its version moved
                if self.get_by_id(order_id, id).await?.is_some() {
                    Err(DbError::VersionConflict)
                } else {
                    Err(DbError::NotFound)
                }
            }
        }
    }

    #[instrument(skip(self), err)]
    pub async fn delete(&mut self, order_id: OrderId, id: OrderLineId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM order_lines WHERE id = $1 AND order_id = $2")
            .bind(id)
            .bind(order_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::orders::OrderStatus;
    use crate::db::models::orders::{OrderCreateDBRequest, OrderLineCreateDBRequest};
    use crate::test_utils::ClinicFixture;
    use sqlx::PgPool;

    fn line(medication: &str, quantity: i32) -> OrderLineCreateDBRequest {
        OrderLineCreateDBRequest {
            medication: medication.to_string(),
            quantity,
            dosage: Some("500mg".to_string()),
            frequency_hours: Some(8),
            single_application: false,
            treatment_started: false,
            duration_days: Some(7),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_order_with_lines_is_atomic(pool: PgPool) {
        let fixture = ClinicFixture::seed(&pool).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Orders::new(&mut conn);
        let order = repo
            .create(&OrderCreateDBRequest {
                doctor_id: fixture.doctor.id,
                patient_id: fixture.patient.id,
                insurer_id: Some(fixture.insurer.id),
                diagnosis: "Faringitis aguda".to_string(),
                observations: None,
                status: OrderStatus::Open,
                lines: vec![line("Amoxicilina", 21), line("Ibuprofeno", 10)],
            })
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Open);

        let mut lines_repo = OrderLines::new(&mut conn);
        let lines = lines_repo.list_for_order(order.id).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].medication, "Amoxicilina");
        assert_eq!(lines[1].medication, "Ibuprofeno");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_order_cascades_to_lines_only(pool: PgPool) {
        let fixture = ClinicFixture::seed(&pool).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Orders::new(&mut conn);
        let order = repo
            .create(&OrderCreateDBRequest {
                doctor_id: fixture.doctor.id,
                patient_id: fixture.patient.id,
                insurer_id: Some(fixture.insurer.id),
                diagnosis: "Control anual".to_string(),
                observations: Some("Sin novedades".to_string()),
                status: OrderStatus::Open,
                lines: vec![line("Paracetamol", 5), line("Loratadina", 3)],
            })
            .await
            .unwrap();

        assert!(repo.delete(order.id).await.unwrap());
        assert!(repo.get_by_id(order.id).await.unwrap().is_none());

        // Lines are gone with the order
        let mut lines_repo = OrderLines::new(&mut conn);
        assert!(lines_repo.list_for_order(order.id).await.unwrap().is_empty());

        // The referenced doctor, patient, insurer and person survive
        use crate::db::handlers::{Doctors, Insurers, Patients, Persons, Repository as _};
        assert!(Doctors::new(&mut conn).exists(fixture.doctor.id).await.unwrap());
        assert!(Patients::new(&mut conn).exists(fixture.patient.id).await.unwrap());
        assert!(Insurers::new(&mut conn).exists(fixture.insurer.id).await.unwrap());
        assert!(Persons::new(&mut conn).exists(fixture.person.id).await.unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_line_update_is_scoped_to_owning_order(pool: PgPool) {
        let fixture = ClinicFixture::seed(&pool).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Orders::new(&mut conn);
        let order_a = repo
            .create(&OrderCreateDBRequest {
                doctor_id: fixture.doctor.id,
                patient_id: fixture.patient.id,
                insurer_id: None,
                diagnosis: "A".to_string(),
                observations: None,
                status: OrderStatus::Open,
                lines: vec![line("Amoxicilina", 1)],
            })
            .await
            .unwrap();
        let order_b = repo
            .create(&OrderCreateDBRequest {
                doctor_id: fixture.doctor.id,
                patient_id: fixture.patient.id,
                insurer_id: None,
                diagnosis: "B".to_string(),
                observations: None,
                status: OrderStatus::Open,
                lines: vec![],
            })
            .await
            .unwrap();

        let mut lines_repo = OrderLines::new(&mut conn);
        let a_line = lines_repo.list_for_order(order_a.id).await.unwrap().remove(0);

        // Addressing the line through the wrong order is NotFound, not a hit
        let err = lines_repo
            .update(
                order_b.id,
                a_line.id,
                &OrderLineUpdateDBRequest {
                    expected_version: a_line.version,
                    medication: "Hijacked".to_string(),
                    quantity: 1,
                    dosage: None,
                    frequency_hours: None,
                    single_application: false,
                    treatment_started: false,
                    duration_days: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }
}
