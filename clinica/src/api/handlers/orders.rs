//! Handlers for medical orders and their owned order lines.

use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, header},
};
use sqlx::Acquire;

use crate::{
    AppState,
    api::Json,
    api::models::{
        doctors::DoctorResponse,
        insurers::InsurerResponse,
        orders::{
            GetOrderQuery, ListOrdersQuery, OrderCreate, OrderLineCreate, OrderLineReplace, OrderLineResponse, OrderReplace,
            OrderResponse,
        },
        patients::PatientResponse,
        users::CurrentUser,
    },
    db::{
        handlers::{Doctors, Insurers, OrderLines, Orders, Patients, Repository, orders::OrderFilter},
        models::orders::{OrderCreateDBRequest, OrderLineCreateDBRequest, OrderLineUpdateDBRequest, OrderUpdateDBRequest},
    },
    errors::{Error, Result, ValidationReason},
    types::{OrderId, OrderLineId},
};

fn parse_includes(include: Option<&str>) -> Vec<&str> {
    include
        .unwrap_or("")
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect()
}

fn order_not_found(id: OrderId) -> Error {
    Error::NotFound {
        resource: "MedicalOrder".to_string(),
        id: id.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/orders",
    tag = "orders",
    summary = "List medical orders",
    params(ListOrdersQuery),
    responses(
        (status = 200, description = "List of orders", body = Vec<OrderResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
    _: CurrentUser,
) -> Result<Json<Vec<OrderResponse>>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let orders;
    {
        let mut repo = Orders::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
        orders = repo
            .list(&OrderFilter::new(query.pagination.skip(), query.pagination.limit()))
            .await?;
    }

    let includes = parse_includes(query.include.as_deref());

    let mut responses = Vec::new();

    if !includes.is_empty() {
        let order_ids: Vec<_> = orders.iter().map(|o| o.id).collect();

        let mut lines_map = if includes.contains(&"lines") {
            let mut lines_repo = OrderLines::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
            Some(lines_repo.list_for_orders(&order_ids).await?)
        } else {
            None
        };

        let patients_map = if includes.contains(&"patient") {
            let patient_ids: Vec<_> = orders.iter().map(|o| o.patient_id).collect();
            let mut patients_repo = Patients::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
            Some(patients_repo.get_bulk(patient_ids).await?)
        } else {
            None
        };

        let doctors_map = if includes.contains(&"doctor") {
            let doctor_ids: Vec<_> = orders.iter().map(|o| o.doctor_id).collect();
            let mut doctors_repo = Doctors::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
            Some(doctors_repo.get_bulk(doctor_ids).await?)
        } else {
            None
        };

        let insurers_map = if includes.contains(&"insurer") {
            let insurer_ids: Vec<_> = orders.iter().filter_map(|o| o.insurer_id).collect();
            let mut insurers_repo = Insurers::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
            Some(insurers_repo.get_bulk(insurer_ids).await?)
        } else {
            None
        };

        for order in orders {
            let mut response = OrderResponse::from(order);

            if let Some(map) = lines_map.as_mut() {
                let lines = map.remove(&response.id).unwrap_or_default();
                response.lines = Some(lines.into_iter().map(OrderLineResponse::from).collect());
            }
            response.patient = patients_map
                .as_ref()
                .and_then(|map| map.get(&response.patient_id))
                .map(|p| PatientResponse::from(p.clone()));
            response.doctor = doctors_map
                .as_ref()
                .and_then(|map| map.get(&response.doctor_id))
                .map(|d| DoctorResponse::from(d.clone()));
            response.insurer = response
                .insurer_id
                .and_then(|insurer_id| insurers_map.as_ref().and_then(|map| map.get(&insurer_id)))
                .map(|i| InsurerResponse::from(i.clone()));

            responses.push(response);
        }
    } else {
        responses = orders.into_iter().map(OrderResponse::from).collect();
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(responses))
}

#[utoipa::path(
    get,
    path = "/orders/{id}",
    tag = "orders",
    summary = "Get medical order",
    params(("id" = i32, Path, description = "Order ID"), GetOrderQuery),
    responses(
        (status = 200, description = "Order details", body = OrderResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Order not found"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Query(query): Query<GetOrderQuery>,
    _: CurrentUser,
) -> Result<Json<OrderResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let order;
    {
        let mut repo = Orders::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
        order = repo.get_by_id(id).await?.ok_or_else(|| order_not_found(id))?;
    }

    let includes = parse_includes(query.include.as_deref());
    let mut response = OrderResponse::from(order);

    if includes.contains(&"lines") {
        let mut lines_repo = OrderLines::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
        let lines = lines_repo.list_for_order(id).await?;
        response.lines = Some(lines.into_iter().map(OrderLineResponse::from).collect());
    }
    if includes.contains(&"patient") {
        let mut patients_repo = Patients::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
        response.patient = patients_repo.get_by_id(response.patient_id).await?.map(PatientResponse::from);
    }
    if includes.contains(&"doctor") {
        let mut doctors_repo = Doctors::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
        response.doctor = doctors_repo.get_by_id(response.doctor_id).await?.map(DoctorResponse::from);
    }
    if includes.contains(&"insurer")
        && let Some(insurer_id) = response.insurer_id
    {
        let mut insurers_repo = Insurers::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
        response.insurer = insurers_repo.get_by_id(insurer_id).await?.map(InsurerResponse::from);
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/orders",
    tag = "orders",
    summary = "Create medical order",
    request_body = OrderCreate,
    responses(
        (status = 201, description = "Order created successfully", body = OrderResponse),
        (status = 400, description = "Invalid request or unknown doctor/patient/insurer"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_order(
    State(state): State<AppState>,
    _: CurrentUser,
    Json(create): Json<OrderCreate>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<OrderResponse>)> {
    create.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    // The repository inserts the order and its lines in one transaction
    let order = {
        let mut repo = Orders::new(&mut conn);
        repo.create(&OrderCreateDBRequest::from(create)).await?
    };

    let mut lines_repo = OrderLines::new(&mut conn);
    let lines = lines_repo.list_for_order(order.id).await?;

    let location = format!("/api/orders/{}", order.id);
    let response = OrderResponse::from(order).with_lines(lines.into_iter().map(OrderLineResponse::from).collect());

    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(response)))
}

#[utoipa::path(
    put,
    path = "/orders/{id}",
    tag = "orders",
    summary = "Replace medical order",
    request_body = OrderReplace,
    params(("id" = i32, Path, description = "Order ID")),
    responses(
        (status = 204, description = "Order replaced successfully"),
        (status = 400, description = "Invalid request or id mismatch"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Concurrent modification"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn replace_order(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    _: CurrentUser,
    Json(replace): Json<OrderReplace>,
) -> Result<StatusCode> {
    if replace.id != id {
        return Err(Error::Validation {
            reason: ValidationReason::IdMismatch,
            message: "path id does not match body id".to_string(),
        });
    }
    replace.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Orders::new(&mut conn);

    repo.update(id, &OrderUpdateDBRequest::from(replace)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/orders/{id}",
    tag = "orders",
    summary = "Delete medical order and its lines",
    params(("id" = i32, Path, description = "Order ID")),
    responses(
        (status = 204, description = "Order and its lines deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Order not found"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_order(State(state): State<AppState>, Path(id): Path<OrderId>, _: CurrentUser) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Orders::new(&mut conn);

    if repo.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(order_not_found(id))
    }
}

#[utoipa::path(
    get,
    path = "/orders/{order_id}/lines",
    tag = "orders",
    summary = "List an order's lines",
    params(("order_id" = i32, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order lines", body = Vec<OrderLineResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Order not found"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_order_lines(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
    _: CurrentUser,
) -> Result<Json<Vec<OrderLineResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if !Orders::new(&mut conn).exists(order_id).await? {
        return Err(order_not_found(order_id));
    }

    let mut lines_repo = OrderLines::new(&mut conn);
    let lines = lines_repo.list_for_order(order_id).await?;

    Ok(Json(lines.into_iter().map(OrderLineResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/orders/{order_id}/lines/{id}",
    tag = "orders",
    summary = "Get an order line",
    params(
        ("order_id" = i32, Path, description = "Order ID"),
        ("id" = i32, Path, description = "Line ID"),
    ),
    responses(
        (status = 200, description = "Order line", body = OrderLineResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Order or line not found"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_order_line(
    State(state): State<AppState>,
    Path((order_id, id)): Path<(OrderId, OrderLineId)>,
    _: CurrentUser,
) -> Result<Json<OrderLineResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut lines_repo = OrderLines::new(&mut conn);

    match lines_repo.get_by_id(order_id, id).await? {
        Some(line) => Ok(Json(OrderLineResponse::from(line))),
        None => Err(Error::NotFound {
            resource: "OrderLine".to_string(),
            id: id.to_string(),
        }),
    }
}

#[utoipa::path(
    post,
    path = "/orders/{order_id}/lines",
    tag = "orders",
    summary = "Add a line to an order",
    request_body = OrderLineCreate,
    params(("order_id" = i32, Path, description = "Order ID")),
    responses(
        (status = 201, description = "Line created successfully", body = OrderLineResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Order not found"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_order_line(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
    _: CurrentUser,
    Json(create): Json<OrderLineCreate>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<OrderLineResponse>)> {
    create.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if !Orders::new(&mut conn).exists(order_id).await? {
        return Err(order_not_found(order_id));
    }

    let mut lines_repo = OrderLines::new(&mut conn);
    let line = lines_repo.create(order_id, &OrderLineCreateDBRequest::from(create)).await?;

    let location = format!("/api/orders/{order_id}/lines/{}", line.id);

    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(OrderLineResponse::from(line))))
}

#[utoipa::path(
    put,
    path = "/orders/{order_id}/lines/{id}",
    tag = "orders",
    summary = "Replace an order line",
    request_body = OrderLineReplace,
    params(
        ("order_id" = i32, Path, description = "Order ID"),
        ("id" = i32, Path, description = "Line ID"),
    ),
    responses(
        (status = 204, description = "Line replaced successfully"),
        (status = 400, description = "Invalid request or id mismatch"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Order or line not found"),
        (status = 409, description = "Concurrent modification"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn replace_order_line(
    State(state): State<AppState>,
    Path((order_id, id)): Path<(OrderId, OrderLineId)>,
    _: CurrentUser,
    Json(replace): Json<OrderLineReplace>,
) -> Result<StatusCode> {
    if replace.id != id {
        return Err(Error::Validation {
            reason: ValidationReason::IdMismatch,
            message: "path id does not match body id".to_string(),
        });
    }
    replace.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut lines_repo = OrderLines::new(&mut conn);

    lines_repo.update(order_id, id, &OrderLineUpdateDBRequest::from(replace)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/orders/{order_id}/lines/{id}",
    tag = "orders",
    summary = "Delete an order line",
    params(
        ("order_id" = i32, Path, description = "Order ID"),
        ("id" = i32, Path, description = "Line ID"),
    ),
    responses(
        (status = 204, description = "Line deleted successfully"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Order or line not found"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_order_line(
    State(state): State<AppState>,
    Path((order_id, id)): Path<(OrderId, OrderLineId)>,
    _: CurrentUser,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut lines_repo = OrderLines::new(&mut conn);

    if lines_repo.delete(order_id, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound {
            resource: "OrderLine".to_string(),
            id: id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::authed_server;
    use serde_json::json;
    use sqlx::PgPool;

    /// The whole clinical flow: person, insurer, specialty, doctor, patient,
    /// then an order with two lines, then the cascade delete.
    #[sqlx::test]
    #[test_log::test]
    async fn test_end_to_end_order_lifecycle(pool: PgPool) {
        let server = authed_server(&pool).await;

        let person: serde_json::Value = server
            .post("/api/persons")
            .json(&json!({
                "first_name": "Pedro", "last_name": "Paz", "birth_date": "1970-01-02",
                "gender": "M", "national_id": "12345678",
                "address": null, "phone": null, "email": null
            }))
            .await
            .json();

        let insurer: serde_json::Value = server
            .post("/api/insurers")
            .json(&json!({"name": "PAMI", "code": "H1", "description": null, "active": true}))
            .await
            .json();

        let specialty: serde_json::Value = server.post("/api/specialties").json(&json!({"name": "Cardiologia"})).await.json();

        let doctor: serde_json::Value = server
            .post("/api/doctors")
            .json(&json!({
                "person_id": person["id"], "specialty_id": specialty["id"],
                "license_number": "MN-4521", "phone": null, "email": null, "active": true
            }))
            .await
            .json();

        let patient: serde_json::Value = server
            .post("/api/patients")
            .json(&json!({"person_id": person["id"], "insurer_id": insurer["id"], "active": true}))
            .await
            .json();

        let response = server
            .post("/api/orders")
            .json(&json!({
                "doctor_id": doctor["id"],
                "patient_id": patient["id"],
                "insurer_id": insurer["id"],
                "diagnosis": "Hipertension arterial",
                "observations": "Control en 30 dias",
                "status": "open",
                "lines": [
                    {"medication": "Enalapril", "quantity": 30, "dosage": "10mg", "frequency_hours": 12,
                     "single_application": false, "treatment_started": false, "duration_days": 30},
                    {"medication": "Aspirina", "quantity": 30, "dosage": "100mg", "frequency_hours": 24,
                     "single_application": false, "treatment_started": true, "duration_days": 30}
                ]
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let order: OrderResponse = response.json();
        assert_eq!(order.lines.as_ref().unwrap().len(), 2);

        // Expanded read resolves every relationship eagerly
        let expanded: OrderResponse = server
            .get(&format!("/api/orders/{}?include=lines,patient,doctor,insurer", order.id))
            .await
            .json();
        assert_eq!(expanded.lines.unwrap().len(), 2);
        assert_eq!(expanded.patient.unwrap().person_id, person["id"].as_i64().unwrap() as i32);
        assert_eq!(expanded.doctor.unwrap().license_number, "MN-4521");
        assert_eq!(expanded.insurer.unwrap().code, "H1");

        // Deleting the order removes both lines...
        server
            .delete(&format!("/api/orders/{}", order.id))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get(&format!("/api/orders/{}/lines", order.id))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        // ...but not the person, doctor or insurer
        server
            .get(&format!("/api/persons/{}", person["id"]))
            .await
            .assert_status_ok();
        server
            .get(&format!("/api/doctors/{}", doctor["id"]))
            .await
            .assert_status_ok();
        server
            .get(&format!("/api/insurers/{}", insurer["id"]))
            .await
            .assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_negative_quantity_is_rejected(pool: PgPool) {
        let fixture = crate::test_utils::ClinicFixture::seed(&pool).await;
        let server = authed_server(&pool).await;

        let response = server
            .post("/api/orders")
            .json(&json!({
                "doctor_id": fixture.doctor.id,
                "patient_id": fixture.patient.id,
                "insurer_id": null,
                "diagnosis": "Gripe",
                "observations": null,
                "status": "open",
                "lines": [
                    {"medication": "Paracetamol", "quantity": -1, "dosage": null, "frequency_hours": null,
                     "single_application": null, "treatment_started": null, "duration_days": null}
                ]
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let error: serde_json::Value = response.json();
        assert_eq!(error["reason"], json!("negative_quantity"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_line_sub_resource_crud(pool: PgPool) {
        let fixture = crate::test_utils::ClinicFixture::seed(&pool).await;
        let server = authed_server(&pool).await;

        let order: OrderResponse = server
            .post("/api/orders")
            .json(&json!({
                "doctor_id": fixture.doctor.id,
                "patient_id": fixture.patient.id,
                "insurer_id": null,
                "diagnosis": "Otitis",
                "observations": null,
                "status": "open",
                "lines": []
            }))
            .await
            .json();

        let response = server
            .post(&format!("/api/orders/{}/lines", order.id))
            .json(&json!({"medication": "Amoxicilina", "quantity": 14, "dosage": "875mg", "frequency_hours": 12,
                          "single_application": false, "treatment_started": false, "duration_days": 7}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let line: OrderLineResponse = response.json();

        // Replace it
        let response = server
            .put(&format!("/api/orders/{}/lines/{}", order.id, line.id))
            .json(&json!({
                "id": line.id, "version": line.version,
                "medication": "Amoxicilina", "quantity": 20, "dosage": "875mg", "frequency_hours": 8,
                "single_application": false, "treatment_started": true, "duration_days": 10
            }))
            .await;
        response.assert_status(StatusCode::NO_CONTENT);

        let fetched: OrderLineResponse = server
            .get(&format!("/api/orders/{}/lines/{}", order.id, line.id))
            .await
            .json();
        assert_eq!(fetched.quantity, 20);
        assert!(fetched.treatment_started);
        assert_eq!(fetched.version, line.version + 1);

        // Delete it, twice
        server
            .delete(&format!("/api/orders/{}/lines/{}", order.id, line.id))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .delete(&format!("/api/orders/{}/lines/{}", order.id, line.id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_line_create_on_missing_order_is_404(pool: PgPool) {
        let server = authed_server(&pool).await;

        let response = server
            .post("/api/orders/999999/lines")
            .json(&json!({"medication": "Ibuprofeno", "quantity": 1, "dosage": null, "frequency_hours": null,
                          "single_application": null, "treatment_started": null, "duration_days": null}))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }
}
