use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, header},
};
use sqlx::Acquire;

use crate::{
    AppState,
    api::Json,
    api::models::{
        insurers::InsurerResponse,
        patients::{GetPatientQuery, ListPatientsQuery, PatientCreate, PatientReplace, PatientResponse},
        persons::PersonResponse,
        users::CurrentUser,
    },
    db::{
        handlers::{Insurers, Patients, Persons, Repository, patients::PatientFilter},
        models::patients::{PatientCreateDBRequest, PatientUpdateDBRequest},
    },
    errors::{Error, Result, ValidationReason},
    types::PatientId,
};

fn parse_includes(include: Option<&str>) -> Vec<&str> {
    include
        .unwrap_or("")
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect()
}

#[utoipa::path(
    get,
    path = "/patients",
    tag = "patients",
    summary = "List patients",
    params(ListPatientsQuery),
    responses(
        (status = 200, description = "List of patients", body = Vec<PatientResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_patients(
    State(state): State<AppState>,
    Query(query): Query<ListPatientsQuery>,
    _: CurrentUser,
) -> Result<Json<Vec<PatientResponse>>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let patients;
    {
        let mut repo = Patients::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
        patients = repo
            .list(&PatientFilter::new(query.pagination.skip(), query.pagination.limit()))
            .await?;
    }

    let includes = parse_includes(query.include.as_deref());

    let mut responses = Vec::new();

    if !includes.is_empty() {
        let persons_map = if includes.contains(&"person") {
            let person_ids: Vec<_> = patients.iter().map(|p| p.person_id).collect();
            let mut persons_repo = Persons::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
            Some(persons_repo.get_bulk(person_ids).await?)
        } else {
            None
        };

        let insurers_map = if includes.contains(&"insurer") {
            let insurer_ids: Vec<_> = patients.iter().map(|p| p.insurer_id).collect();
            let mut insurers_repo = Insurers::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
            Some(insurers_repo.get_bulk(insurer_ids).await?)
        } else {
            None
        };

        for patient in patients {
            let person = persons_map
                .as_ref()
                .and_then(|map| map.get(&patient.person_id))
                .map(|p| PersonResponse::from(p.clone()));
            let insurer = insurers_map
                .as_ref()
                .and_then(|map| map.get(&patient.insurer_id))
                .map(|i| InsurerResponse::from(i.clone()));

            responses.push(PatientResponse::from(patient).with_relationships(person, insurer));
        }
    } else {
        responses = patients.into_iter().map(PatientResponse::from).collect();
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(responses))
}

#[utoipa::path(
    get,
    path = "/patients/{id}",
    tag = "patients",
    summary = "Get patient",
    params(("id" = i32, Path, description = "Patient ID"), GetPatientQuery),
    responses(
        (status = 200, description = "Patient details", body = PatientResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Patient not found"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_patient(
    State(state): State<AppState>,
    Path(id): Path<PatientId>,
    Query(query): Query<GetPatientQuery>,
    _: CurrentUser,
) -> Result<Json<PatientResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let patient;
    {
        let mut repo = Patients::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
        patient = repo.get_by_id(id).await?.ok_or_else(|| Error::NotFound {
            resource: "Patient".to_string(),
            id: id.to_string(),
        })?;
    }

    let includes = parse_includes(query.include.as_deref());

    let person = if includes.contains(&"person") {
        let mut persons_repo = Persons::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
        persons_repo.get_by_id(patient.person_id).await?.map(PersonResponse::from)
    } else {
        None
    };

    let insurer = if includes.contains(&"insurer") {
        let mut insurers_repo = Insurers::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
        insurers_repo.get_by_id(patient.insurer_id).await?.map(InsurerResponse::from)
    } else {
        None
    };

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(PatientResponse::from(patient).with_relationships(person, insurer)))
}

#[utoipa::path(
    post,
    path = "/patients",
    tag = "patients",
    summary = "Create patient",
    request_body = PatientCreate,
    responses(
        (status = 201, description = "Patient created successfully", body = PatientResponse),
        (status = 400, description = "Invalid request or unknown person/insurer"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_patient(
    State(state): State<AppState>,
    _: CurrentUser,
    Json(create): Json<PatientCreate>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<PatientResponse>)> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Patients::new(&mut conn);

    let patient = repo.create(&PatientCreateDBRequest::from(create)).await?;
    let location = format!("/api/patients/{}", patient.id);

    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(PatientResponse::from(patient))))
}

#[utoipa::path(
    put,
    path = "/patients/{id}",
    tag = "patients",
    summary = "Replace patient",
    request_body = PatientReplace,
    params(("id" = i32, Path, description = "Patient ID")),
    responses(
        (status = 204, description = "Patient replaced successfully"),
        (status = 400, description = "Invalid request or id mismatch"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Patient not found"),
        (status = 409, description = "Concurrent modification"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn replace_patient(
    State(state): State<AppState>,
    Path(id): Path<PatientId>,
    _: CurrentUser,
    Json(replace): Json<PatientReplace>,
) -> Result<StatusCode> {
    if replace.id != id {
        return Err(Error::Validation {
            reason: ValidationReason::IdMismatch,
            message: "path id does not match body id".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Patients::new(&mut conn);

    repo.update(id, &PatientUpdateDBRequest::from(replace)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/patients/{id}",
    tag = "patients",
    summary = "Delete patient",
    params(("id" = i32, Path, description = "Patient ID")),
    responses(
        (status = 204, description = "Patient deleted successfully"),
        (status = 400, description = "Patient is still referenced"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Patient not found"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_patient(State(state): State<AppState>, Path(id): Path<PatientId>, _: CurrentUser) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Patients::new(&mut conn);

    if repo.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound {
            resource: "Patient".to_string(),
            id: id.to_string(),
        })
    }
}
