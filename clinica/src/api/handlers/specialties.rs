use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, header},
};

use crate::{
    AppState,
    api::Json,
    api::models::{
        specialties::{ListSpecialtiesQuery, SpecialtyCreate, SpecialtyReplace, SpecialtyResponse},
        users::CurrentUser,
    },
    db::{
        handlers::{Repository, Specialties, specialties::SpecialtyFilter},
        models::specialties::{SpecialtyCreateDBRequest, SpecialtyUpdateDBRequest},
    },
    errors::{Error, Result, ValidationReason},
    types::SpecialtyId,
};

#[utoipa::path(
    get,
    path = "/specialties",
    tag = "specialties",
    summary = "List specialties",
    params(ListSpecialtiesQuery),
    responses(
        (status = 200, description = "List of specialties", body = Vec<SpecialtyResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_specialties(
    State(state): State<AppState>,
    Query(query): Query<ListSpecialtiesQuery>,
    _: CurrentUser,
) -> Result<Json<Vec<SpecialtyResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Specialties::new(&mut conn);

    let specialties = repo
        .list(&SpecialtyFilter::new(query.pagination.skip(), query.pagination.limit()))
        .await?;

    Ok(Json(specialties.into_iter().map(SpecialtyResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/specialties/{id}",
    tag = "specialties",
    summary = "Get specialty",
    params(("id" = i32, Path, description = "Specialty ID")),
    responses(
        (status = 200, description = "Specialty details", body = SpecialtyResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Specialty not found"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_specialty(
    State(state): State<AppState>,
    Path(id): Path<SpecialtyId>,
    _: CurrentUser,
) -> Result<Json<SpecialtyResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Specialties::new(&mut conn);

    match repo.get_by_id(id).await? {
        Some(specialty) => Ok(Json(SpecialtyResponse::from(specialty))),
        None => Err(Error::NotFound {
            resource: "Specialty".to_string(),
            id: id.to_string(),
        }),
    }
}

#[utoipa::path(
    post,
    path = "/specialties",
    tag = "specialties",
    summary = "Create specialty",
    request_body = SpecialtyCreate,
    responses(
        (status = 201, description = "Specialty created successfully", body = SpecialtyResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_specialty(
    State(state): State<AppState>,
    _: CurrentUser,
    Json(create): Json<SpecialtyCreate>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<SpecialtyResponse>)> {
    create.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Specialties::new(&mut conn);

    let specialty = repo.create(&SpecialtyCreateDBRequest::from(create)).await?;
    let location = format!("/api/specialties/{}", specialty.id);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(SpecialtyResponse::from(specialty)),
    ))
}

#[utoipa::path(
    put,
    path = "/specialties/{id}",
    tag = "specialties",
    summary = "Replace specialty",
    request_body = SpecialtyReplace,
    params(("id" = i32, Path, description = "Specialty ID")),
    responses(
        (status = 204, description = "Specialty replaced successfully"),
        (status = 400, description = "Invalid request or id mismatch"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Specialty not found"),
        (status = 409, description = "Concurrent modification"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn replace_specialty(
    State(state): State<AppState>,
    Path(id): Path<SpecialtyId>,
    _: CurrentUser,
    Json(replace): Json<SpecialtyReplace>,
) -> Result<StatusCode> {
    if replace.id != id {
        return Err(Error::Validation {
            reason: ValidationReason::IdMismatch,
            message: "path id does not match body id".to_string(),
        });
    }
    replace.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Specialties::new(&mut conn);

    repo.update(id, &SpecialtyUpdateDBRequest::from(replace)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/specialties/{id}",
    tag = "specialties",
    summary = "Delete specialty",
    params(("id" = i32, Path, description = "Specialty ID")),
    responses(
        (status = 204, description = "Specialty deleted successfully"),
        (status = 400, description = "Specialty is still referenced"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Specialty not found"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_specialty(State(state): State<AppState>, Path(id): Path<SpecialtyId>, _: CurrentUser) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Specialties::new(&mut conn);

    if repo.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound {
            resource: "Specialty".to_string(),
            id: id.to_string(),
        })
    }
}
