use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, header},
};
use sqlx::Acquire;

use crate::{
    AppState,
    api::Json,
    api::models::{
        doctors::{DoctorCreate, DoctorReplace, DoctorResponse, GetDoctorQuery, ListDoctorsQuery},
        persons::PersonResponse,
        specialties::SpecialtyResponse,
        users::CurrentUser,
    },
    db::{
        handlers::{Doctors, Persons, Repository, Specialties, doctors::DoctorFilter},
        models::doctors::{DoctorCreateDBRequest, DoctorUpdateDBRequest},
    },
    errors::{Error, Result, ValidationReason},
    types::DoctorId,
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
    path = "/doctors",
    tag = "doctors",
    summary = "List doctors",
    params(ListDoctorsQuery),
    responses(
        (status = 200, description = "List of doctors", body = Vec<DoctorResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_doctors(
    State(state): State<AppState>,
    Query(query): Query<ListDoctorsQuery>,
    _: CurrentUser,
) -> Result<Json<Vec<DoctorResponse>>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let doctors;
    {
        let mut repo = Doctors::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
        doctors = repo
            .list(&DoctorFilter::new(query.pagination.skip(), query.pagination.limit()))
            .await?;
    }

    let includes = parse_includes(query.include.as_deref());

    let mut responses = Vec::new();

    if !includes.is_empty() {
        // Resolve requested relationships eagerly, in bulk
        let persons_map = if includes.contains(&"person") {
            let person_ids: Vec<_> = doctors.iter().map(|d| d.person_id).collect();
            let mut persons_repo = Persons::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
            Some(persons_repo.get_bulk(person_ids).await?)
        } else {
            None
        };

        let specialties_map = if includes.contains(&"specialty") {
            let specialty_ids: Vec<_> = doctors.iter().map(|d| d.specialty_id).collect();
            let mut specialties_repo = Specialties::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
            Some(specialties_repo.get_bulk(specialty_ids).await?)
        } else {
            None
        };

        for doctor in doctors {
            let person = persons_map
                .as_ref()
                .and_then(|map| map.get(&doctor.person_id))
                .map(|p| PersonResponse::from(p.clone()));
            let specialty = specialties_map
                .as_ref()
                .and_then(|map| map.get(&doctor.specialty_id))
                .map(|s| SpecialtyResponse::from(s.clone()));

            responses.push(DoctorResponse::from(doctor).with_relationships(person, specialty));
        }
    } else {
        responses = doctors.into_iter().map(DoctorResponse::from).collect();
    }

    // Commit the transaction to ensure all reads were atomic
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(responses))
}

#[utoipa::path(
    get,
    path = "/doctors/{id}",
    tag = "doctors",
    summary = "Get doctor",
    params(("id" = i32, Path, description = "Doctor ID"), GetDoctorQuery),
    responses(
        (status = 200, description = "Doctor details", body = DoctorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Doctor not found"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_doctor(
    State(state): State<AppState>,
    Path(id): Path<DoctorId>,
    Query(query): Query<GetDoctorQuery>,
    _: CurrentUser,
) -> Result<Json<DoctorResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let doctor;
    {
        let mut repo = Doctors::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
        doctor = repo.get_by_id(id).await?.ok_or_else(|| Error::NotFound {
            resource: "Doctor".to_string(),
            id: id.to_string(),
        })?;
    }

    let includes = parse_includes(query.include.as_deref());

    let person = if includes.contains(&"person") {
        let mut persons_repo = Persons::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
        persons_repo.get_by_id(doctor.person_id).await?.map(PersonResponse::from)
    } else {
        None
    };

    let specialty = if includes.contains(&"specialty") {
        let mut specialties_repo = Specialties::new(tx.acquire().await.map_err(|e| Error::Database(e.into()))?);
        specialties_repo.get_by_id(doctor.specialty_id).await?.map(SpecialtyResponse::from)
    } else {
        None
    };

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(DoctorResponse::from(doctor).with_relationships(person, specialty)))
}

#[utoipa::path(
    post,
    path = "/doctors",
    tag = "doctors",
    summary = "Create doctor",
    request_body = DoctorCreate,
    responses(
        (status = 201, description = "Doctor created successfully", body = DoctorResponse),
        (status = 400, description = "Invalid request or unknown person/specialty"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_doctor(
    State(state): State<AppState>,
    _: CurrentUser,
    Json(create): Json<DoctorCreate>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<DoctorResponse>)> {
    create.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Doctors::new(&mut conn);

    let doctor = repo.create(&DoctorCreateDBRequest::from(create)).await?;
    let location = format!("/api/doctors/{}", doctor.id);

    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(DoctorResponse::from(doctor))))
}

#[utoipa::path(
    put,
    path = "/doctors/{id}",
    tag = "doctors",
    summary = "Replace doctor",
    request_body = DoctorReplace,
    params(("id" = i32, Path, description = "Doctor ID")),
    responses(
        (status = 204, description = "Doctor replaced successfully"),
        (status = 400, description = "Invalid request or id mismatch"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Doctor not found"),
        (status = 409, description = "Concurrent modification"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn replace_doctor(
    State(state): State<AppState>,
    Path(id): Path<DoctorId>,
    _: CurrentUser,
    Json(replace): Json<DoctorReplace>,
) -> Result<StatusCode> {
    if replace.id != id {
        return Err(Error::Validation {
            reason: ValidationReason::IdMismatch,
            message: "path id does not match body id".to_string(),
        });
    }
    replace.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Doctors::new(&mut conn);

    repo.update(id, &DoctorUpdateDBRequest::from(replace)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/doctors/{id}",
    tag = "doctors",
    summary = "Delete doctor",
    params(("id" = i32, Path, description = "Doctor ID")),
    responses(
        (status = 204, description = "Doctor deleted successfully"),
        (status = 400, description = "Doctor is still referenced"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Doctor not found"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_doctor(State(state): State<AppState>, Path(id): Path<DoctorId>, _: CurrentUser) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Doctors::new(&mut conn);

    if repo.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound {
            resource: "Doctor".to_string(),
            id: id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ClinicFixture, authed_server};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_doctor_with_includes(pool: PgPool) {
        let fixture = ClinicFixture::seed(&pool).await;
        let server = authed_server(&pool).await;

        // Without include, only foreign keys are present
        let bare: DoctorResponse = server.get(&format!("/api/doctors/{}", fixture.doctor.id)).await.json();
        assert!(bare.person.is_none());
        assert!(bare.specialty.is_none());

        let expanded: DoctorResponse = server
            .get(&format!("/api/doctors/{}?include=person,specialty", fixture.doctor.id))
            .await
            .json();
        assert_eq!(expanded.person.as_ref().unwrap().id, fixture.person.id);
        assert_eq!(expanded.specialty.as_ref().unwrap().id, fixture.specialty.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_doctor_with_unknown_person_is_400(pool: PgPool) {
        let fixture = ClinicFixture::seed(&pool).await;
        let server = authed_server(&pool).await;

        let body = serde_json::json!({
            "person_id": 999999,
            "specialty_id": fixture.specialty.id,
            "license_number": "MP-1234",
            "phone": null,
            "email": null,
            "active": true
        });

        let response = server.post("/api/doctors").json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let error: serde_json::Value = response.json();
        assert_eq!(error["reason"], serde_json::json!("invalid_reference"));
    }
}
