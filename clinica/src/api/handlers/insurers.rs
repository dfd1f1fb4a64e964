use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, header},
};

use crate::{
    AppState,
    api::Json,
    api::models::{
        insurers::{InsurerCreate, InsurerReplace, InsurerResponse, ListInsurersQuery},
        users::CurrentUser,
    },
    db::{
        handlers::{Insurers, Repository, insurers::InsurerFilter},
        models::insurers::{InsurerCreateDBRequest, InsurerUpdateDBRequest},
    },
    errors::{Error, Result, ValidationReason},
    types::InsurerId,
};

#[utoipa::path(
    get,
    path = "/insurers",
    tag = "insurers",
    summary = "List health insurers",
    params(ListInsurersQuery),
    responses(
        (status = 200, description = "List of insurers", body = Vec<InsurerResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_insurers(
    State(state): State<AppState>,
    Query(query): Query<ListInsurersQuery>,
    _: CurrentUser,
) -> Result<Json<Vec<InsurerResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Insurers::new(&mut conn);

    let insurers = repo
        .list(&InsurerFilter::new(query.pagination.skip(), query.pagination.limit()))
        .await?;

    Ok(Json(insurers.into_iter().map(InsurerResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/insurers/{id}",
    tag = "insurers",
    summary = "Get health insurer",
    params(("id" = i32, Path, description = "Insurer ID")),
    responses(
        (status = 200, description = "Insurer details", body = InsurerResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Insurer not found"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_insurer(State(state): State<AppState>, Path(id): Path<InsurerId>, _: CurrentUser) -> Result<Json<InsurerResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Insurers::new(&mut conn);

    match repo.get_by_id(id).await? {
        Some(insurer) => Ok(Json(InsurerResponse::from(insurer))),
        None => Err(Error::NotFound {
            resource: "HealthInsurer".to_string(),
            id: id.to_string(),
        }),
    }
}

#[utoipa::path(
    post,
    path = "/insurers",
    tag = "insurers",
    summary = "Create health insurer",
    request_body = InsurerCreate,
    responses(
        (status = 201, description = "Insurer created successfully", body = InsurerResponse),
        (status = 400, description = "Invalid request or duplicate name/code"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_insurer(
    State(state): State<AppState>,
    _: CurrentUser,
    Json(create): Json<InsurerCreate>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<InsurerResponse>)> {
    create.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Insurers::new(&mut conn);

    let insurer = repo.create(&InsurerCreateDBRequest::from(create)).await?;
    let location = format!("/api/insurers/{}", insurer.id);

    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(InsurerResponse::from(insurer))))
}

#[utoipa::path(
    put,
    path = "/insurers/{id}",
    tag = "insurers",
    summary = "Replace health insurer",
    request_body = InsurerReplace,
    params(("id" = i32, Path, description = "Insurer ID")),
    responses(
        (status = 204, description = "Insurer replaced successfully"),
        (status = 400, description = "Invalid request or id mismatch"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Insurer not found"),
        (status = 409, description = "Concurrent modification"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn replace_insurer(
    State(state): State<AppState>,
    Path(id): Path<InsurerId>,
    _: CurrentUser,
    Json(replace): Json<InsurerReplace>,
) -> Result<StatusCode> {
    if replace.id != id {
        return Err(Error::Validation {
            reason: ValidationReason::IdMismatch,
            message: "path id does not match body id".to_string(),
        });
    }
    replace.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Insurers::new(&mut conn);

    repo.update(id, &InsurerUpdateDBRequest::from(replace)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/insurers/{id}",
    tag = "insurers",
    summary = "Delete health insurer",
    params(("id" = i32, Path, description = "Insurer ID")),
    responses(
        (status = 204, description = "Insurer deleted successfully"),
        (status = 400, description = "Insurer is still referenced"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Insurer not found"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_insurer(State(state): State<AppState>, Path(id): Path<InsurerId>, _: CurrentUser) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Insurers::new(&mut conn);

    if repo.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound {
            resource: "HealthInsurer".to_string(),
            id: id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::authed_server;
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_code_is_400_unique_conflict(pool: PgPool) {
        let server = authed_server(&pool).await;

        let body = json!({"name": "OSDE", "code": "410", "description": null, "active": true});
        server.post("/api/insurers").json(&body).await.assert_status(StatusCode::CREATED);

        let body = json!({"name": "Otra Obra", "code": "410", "description": null, "active": true});
        let response = server.post("/api/insurers").json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let error: serde_json::Value = response.json();
        assert_eq!(error["reason"], json!("unique_conflict"));
    }
}
