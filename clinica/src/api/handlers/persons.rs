use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, header},
};

use crate::{
    AppState,
    api::Json,
    api::models::{
        persons::{ListPersonsQuery, PersonCreate, PersonReplace, PersonResponse},
        users::CurrentUser,
    },
    db::{
        handlers::{Persons, Repository, persons::PersonFilter},
        models::persons::{PersonCreateDBRequest, PersonUpdateDBRequest},
    },
    errors::{Error, Result, ValidationReason},
    types::PersonId,
};

#[utoipa::path(
    get,
    path = "/persons",
    tag = "persons",
    summary = "List persons",
    params(ListPersonsQuery),
    responses(
        (status = 200, description = "List of persons", body = Vec<PersonResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_persons(
    State(state): State<AppState>,
    Query(query): Query<ListPersonsQuery>,
    _: CurrentUser,
) -> Result<Json<Vec<PersonResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Persons::new(&mut conn);

    let persons = repo
        .list(&PersonFilter::new(query.pagination.skip(), query.pagination.limit()))
        .await?;

    Ok(Json(persons.into_iter().map(PersonResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/persons/{id}",
    tag = "persons",
    summary = "Get person",
    params(("id" = i32, Path, description = "Person ID")),
    responses(
        (status = 200, description = "Person details", body = PersonResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Person not found"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_person(State(state): State<AppState>, Path(id): Path<PersonId>, _: CurrentUser) -> Result<Json<PersonResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Persons::new(&mut conn);

    match repo.get_by_id(id).await? {
        Some(person) => Ok(Json(PersonResponse::from(person))),
        None => Err(Error::NotFound {
            resource: "Person".to_string(),
            id: id.to_string(),
        }),
    }
}

#[utoipa::path(
    post,
    path = "/persons",
    tag = "persons",
    summary = "Create person",
    request_body = PersonCreate,
    responses(
        (status = 201, description = "Person created successfully", body = PersonResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_person(
    State(state): State<AppState>,
    _: CurrentUser,
    Json(create): Json<PersonCreate>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<PersonResponse>)> {
    create.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Persons::new(&mut conn);

    let person = repo.create(&PersonCreateDBRequest::from(create)).await?;
    let location = format!("/api/persons/{}", person.id);

    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(PersonResponse::from(person))))
}

#[utoipa::path(
    put,
    path = "/persons/{id}",
    tag = "persons",
    summary = "Replace person",
    request_body = PersonReplace,
    params(("id" = i32, Path, description = "Person ID")),
    responses(
        (status = 204, description = "Person replaced successfully"),
        (status = 400, description = "Invalid request or id mismatch"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Person not found"),
        (status = 409, description = "Concurrent modification"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn replace_person(
    State(state): State<AppState>,
    Path(id): Path<PersonId>,
    _: CurrentUser,
    Json(replace): Json<PersonReplace>,
) -> Result<StatusCode> {
    if replace.id != id {
        return Err(Error::Validation {
            reason: ValidationReason::IdMismatch,
            message: "path id does not match body id".to_string(),
        });
    }
    replace.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Persons::new(&mut conn);

    repo.update(id, &PersonUpdateDBRequest::from(replace)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/persons/{id}",
    tag = "persons",
    summary = "Delete person",
    params(("id" = i32, Path, description = "Person ID")),
    responses(
        (status = 204, description = "Person deleted successfully"),
        (status = 400, description = "Person is still referenced"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Person not found"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_person(State(state): State<AppState>, Path(id): Path<PersonId>, _: CurrentUser) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Persons::new(&mut conn);

    if repo.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound {
            resource: "Person".to_string(),
            id: id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{authed_server, create_test_app};
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    fn person_body(national_id: &str) -> serde_json::Value {
        json!({
            "first_name": "Maria",
            "last_name": "Garcia",
            "birth_date": "1985-06-14",
            "gender": "F",
            "national_id": national_id,
            "address": "Av. Rivadavia 1234",
            "phone": null,
            "email": null
        })
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_then_get_roundtrip(pool: PgPool) {
        let server = authed_server(&pool).await;

        let response = server.post("/api/persons").json(&person_body("30111222")).await;
        response.assert_status(StatusCode::CREATED);
        let created: PersonResponse = response.json();
        assert!(response.headers().get("location").is_some());
        assert_eq!(created.version, 1);

        let response = server.get(&format!("/api/persons/{}", created.id)).await;
        response.assert_status_ok();
        let fetched: PersonResponse = response.json();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.national_id, "30111222");
        assert_eq!(fetched.first_name, "Maria");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_requires_session(pool: PgPool) {
        let (server, _state) = create_test_app(pool).await;

        let response = server.get("/api/persons").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_replace_id_mismatch_is_rejected_without_mutation(pool: PgPool) {
        let server = authed_server(&pool).await;

        let created: PersonResponse = server.post("/api/persons").json(&person_body("30999888")).await.json();

        let mut body = person_body("30999888");
        body["id"] = json!(created.id + 1); // mismatched body id
        body["version"] = json!(created.version);
        body["first_name"] = json!("Changed");

        let response = server.put(&format!("/api/persons/{}", created.id)).json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let error: serde_json::Value = response.json();
        assert_eq!(error["success"], json!(false));
        assert_eq!(error["reason"], json!("id_mismatch"));

        // Storage untouched
        let fetched: PersonResponse = server.get(&format!("/api/persons/{}", created.id)).await.json();
        assert_eq!(fetched.first_name, "Maria");
        assert_eq!(fetched.version, created.version);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_stale_replace_conflicts(pool: PgPool) {
        let server = authed_server(&pool).await;

        let created: PersonResponse = server.post("/api/persons").json(&person_body("31000111")).await.json();

        let mut body = person_body("31000111");
        body["id"] = json!(created.id);
        body["version"] = json!(created.version);
        body["first_name"] = json!("First");

        server
            .put(&format!("/api/persons/{}", created.id))
            .json(&body)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        // Same version token again: the row has moved on
        body["first_name"] = json!("Second");
        let response = server.put(&format!("/api/persons/{}", created.id)).json(&body).await;
        response.assert_status(StatusCode::CONFLICT);

        let fetched: PersonResponse = server.get(&format!("/api/persons/{}", created.id)).await.json();
        assert_eq!(fetched.first_name, "First");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_missing_required_field_is_400(pool: PgPool) {
        let server = authed_server(&pool).await;

        let mut body = person_body("31222333");
        body["national_id"] = json!("   ");

        let response = server.post("/api/persons").json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let error: serde_json::Value = response.json();
        assert_eq!(error["reason"], json!("missing_field"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_national_id_is_400_unique_conflict(pool: PgPool) {
        let server = authed_server(&pool).await;

        server
            .post("/api/persons")
            .json(&person_body("32000444"))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server.post("/api/persons").json(&person_body("32000444")).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let error: serde_json::Value = response.json();
        assert_eq!(error["reason"], json!("unique_conflict"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_twice_is_404(pool: PgPool) {
        let server = authed_server(&pool).await;

        let created: PersonResponse = server.post("/api/persons").json(&person_body("33000555")).await.json();

        server
            .delete(&format!("/api/persons/{}", created.id))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .delete(&format!("/api/persons/{}", created.id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
