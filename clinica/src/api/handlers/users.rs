use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, header},
};

use crate::{
    AppState,
    api::Json,
    api::models::users::{ListUsersQuery, UserCreate, UserReplace, UserResponse},
    auth::{current_user::RequiresAdmin, password},
    db::{
        handlers::{Repository, Users, users::UserFilter},
        models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    errors::{Error, Result, ValidationReason},
    types::UserId,
};

/// Hash a plain-text password on a blocking thread so the Argon2 work does
/// not stall the async runtime.
async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || password::hash_string(&password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    summary = "List users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "List of users", body = Vec<UserResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Requires admin role"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
    _: RequiresAdmin,
) -> Result<Json<Vec<UserResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);

    let users = repo
        .list(&UserFilter::new(query.pagination.skip(), query.pagination.limit()))
        .await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    summary = "Get user",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User details", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Requires admin role"),
        (status = 404, description = "User not found"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_user(State(state): State<AppState>, Path(id): Path<UserId>, _: RequiresAdmin) -> Result<Json<UserResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);

    match repo.get_by_id(id).await? {
        Some(user) => Ok(Json(UserResponse::from(user))),
        None => Err(Error::NotFound {
            resource: "User".to_string(),
            id: id.to_string(),
        }),
    }
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    summary = "Create user",
    request_body = UserCreate,
    responses(
        (status = 201, description = "User created successfully", body = UserResponse),
        (status = 400, description = "Invalid request or duplicate username"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Requires admin role"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    _: RequiresAdmin,
    Json(create): Json<UserCreate>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<UserResponse>)> {
    create.validate()?;

    let password_hash = match create.password.clone() {
        Some(password) => Some(hash_password(password).await?),
        None => None,
    };

    let request = UserCreateDBRequest {
        username: create.username,
        password_hash,
        email: create.email,
        role: create.role,
        person_id: create.person_id,
        external_subject: None,
        active: true,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);

    let user = repo.create(&request).await?;
    let location = format!("/api/users/{}", user.id);

    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(UserResponse::from(user))))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    summary = "Replace user",
    request_body = UserReplace,
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 204, description = "User replaced successfully"),
        (status = 400, description = "Invalid request or id mismatch"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Requires admin role"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Concurrent modification"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn replace_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    _: RequiresAdmin,
    Json(replace): Json<UserReplace>,
) -> Result<StatusCode> {
    if replace.id != id {
        return Err(Error::Validation {
            reason: ValidationReason::IdMismatch,
            message: "path id does not match body id".to_string(),
        });
    }
    replace.validate()?;

    let password_hash = match replace.password.clone() {
        Some(password) => Some(hash_password(password).await?),
        None => None,
    };

    let request = UserUpdateDBRequest {
        expected_version: replace.version,
        username: replace.username,
        password_hash,
        email: replace.email,
        role: replace.role,
        person_id: replace.person_id,
        active: replace.active,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);

    repo.update(id, &request).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    summary = "Delete user",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted successfully"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Requires admin role"),
        (status = 404, description = "User not found"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user(State(state): State<AppState>, Path(id): Path<UserId>, _: RequiresAdmin) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);

    if repo.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound {
            resource: "User".to_string(),
            id: id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::api::models::users::Role;
    use crate::test_utils::{authed_server_as, create_test_user};
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_user_management_requires_admin_role(pool: PgPool) {
        let server = authed_server_as(&pool, Role::Reception).await;

        let response = server.get("/api/users").await;
        response.assert_status(StatusCode::FORBIDDEN);

        let response = server
            .post("/api/users")
            .json(&json!({"username": "nuevo", "password": null, "email": null, "role": "reception", "person_id": null}))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_admin_can_manage_users(pool: PgPool) {
        let server = authed_server_as(&pool, Role::Admin).await;

        let response = server
            .post("/api/users")
            .json(&json!({
                "username": "recepcion1",
                "password": "a-long-password",
                "email": "recepcion1@clinic.example",
                "role": "reception",
                "person_id": null
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: serde_json::Value = response.json();

        // The hash never leaves storage
        assert!(created.get("password").is_none());
        assert!(created.get("password_hash").is_none());
        assert_eq!(created["role"], json!("reception"));

        let response = server.get(&format!("/api/users/{}", created["id"])).await;
        response.assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_short_password_is_rejected(pool: PgPool) {
        let server = authed_server_as(&pool, Role::Admin).await;

        let response = server
            .post("/api/users")
            .json(&json!({"username": "corto", "password": "short", "email": null, "role": "reception", "person_id": null}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_bad_role_value_is_400(pool: PgPool) {
        let server = authed_server_as(&pool, Role::Admin).await;

        let response = server
            .post("/api/users")
            .json(&json!({"username": "x", "password": null, "email": null, "role": "janitor", "person_id": null}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let error: serde_json::Value = response.json();
        assert_eq!(error["reason"], json!("bad_enum_value"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_existing_user(pool: PgPool) {
        let target = create_test_user(&pool, Role::Reception).await;
        let server = authed_server_as(&pool, Role::Admin).await;

        server
            .delete(&format!("/api/users/{}", target.id))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .delete(&format!("/api/users/{}", target.id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
