use axum::extract::State;

use crate::{
    AppState,
    api::Json,
    api::models::{
        auth::{LoginBody, LoginRequest, LoginResponse},
        users::{CurrentUser, UserResponse},
    },
    auth::{password, session},
    db::handlers::Users,
    errors::{Error, Result},
};

/// Fixed 401 for both unknown usernames and wrong passwords, so the two are
/// not distinguishable from the response.
fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid username or password".to_string()),
    }
}

/// Verify a password on a blocking thread. When the user does not exist (or
/// has no native password), verification still runs against a just-built
/// hash so the request does comparable work either way.
async fn verify_password(password: String, hash: Option<String>) -> Result<bool> {
    tokio::task::spawn_blocking(move || match hash {
        Some(hash) => password::verify_string(&password, &hash),
        None => {
            let dummy = password::hash_string("invalid-password")?;
            password::verify_string(&password, &dummy)?;
            Ok(false)
        }
    })
    .await
    .map_err(|e| Error::Internal {
        operation: format!("spawn password verification task: {e}"),
    })?
}

/// Login with username and password
#[utoipa::path(
    post,
    path = "/auth",
    tag = "authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginBody),
        (status = 400, description = "Missing credentials"),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<LoginResponse> {
    if request.username.trim().is_empty() || request.password.is_empty() {
        return Err(Error::BadRequest {
            message: "Username and password are required".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut user_repo = Users::new(&mut conn);

    let user = user_repo.get_by_username(&request.username).await?;
    let password_hash = user.as_ref().and_then(|u| u.password_hash.clone());

    let is_valid = verify_password(request.password.clone(), password_hash).await?;

    let user = match user {
        Some(user) if is_valid => user,
        _ => return Err(invalid_credentials()),
    };

    if !user.active {
        return Err(invalid_credentials());
    }

    let current_user = CurrentUser::from(user.clone());
    let token = session::create_session_token(&current_user, &state.config)?;
    let cookie = session::create_session_cookie(&token, &state.config);

    Ok(LoginResponse {
        body: LoginBody {
            success: true,
            redirect_url: "/".to_string(),
            data: UserResponse::from(user),
        },
        cookie,
    })
}

/// Identity behind the current session
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "authentication",
    responses(
        (status = 200, description = "Current identity", body = CurrentUser),
        (status = 401, description = "No valid session"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn me(current_user: CurrentUser) -> Json<CurrentUser> {
    Json(current_user)
}

#[cfg(test)]
mod tests {
    use crate::api::models::users::Role;
    use crate::test_utils::{create_test_app, create_test_user_with_password};
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_success_sets_session(pool: PgPool) {
        let user = create_test_user_with_password(&pool, "drhouse", "vicodin-4-ever", Role::Doctor).await;
        let (server, _state) = create_test_app(pool).await;

        let response = server
            .post("/api/auth")
            .json(&json!({"usuarioname": "drhouse", "password": "vicodin-4-ever"}))
            .await;

        response.assert_status_ok();
        assert!(response.headers().get("set-cookie").is_some());

        let body: serde_json::Value = response.json();
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["redirectUrl"], json!("/"));
        assert_eq!(body["data"]["id"], json!(user.id));
        assert_eq!(body["data"]["username"], json!("drhouse"));
        // The hash never appears in the response
        assert!(body["data"].get("password_hash").is_none());

        // The issued cookie authenticates /api/auth/me with the same identity
        let cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap();
        let cookie_pair = cookie.split(';').next().unwrap();
        let me_response = server.get("/api/auth/me").add_header("cookie", cookie_pair).await;
        me_response.assert_status_ok();
        let me: serde_json::Value = me_response.json();
        assert_eq!(me["id"], json!(user.id));
        assert_eq!(me["role"], json!("doctor"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_wrong_password_is_401_without_cookie(pool: PgPool) {
        create_test_user_with_password(&pool, "drwho", "correct-password", Role::Doctor).await;
        let (server, _state) = create_test_app(pool).await;

        let response = server
            .post("/api/auth")
            .json(&json!({"usuarioname": "drwho", "password": "wrong-password"}))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        assert!(response.headers().get("set-cookie").is_none());
        let body: serde_json::Value = response.json();
        assert_eq!(body["success"], json!(false));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_unknown_user_matches_wrong_password_response(pool: PgPool) {
        create_test_user_with_password(&pool, "known", "some-password", Role::Reception).await;
        let (server, _state) = create_test_app(pool).await;

        let unknown: serde_json::Value = server
            .post("/api/auth")
            .json(&json!({"usuarioname": "ghost", "password": "whatever-pass"}))
            .await
            .json();
        let wrong: serde_json::Value = server
            .post("/api/auth")
            .json(&json!({"usuarioname": "known", "password": "whatever-pass"}))
            .await
            .json();

        // Same body for both failure modes
        assert_eq!(unknown, wrong);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_inactive_user_is_rejected(pool: PgPool) {
        let user = create_test_user_with_password(&pool, "retired", "some-password", Role::Doctor).await;
        sqlx::query("UPDATE users SET active = FALSE WHERE id = $1")
            .bind(user.id)
            .execute(&pool)
            .await
            .unwrap();

        let (server, _state) = create_test_app(pool).await;
        let response = server
            .post("/api/auth")
            .json(&json!({"usuarioname": "retired", "password": "some-password"}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_missing_fields_is_400(pool: PgPool) {
        let (server, _state) = create_test_app(pool).await;

        let response = server.post("/api/auth").json(&json!({"usuarioname": "", "password": ""})).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server.post("/api/auth").json(&json!({"password": "only"})).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }
}
