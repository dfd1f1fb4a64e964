//! External-provider login (the redirect dance) and logout.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, header},
    response::{AppendHeaders, IntoResponse, Redirect},
};
use serde::Deserialize;

use crate::{
    AppState,
    api::models::auth::{AuthSuccessResponse, LogoutResponse},
    api::models::users::{CurrentUser, Role},
    auth::{oauth, session},
    db::{handlers::{Repository, Users}, models::users::UserCreateDBRequest},
    errors::{Error, Result},
};

fn external_login_disabled() -> Error {
    Error::BadRequest {
        message: "External login is disabled".to_string(),
    }
}

/// Start the external login: redirect to the provider's authorization
/// endpoint with a fresh state nonce.
#[utoipa::path(
    get,
    path = "/login/google-login",
    tag = "authentication",
    responses(
        (status = 307, description = "Redirect to the identity provider"),
        (status = 400, description = "External login is disabled"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn google_login(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let google = &state.config.auth.google;
    if !google.enabled {
        return Err(external_login_disabled());
    }

    let nonce = oauth::generate_state_nonce();
    let authorize_url = oauth::build_authorize_url(google, &nonce);

    Ok((
        AppendHeaders([(header::SET_COOKIE, oauth::state_cookie(&nonce))]),
        Redirect::temporary(authorize_url.as_str()),
    ))
}

#[derive(Debug, Deserialize)]
pub struct GoogleCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

fn state_cookie_value(headers: &HeaderMap) -> Option<String> {
    let cookie_str = headers.get(header::COOKIE)?.to_str().ok()?;
    for cookie in cookie_str.split(';') {
        let cookie = cookie.trim();
        if let Some((name, value)) = cookie.split_once('=')
            && name == oauth::STATE_COOKIE
        {
            return Some(value.to_string());
        }
    }
    None
}

/// Provider callback: verify state, exchange the code, resolve the external
/// identity to a local user (linking or provisioning as configured) and
/// establish the session.
#[utoipa::path(
    get,
    path = "/login/google-response",
    tag = "authentication",
    responses(
        (status = 303, description = "Login complete, session established"),
        (status = 400, description = "External login is disabled"),
        (status = 401, description = "Assertion rejected or identity not linked"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn google_response(
    State(state): State<AppState>,
    Query(query): Query<GoogleCallbackQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let google = &state.config.auth.google;
    if !google.enabled {
        return Err(external_login_disabled());
    }

    if let Some(error) = query.error {
        return Err(Error::Unauthenticated {
            message: Some(format!("Identity provider reported: {error}")),
        });
    }

    // The state echoed by the provider must match the nonce we set out with
    let expected_state = state_cookie_value(&headers);
    match (&query.state, &expected_state) {
        (Some(got), Some(expected)) if got == expected => {}
        _ => {
            return Err(Error::Unauthenticated {
                message: Some("Login state mismatch; restart the login".to_string()),
            });
        }
    }

    let code = query.code.as_deref().ok_or_else(|| Error::Unauthenticated {
        message: Some("Identity provider did not return an authorization code".to_string()),
    })?;

    let tokens = oauth::exchange_code(google, code).await?;
    let info = oauth::fetch_userinfo(google, &tokens.access_token).await?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut tx);

    let user = match users.get_by_external_subject(&info.sub).await? {
        Some(user) => user,
        None => {
            // Unseen subject: link a matching local account by email, or
            // provision one if configured to.
            let by_email = match &info.email {
                Some(email) => users.get_by_email(email).await?,
                None => None,
            };

            match by_email {
                Some(existing) => users.link_external_subject(existing.id, &info.sub).await?,
                None if google.auto_provision => {
                    let email = info.email.clone().ok_or_else(|| Error::Unauthenticated {
                        message: Some("Identity provider did not supply an email".to_string()),
                    })?;

                    users
                        .create(&UserCreateDBRequest {
                            username: email.clone(),
                            password_hash: None,
                            email: Some(email),
                            role: Role::Reception,
                            person_id: None,
                            external_subject: Some(info.sub.clone()),
                            active: true,
                        })
                        .await?
                }
                None => {
                    return Err(Error::Unauthenticated {
                        message: Some("No local account is linked to this identity".to_string()),
                    });
                }
            }
        }
    };

    if !user.active {
        return Err(Error::Unauthenticated {
            message: Some("Account is inactive".to_string()),
        });
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    let current_user = CurrentUser::from(user);
    let token = session::create_session_token(&current_user, &state.config)?;

    Ok((
        AppendHeaders([
            (header::SET_COOKIE, session::create_session_cookie(&token, &state.config)),
            (header::SET_COOKIE, oauth::clear_state_cookie()),
        ]),
        Redirect::to("/"),
    ))
}

/// Logout: expire the session cookie.
#[utoipa::path(
    get,
    path = "/login/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Session cleared", body = AuthSuccessResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> LogoutResponse {
    LogoutResponse {
        body: AuthSuccessResponse {
            success: true,
            message: "Logout successful".to_string(),
        },
        cookie: session::clear_session_cookie(&state.config),
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{create_test_app_with_config, create_test_config};
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn google_mock() -> MockServer {
        let mock = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "mock-access-token",
                "id_token": null
            })))
            .mount(&mock)
            .await;

        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sub": "google-subject-42",
                "email": "dra.lopez@clinic.example",
                "name": "Dra. Lopez"
            })))
            .mount(&mock)
            .await;

        mock
    }

    fn google_config(mock_uri: &str) -> crate::config::Config {
        let mut config = create_test_config();
        config.auth.google.enabled = true;
        config.auth.google.client_id = "test-client".to_string();
        config.auth.google.client_secret = "test-secret".to_string();
        config.auth.google.token_endpoint = format!("{mock_uri}/token").parse().unwrap();
        config.auth.google.userinfo_endpoint = format!("{mock_uri}/userinfo").parse().unwrap();
        config
    }

    /// Extract `name=value` for a named cookie from the response's
    /// Set-Cookie headers.
    fn cookie_pair(response: &axum_test::TestResponse, name: &str) -> Option<String> {
        response
            .headers()
            .get_all("set-cookie")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or("").to_string())
            .find(|pair| pair.starts_with(&format!("{name}=")) && !pair.ends_with('='))
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_external_login_auto_provisions_and_sets_session(pool: PgPool) {
        let mock = google_mock().await;
        let (server, state) = create_test_app_with_config(pool.clone(), google_config(&mock.uri())).await;

        // Step 1: the redirect carries the state nonce in URL and cookie
        let response = server.get("/login/google-login").await;
        response.assert_status(StatusCode::TEMPORARY_REDIRECT);
        let state_cookie = cookie_pair(&response, "clinica_oauth_state").expect("state cookie");
        let nonce = state_cookie.split_once('=').unwrap().1.to_string();

        // Step 2: the callback with matching state logs in
        let response = server
            .get(&format!("/login/google-response?code=auth-code&state={nonce}"))
            .add_header("cookie", state_cookie.clone())
            .await;
        response.assert_status(StatusCode::SEE_OTHER);
        let session_cookie = cookie_pair(&response, &state.config.auth.session.cookie_name).expect("session cookie");

        // A local user was provisioned for the external identity
        let me: serde_json::Value = server.get("/api/auth/me").add_header("cookie", session_cookie).await.json();
        assert_eq!(me["username"], json!("dra.lopez@clinic.example"));
        assert_eq!(me["role"], json!("reception"));

        // Replaying the callback reuses the same user rather than creating another
        let response = server
            .get(&format!("/login/google-response?code=auth-code&state={nonce}"))
            .add_header("cookie", state_cookie)
            .await;
        response.assert_status(StatusCode::SEE_OTHER);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE external_subject = 'google-subject-42'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_state_mismatch_is_rejected(pool: PgPool) {
        let mock = google_mock().await;
        let (server, _state) = create_test_app_with_config(pool, google_config(&mock.uri())).await;

        let response = server
            .get("/login/google-response?code=auth-code&state=forged")
            .add_header("cookie", "clinica_oauth_state=expected")
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_without_auto_provision_unlinked_identity_is_rejected(pool: PgPool) {
        let mock = google_mock().await;
        let mut config = google_config(&mock.uri());
        config.auth.google.auto_provision = false;
        let (server, _state) = create_test_app_with_config(pool.clone(), config).await;

        let response = server.get("/login/google-login").await;
        let state_cookie = cookie_pair(&response, "clinica_oauth_state").unwrap();
        let nonce = state_cookie.split_once('=').unwrap().1.to_string();

        let response = server
            .get(&format!("/login/google-response?code=auth-code&state={nonce}"))
            .add_header("cookie", state_cookie)
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(&pool).await.unwrap();
        assert_eq!(count, 0, "no user should be provisioned");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_routes_disabled_without_google_config(pool: PgPool) {
        let (server, _state) = crate::test_utils::create_test_app(pool).await;

        let response = server.get("/login/google-login").await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_logout_clears_cookie(pool: PgPool) {
        let (server, state) = crate::test_utils::create_test_app(pool).await;

        let response = server.get("/login/logout").await;
        response.assert_status_ok();
        let cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap();
        assert!(cookie.starts_with(&format!("{}=;", state.config.auth.session.cookie_name)));
        assert!(cookie.contains("Max-Age=0"));

        let body: serde_json::Value = response.json();
        assert_eq!(body["success"], json!(true));
    }
}
