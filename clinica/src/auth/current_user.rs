//! Extractors for the authenticated caller, and the sliding-renewal
//! middleware that keeps active sessions alive.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, header, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::{
    AppState,
    api::models::users::{CurrentUser, Role},
    auth::session::{self, SessionClaims},
    config::Config,
    errors::{Error, Result},
};

/// Find the named cookie's value in a Cookie header, if any.
fn cookie_value<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    let cookie_str = headers.get(header::COOKIE)?.to_str().ok()?;
    for cookie in cookie_str.split(';') {
        let cookie = cookie.trim();
        if let Some((name, value)) = cookie.split_once('=')
            && name == cookie_name
        {
            return Some(value);
        }
    }
    None
}

/// Extract session claims from the session cookie if present and valid.
/// Returns:
/// - None: no session cookie, or the token is invalid/expired (expected for
///   stale browsers, so not propagated as an error)
/// - Some(claims): valid session
fn try_session_auth(headers: &HeaderMap, config: &Config) -> Option<SessionClaims> {
    let token = cookie_value(headers, &config.auth.session.cookie_name)?;
    session::verify_session_token(token, config).ok()
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match try_session_auth(&parts.headers, &state.config) {
            Some(claims) => Ok(CurrentUser::from(claims)),
            None => Err(Error::Unauthenticated { message: None }),
        }
    }
}

/// Extractor for admin-only routes: authenticates like [`CurrentUser`] and
/// then requires the `admin` role.
pub struct RequiresAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequiresAdmin {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(Error::Forbidden {
                message: "This operation requires the admin role".to_string(),
            });
        }
        Ok(RequiresAdmin(user))
    }
}

/// Sliding session renewal: when a request carries a valid session older
/// than `renew_after`, re-issue the cookie on the response. Responses that
/// already set a cookie (login, logout) are left alone.
pub async fn session_renewal_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let renewed = renewal_cookie(request.headers(), &state.config);

    let mut response = next.run(request).await;

    if let Some(cookie) = renewed
        && !response.headers().contains_key(header::SET_COOKIE)
        && let Ok(value) = HeaderValue::from_str(&cookie)
    {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }

    response
}

fn renewal_cookie(headers: &HeaderMap, config: &Config) -> Option<String> {
    let claims = try_session_auth(headers, config)?;
    if claims.age_seconds() < config.auth.session.renew_after.as_secs() as i64 {
        return None;
    }

    let user = CurrentUser::from(claims);
    let token = session::create_session_token(&user, config).ok()?;
    Some(session::create_session_cookie(&token, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_secret() -> Config {
        Config {
            secret_key: Some("extractor-test-secret".to_string()),
            ..Default::default()
        }
    }

    fn headers_with_cookie(name: &str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, format!("other=1; {name}={value}").parse().unwrap());
        headers
    }

    #[test]
    fn test_cookie_value_parses_multiple_cookies() {
        let headers = headers_with_cookie("clinica_session", "abc");
        assert_eq!(cookie_value(&headers, "clinica_session"), Some("abc"));
        assert_eq!(cookie_value(&headers, "other"), Some("1"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_try_session_auth_roundtrip() {
        let config = config_with_secret();
        let user = CurrentUser {
            id: 3,
            username: "renewal".to_string(),
            role: Role::Doctor,
        };
        let token = session::create_session_token(&user, &config).unwrap();

        let headers = headers_with_cookie(&config.auth.session.cookie_name, &token);
        let claims = try_session_auth(&headers, &config).expect("valid session");
        assert_eq!(claims.sub, 3);

        let headers = headers_with_cookie(&config.auth.session.cookie_name, "garbage");
        assert!(try_session_auth(&headers, &config).is_none());
    }

    #[test]
    fn test_fresh_session_is_not_renewed() {
        let config = config_with_secret();
        let user = CurrentUser {
            id: 4,
            username: "fresh".to_string(),
            role: Role::Reception,
        };
        let token = session::create_session_token(&user, &config).unwrap();
        let headers = headers_with_cookie(&config.auth.session.cookie_name, &token);

        // Just issued, so well under the renewal threshold
        assert!(renewal_cookie(&headers, &config).is_none());
    }

    #[test]
    fn test_old_session_is_renewed() {
        let mut config = config_with_secret();
        config.auth.session.renew_after = std::time::Duration::from_secs(0);

        let user = CurrentUser {
            id: 5,
            username: "old".to_string(),
            role: Role::Reception,
        };
        let token = session::create_session_token(&user, &config).unwrap();
        let headers = headers_with_cookie(&config.auth.session.cookie_name, &token);

        let cookie = renewal_cookie(&headers, &config).expect("session should renew");
        assert!(cookie.starts_with("clinica_session="));
    }
}
