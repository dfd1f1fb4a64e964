//! API request/response models for authentication.

use super::users::UserResponse;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Login credentials. The `usuarioname` field name is the wire contract the
/// existing clients already speak.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(rename = "usuarioname")]
    pub username: String,
    pub password: String,
}

/// Successful login body: `{success, redirectUrl, data}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginBody {
    pub success: bool,
    #[serde(rename = "redirectUrl")]
    pub redirect_url: String,
    pub data: UserResponse,
}

/// Login response carrying the session cookie alongside the JSON body.
#[derive(Debug)]
pub struct LoginResponse {
    pub body: LoginBody,
    pub cookie: String,
}

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [(header::SET_COOKIE, self.cookie)],
            axum::Json(self.body),
        )
            .into_response()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthSuccessResponse {
    pub success: bool,
    pub message: String,
}

/// Logout response that clears the session cookie.
#[derive(Debug)]
pub struct LogoutResponse {
    pub body: AuthSuccessResponse,
    pub cookie: String,
}

impl IntoResponse for LogoutResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [(header::SET_COOKIE, self.cookie)],
            axum::Json(self.body),
        )
            .into_response()
    }
}
