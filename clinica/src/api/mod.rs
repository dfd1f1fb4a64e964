//! HTTP API layer: axum handlers and their request/response models.

pub mod handlers;
pub mod models;

use axum::extract::FromRequest;
use axum::response::{IntoResponse, Response};

use crate::errors::Error;

/// Json extractor whose rejection is rendered in this API's error body shape
/// (`{"success": false, "message": ..., "reason": ...}`) instead of axum's
/// default text response. Also usable as a response body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct Json<T>(pub T);

impl<T: serde::Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}
