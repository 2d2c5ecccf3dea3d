//! Error taxonomy for the HTTP surface.
//!
//! Every failure maps to exactly one class with a structured JSON body.
//! Authentication failures share a single generic message so an unknown
//! username is indistinguishable from a wrong password.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::ponto::hydra::HubError;

#[derive(Debug)]
pub enum ApiError {
    /// Missing or invalid request/service configuration, never retried.
    BadRequest(String),
    /// Credential or subject check failed; body is always `login failed`.
    Unauthorized,
    /// Admin token missing or wrong on a management endpoint.
    InvalidAdminToken,
    NotFound(String),
    Conflict(String),
    /// Registration gate refused the request.
    Precondition(String),
    /// The hub answered outside 200..=302; carries its status and body.
    Hub(HubError),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "reason": reason }))).into_response()
            }
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "text": "login failed" })),
            )
                .into_response(),
            Self::InvalidAdminToken => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "reason": "invalid admin token" })),
            )
                .into_response(),
            Self::NotFound(reason) => {
                (StatusCode::NOT_FOUND, Json(json!({ "reason": reason }))).into_response()
            }
            Self::Conflict(reason) => {
                (StatusCode::CONFLICT, Json(json!({ "reason": reason }))).into_response()
            }
            Self::Precondition(reason) => (
                StatusCode::PRECONDITION_FAILED,
                Json(json!({ "reason": reason })),
            )
                .into_response(),
            Self::Hub(err) => {
                let status =
                    StatusCode::from_u16(err.status).unwrap_or(StatusCode::BAD_GATEWAY);
                (status, Json(err.body)).into_response()
            }
            Self::Internal(err) => {
                error!("internal error: {err:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "reason": "internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        Self::Hub(err)
    }
}
