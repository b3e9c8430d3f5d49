//! API error types with HTTP response mapping.
//!
//! Every non-2xx response carries the same JSON body: `{"error", "code"}`.

use std::any::Any;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use serde::Serialize;

const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

/// Standard error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: u16,
}

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed or invalid request input.
    BadRequest(String),
    /// Resource not found.
    NotFound(String),
    /// No route matches the request path.
    RouteNotFound,
    /// The path exists but not for this method.
    MethodNotAllowed,
    /// Internal server error; the message is logged, never returned.
    Internal(String),
}

impl ApiError {
    /// Builds a response with the standard error body.
    pub fn response(status: StatusCode, message: impl Into<String>) -> Response {
        let body = ErrorBody {
            error: message.into(),
            code: status.as_u16(),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::RouteNotFound => (StatusCode::NOT_FOUND, "no route for path".to_string()),
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "method not allowed".to_string(),
            ),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_ERROR_MESSAGE.to_string(),
                )
            }
        };

        Self::response(status, message)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::OrderNotFound(_) => ApiError::NotFound("order not found".to_string()),
            DomainError::Store(_) | DomainError::StoreTimeout => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

/// Fallback for paths no route matches.
pub async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}

/// Fallback for known paths requested with an unsupported method.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Converts a handler panic into a `500` with the standard error body.
///
/// Used with `tower_http::catch_panic::CatchPanicLayer::custom`.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic = %detail, "recovered from panic in request handler");

    ApiError::response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
}
