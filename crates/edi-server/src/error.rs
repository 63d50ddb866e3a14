//! Error responses

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use edi_pipeline::{Error, ErrorKind, FieldError};
use serde::Serialize;
use tracing::error;

tokio::task_local! {
    /// Correlation id of the request being served.
    pub static REQUEST_ID: String;
}

/// The current request id, empty outside a request scope.
pub fn current_request_id() -> String {
    REQUEST_ID.try_with(Clone::clone).unwrap_or_default()
}

/// Body of every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub fields: Vec<FieldError>,
}

/// An [`Error`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub Error);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

pub fn status_of(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let request_id = current_request_id();

        // internal details stay in the log
        let message = if kind == ErrorKind::Internal {
            error!(request_id = %request_id, error = %self.0, "internal error");
            "an internal error occurred".to_string()
        } else {
            self.0.to_string()
        };
        let fields = self.0.fields().to_vec();

        let body = ErrorBody {
            error: kind.code(),
            message,
            request_id,
            details: (!fields.is_empty()).then_some(ErrorDetails { fields }),
        };

        let mut response = (status_of(kind), Json(body)).into_response();
        response.extensions_mut().insert(kind);
        response
    }
}
