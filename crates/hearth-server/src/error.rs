//! HTTP error mapping
//!
//! Client mistakes (bad bodies, bad instance names) answer 400, everything
//! else answers 500. Bodies are always `{"error": ..., "code": ...}`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hearth_core::Error;
use serde::Serialize;
use tracing::{debug, error};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.body.code
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        if status.is_server_error() {
            error!(
                code = err.code(),
                error = %err,
                suggestion = err.suggestion().as_deref().unwrap_or(""),
                "Request failed"
            );
        } else {
            debug!(code = err.code(), error = %err, "Rejected request");
        }

        Self {
            status,
            body: ErrorResponse {
                error: err.to_string(),
                code: err.code(),
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Error::InvalidInput(rejection.body_text()).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_bad_request() {
        let err: ApiError = Error::InvalidInput("age must be between 0 and 150".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "E800");

        let err: ApiError = Error::InvalidInstanceName("a b".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_actor_errors_map_to_internal_error() {
        let err: ApiError = Error::ActorUnavailable {
            name: "example".into(),
            reason: "migration failed".into(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "E002");

        let err: ApiError = Error::InsertReturnedEmpty("users".into()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
