//! Error-to-HTTP response conversion.
//!
//! Handlers return `Result<Response, AppError>`; every
//! [`assetforged_common::Error`] converts into an `AppError` with the
//! status from `Error::status_code`.

use assetforged_common::Error;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: Error,
}

impl AppError {
    pub fn new(inner: Error) -> Self {
        Self { inner }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.inner.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self::new(e)
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::new(Error::io(format!("blocking task failed: {}", e)))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in attachment handler"
            );
        }

        let code = match &self.inner {
            Error::Configuration(_) => "configuration_error",
            Error::NotFound(_) => "not_found",
            Error::Generation(_) => "generation_error",
            Error::Io(_) => "io_error",
            Error::Database(_) => "database_error",
            Error::InvalidInput(_) => "invalid_input",
        };

        let body = json!({
            "error": self.inner.to_string(),
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_produces_404() {
        let response = AppError::new(Error::not_found("attachment")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn generation_produces_500() {
        let response = AppError::new(Error::generation("backend exploded")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn invalid_input_produces_400() {
        let response = AppError::new(Error::invalid_input("bad id")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
