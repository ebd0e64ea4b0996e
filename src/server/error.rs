//! Error-to-HTTP response conversion.
//!
//! Handlers return `Result<T, AppError>`; any [`crate::Error`] converts with `?`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::Error;

/// Wrapper so handlers can return the crate error as a response.
#[derive(Debug)]
pub struct AppError {
    inner: Error,
    request_id: Option<String>,
}

impl AppError {
    /// Wrap `inner`, tagging it with the current request's ID if there is one.
    pub fn new(inner: Error) -> Self {
        Self {
            inner,
            request_id: super::request_id::current(),
        }
    }

    pub fn with_request_id(mut self, id: String) -> Self {
        self.request_id = Some(id);
        self
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self::new(e)
    }
}

impl From<trackwave_common::Error> for AppError {
    fn from(e: trackwave_common::Error) -> Self {
        Self::new(e.into())
    }
}

impl From<trackwave_media::Error> for AppError {
    fn from(e: trackwave_media::Error) -> Self {
        Self::new(e.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in API handler"
            );
        }

        let body = json!({
            "error": self.inner.to_string(),
            "code": self.inner.code(),
            "request_id": self.request_id,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_produces_404() {
        let response = AppError::new(Error::not_found("track 9")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn no_audio_stream_produces_422() {
        let response = AppError::new(Error::NoAudioStream("upload".into())).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn seek_out_of_range_produces_416() {
        let err: AppError = trackwave_media::Error::SeekOutOfRange {
            requested: 10.0,
            duration: 5.0,
        }
        .into();
        assert_eq!(err.into_response().status(), StatusCode::RANGE_NOT_SATISFIABLE);
    }

    #[test]
    fn with_request_id() {
        let err = AppError::new(Error::internal("oops")).with_request_id("req-123".into());
        assert_eq!(err.request_id.as_deref(), Some("req-123"));
    }
}
