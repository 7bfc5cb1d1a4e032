//! The uniform `{success, error}` envelope and error diagnostics plumbing.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::RenderError;

/// Diagnostic attached to error responses for the logging middleware.
/// Never serialized to the caller.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub detail: String,
}

impl ErrorReport {
    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: String,
}

/// An error response in the gateway's envelope: status code plus
/// `{"success": false, "error": "<message>"}`.
#[derive(Debug)]
pub struct ApiError {
    source: &'static str,
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(source: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            source,
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(source: &'static str, message: impl Into<String>) -> Self {
        Self::new(source, StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(source: &'static str, message: impl Into<String>) -> Self {
        Self::new(source, StatusCode::NOT_FOUND, message)
    }

    pub fn from_render_error(source: &'static str, error: RenderError) -> Self {
        let status = match &error {
            RenderError::EmptyMarkup | RenderError::UnsupportedFormat(_) => {
                StatusCode::BAD_REQUEST
            }
            RenderError::NotFound => StatusCode::NOT_FOUND,
            RenderError::RenderFailed { .. }
            | RenderError::OutputMissing
            | RenderError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(source, status, error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorEnvelope {
            success: false,
            error: self.message.clone(),
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport {
            source: self.source,
            status: self.status,
            detail: self.message,
        }
        .attach(&mut response);
        response
    }
}
