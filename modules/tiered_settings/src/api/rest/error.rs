//! HTTP error mapping to RFC-9457 Problem Details

use crate::contract::{ErrorClass, SettingsError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// RFC-9457 Problem Details for HTTP API errors
#[derive(Debug, Serialize)]
pub struct Problem {
    /// A URI reference that identifies the problem type
    #[serde(rename = "type")]
    pub type_uri: String,

    /// A short, human-readable summary of the problem type
    pub title: String,

    /// The HTTP status code
    pub status: u16,

    /// A human-readable explanation specific to this occurrence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Problem {
    pub fn new(status: StatusCode, title: impl Into<String>) -> Self {
        Self {
            type_uri: format!("https://httpstatuses.io/{}", status.as_u16()),
            title: title.into(),
            status: status.as_u16(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn not_found() -> Self {
        Problem::new(StatusCode::NOT_FOUND, "Not Found")
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

/// Map domain errors to HTTP Problem Details
pub fn map_domain_error(error: SettingsError) -> Problem {
    let detail = error.to_string();
    match (&error, error.class()) {
        (SettingsError::NotRegistered { .. }, _) => {
            Problem::new(StatusCode::NOT_FOUND, "Settings Not Registered").with_detail(detail)
        }
        (SettingsError::StoreTimeout { .. }, _) => {
            Problem::new(StatusCode::GATEWAY_TIMEOUT, "Settings Store Timeout").with_detail(detail)
        }
        (_, ErrorClass::Validation) => {
            Problem::new(StatusCode::BAD_REQUEST, "Validation Error").with_detail(detail)
        }
        (_, ErrorClass::Permission) => {
            Problem::new(StatusCode::NOT_IMPLEMENTED, "Override Not Allowed").with_detail(detail)
        }
        (_, ErrorClass::Format) => {
            Problem::new(StatusCode::CONFLICT, "Invalid Setting Value").with_detail(detail)
        }
        (_, ErrorClass::Store) => {
            tracing::error!(error = %error, "Settings store failure");
            Problem::new(StatusCode::INTERNAL_SERVER_ERROR, "Settings Store Error").with_detail(detail)
        }
        _ => {
            tracing::error!(error = %error, "Internal error");
            Problem::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                .with_detail("An unexpected error occurred")
        }
    }
}
